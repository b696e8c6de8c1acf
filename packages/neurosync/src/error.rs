use kuramoto_rs::EngineError;
use neurosync_stream::StreamError;
use std::path::PathBuf;
use thiserror::Error;

use crate::config::ConfigError;

#[derive(Debug, Error)]
pub enum NeuroSyncError {
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session format error: {0}")]
    Format(#[from] serde_json::Error),

    #[error("Invalid session log pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Session log lookup failed: {0}")]
    Glob(#[from] glob::GlobError),

    #[error("No session logs found in {}", .0.display())]
    NoSessions(PathBuf),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub type Result<T> = std::result::Result<T, NeuroSyncError>;
