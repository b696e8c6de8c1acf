use kuramoto_rs::{EngineConfig, DEFAULT_POPULATION, DEFAULT_TIME_STEP};
use neurosync_stream::ReconnectPolicy;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "ws://localhost:8000";
pub const DEFAULT_TICK_HZ: u32 = 30;
pub const DEFAULT_LOG_DIR: &str = "data_logs";

/// Runtime configuration loaded from environment variables
#[derive(Debug, Clone, PartialEq)]
pub struct NeuroSyncConfig {
    /// Base address of the remote simulation process (ws:// or wss://)
    pub base_url: String,
    /// Delay between a dropped connection and the next attempt
    pub reconnect_delay: Duration,
    /// Give up after this many consecutive retries; `None` retries forever
    pub max_reconnect_attempts: Option<u32>,
    /// Oscillator population for local drives
    pub population: usize,
    /// Integration step per engine tick
    pub time_step: f64,
    /// Presentation tick rate
    pub tick_hz: u32,
    /// Directory for NKC session logs
    pub log_dir: PathBuf,
}

impl Default for NeuroSyncConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            reconnect_delay: neurosync_stream::DEFAULT_RECONNECT_DELAY,
            max_reconnect_attempts: None,
            population: DEFAULT_POPULATION,
            time_step: DEFAULT_TIME_STEP,
            tick_hz: DEFAULT_TICK_HZ,
            log_dir: PathBuf::from(DEFAULT_LOG_DIR),
        }
    }
}

impl NeuroSyncConfig {
    /// Load configuration from `.env` and the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Build a configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let base_url = lookup("NEUROSYNC_BASE_URL").unwrap_or(defaults.base_url);

        let reconnect_delay = match lookup("NEUROSYNC_RECONNECT_DELAY_MS") {
            Some(raw) => Duration::from_millis(parse_var("NEUROSYNC_RECONNECT_DELAY_MS", &raw)?),
            None => defaults.reconnect_delay,
        };

        let max_reconnect_attempts = match lookup("NEUROSYNC_MAX_RECONNECT_ATTEMPTS") {
            Some(raw) if raw.trim().is_empty() => None,
            Some(raw) => Some(parse_var("NEUROSYNC_MAX_RECONNECT_ATTEMPTS", &raw)?),
            None => None,
        };

        let population = match lookup("NEUROSYNC_POPULATION") {
            Some(raw) => parse_var("NEUROSYNC_POPULATION", &raw)?,
            None => defaults.population,
        };

        let time_step = match lookup("NEUROSYNC_TIME_STEP") {
            Some(raw) => parse_var("NEUROSYNC_TIME_STEP", &raw)?,
            None => defaults.time_step,
        };

        let tick_hz = match lookup("NEUROSYNC_TICK_HZ") {
            Some(raw) => parse_var("NEUROSYNC_TICK_HZ", &raw)?,
            None => defaults.tick_hz,
        };

        let log_dir = lookup("NEUROSYNC_LOG_DIR")
            .map(PathBuf::from)
            .unwrap_or(defaults.log_dir);

        let config = Self {
            base_url,
            reconnect_delay,
            max_reconnect_attempts,
            population,
            time_step,
            tick_hz,
            log_dir,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("ws://") || self.base_url.starts_with("wss://")) {
            return Err(ConfigError::InvalidValue(format!(
                "base URL must start with ws:// or wss://, got '{}'",
                self.base_url
            )));
        }
        if self.population == 0 {
            return Err(ConfigError::InvalidValue(
                "population must be at least 1".to_string(),
            ));
        }
        if !self.time_step.is_finite() || self.time_step <= 0.0 {
            return Err(ConfigError::InvalidValue(format!(
                "time step must be positive, got {}",
                self.time_step
            )));
        }
        if self.tick_hz == 0 {
            return Err(ConfigError::InvalidValue(
                "tick rate must be at least 1 Hz".to_string(),
            ));
        }
        Ok(())
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            delay: self.reconnect_delay,
            max_attempts: self.max_reconnect_attempts,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            population: self.population,
            time_step: self.time_step,
            seed: None,
        }
    }

    /// Wall-clock period of one presentation tick
    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_hz))
    }
}

fn parse_var<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidVar {
        name: name.to_string(),
        value: raw.to_string(),
    })
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {name}: '{value}'")]
    InvalidVar { name: String, value: String },
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}
