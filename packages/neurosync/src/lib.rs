//! NeuroSync adapter layer.
//!
//! Binds the Kuramoto engine and the live stream client into per-tick
//! [`DriveFrame`]s for a presentation layer, and records sessions in the NKC
//! (Neuro-Kinematic Container) log format for offline evaluation.

pub mod action;
pub mod config;
pub mod drive;
pub mod error;
pub mod metrics;
pub mod session;

pub use action::{coupling_for_beta, drive_for_label, physics_params, DemoCycle, MotionAction};
pub use config::{ConfigError, NeuroSyncConfig};
pub use drive::{drive_source, DriveFrame, DriveMode, DriveSource, LocalDrive, RemoteDrive, SteeredDrive};
pub use error::{NeuroSyncError, Result};
pub use metrics::{SessionMetrics, Verdict};
pub use session::{SessionLog, SessionLogger};

pub use kuramoto_rs;
pub use neurosync_stream;
