// NKC (Neuro-Kinematic Container) session logs
//
// {
//   "metadata": {
//     "subject_id": "user_test",
//     "session_id": "sess_1718000000",
//     "timestamp_start": "2024-06-10T08:53:20.000000+00:00",
//     "protocol": "NKC_v1.0_Simulation"
//   },
//   "streams": {
//     "features": [ { "ts": 0.05, "theta": 0.4, "beta": 0.5 } ],
//     "physics":  [ { "ts": 0.05, "alpha": 0.03, "fluidity": 0.82 } ],
//     "markers":  [ { "ts": 0.05, "label": "ACTION_START_WALK" } ]
//   }
// }
//
// `ts` is seconds; features and physics are appended pairwise, so the two
// streams stay index-aligned.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info};

use crate::drive::DriveFrame;
use crate::error::{NeuroSyncError, Result};

pub const PROTOCOL: &str = "NKC_v1.0_Simulation";
pub const SESSION_SUFFIX: &str = ".nkc.json";
pub const DEFAULT_SUBJECT: &str = "user_test";
pub const ACTION_MARKER_PREFIX: &str = "ACTION_START_";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetadata {
    pub subject_id: String,
    pub session_id: String,
    /// ISO-8601 start time
    pub timestamp_start: String,
    pub protocol: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureSample {
    pub ts: f64,
    pub theta: f64,
    pub beta: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhysicsSample {
    pub ts: f64,
    pub alpha: f64,
    pub fluidity: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub ts: f64,
    pub label: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionStreams {
    #[serde(default)]
    pub features: Vec<FeatureSample>,
    #[serde(default)]
    pub physics: Vec<PhysicsSample>,
    #[serde(default)]
    pub markers: Vec<Marker>,
}

/// One recorded session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLog {
    pub metadata: SessionMetadata,
    pub streams: SessionStreams,
}

impl SessionLog {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let log = serde_json::from_str(&raw)?;
        debug!("Loaded session log {}", path.display());
        Ok(log)
    }

    pub fn file_name(&self) -> String {
        format!("{}{}", self.metadata.session_id, SESSION_SUFFIX)
    }
}

/// In-memory session buffer, flushed with [`SessionLogger::save`]
#[derive(Debug, Clone)]
pub struct SessionLogger {
    log: SessionLog,
    last_action: Option<String>,
}

impl SessionLogger {
    /// Start a session named `sess_<unix seconds>`
    pub fn new(subject_id: impl Into<String>) -> Self {
        let session_id = format!("sess_{}", Utc::now().timestamp());
        Self::with_session_id(subject_id, session_id)
    }

    pub fn with_session_id(subject_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        let metadata = SessionMetadata {
            subject_id: subject_id.into(),
            session_id: session_id.into(),
            timestamp_start: Utc::now().to_rfc3339(),
            protocol: PROTOCOL.to_string(),
        };
        info!("Session {} initialized", metadata.session_id);

        Self {
            log: SessionLog {
                metadata,
                streams: SessionStreams::default(),
            },
            last_action: None,
        }
    }

    pub fn session_id(&self) -> &str {
        &self.log.metadata.session_id
    }

    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    pub fn into_log(self) -> SessionLog {
        self.log
    }

    /// Append one feature sample and one physics sample
    pub fn log_frame(&mut self, ts: f64, theta: f64, beta: f64, alpha: f64, fluidity: f64) {
        self.log
            .streams
            .features
            .push(FeatureSample { ts, theta, beta });
        self.log
            .streams
            .physics
            .push(PhysicsSample { ts, alpha, fluidity });
    }

    pub fn log_marker(&mut self, ts: f64, label: impl Into<String>) {
        self.log.streams.markers.push(Marker {
            ts,
            label: label.into(),
        });
    }

    /// Record a drive frame.
    ///
    /// A frame with both parameters and fluidity becomes one sample in each
    /// stream; an action that differs from the previous one adds an
    /// `ACTION_START_<label>` marker.
    pub fn record(&mut self, ts: f64, frame: &DriveFrame) {
        if let Some(action) = &frame.action {
            if self.last_action.as_ref() != Some(action) {
                self.log_marker(ts, format!("{}{}", ACTION_MARKER_PREFIX, action));
                self.last_action = Some(action.clone());
            }
        }

        if let (Some(params), Some(fluidity)) = (frame.params, frame.fluidity) {
            self.log_frame(ts, params.theta, params.beta, params.alpha, fluidity);
        }
    }

    /// Write `<session_id>.nkc.json` into `dir`, creating it if needed
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(self.log.file_name());
        let json = serde_json::to_string_pretty(&self.log)?;
        fs::write(&path, json)?;
        info!(
            "Session {} saved to {} ({} samples, {} markers)",
            self.session_id(),
            path.display(),
            self.log.streams.physics.len(),
            self.log.streams.markers.len()
        );
        Ok(path)
    }
}

/// Most recently modified `*.nkc.json` session log in `dir`
pub fn latest_in(dir: &Path) -> Result<PathBuf> {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let pattern = Path::new(&escaped).join(format!("*{}", SESSION_SUFFIX));
    debug!("Searching for session logs: {}", pattern.display());

    let mut latest: Option<(SystemTime, PathBuf)> = None;
    for entry in glob::glob(&pattern.to_string_lossy())? {
        let path = entry?;
        if !path.is_file() {
            continue;
        }

        let modified = fs::metadata(&path)?.modified()?;
        let newer = match &latest {
            Some((best, best_path)) => (modified, &path) > (*best, best_path),
            None => true,
        };
        if newer {
            latest = Some((modified, path));
        }
    }

    latest
        .map(|(_, path)| path)
        .ok_or_else(|| NeuroSyncError::NoSessions(dir.to_path_buf()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::action::physics_params;
    use crate::drive::DriveMode;
    use tempfile::TempDir;

    fn frame(action: Option<&str>, beta: Option<f64>, fluidity: Option<f64>) -> DriveFrame {
        DriveFrame {
            source: DriveMode::Remote,
            tick: 0,
            coherence: fluidity.unwrap_or(0.0),
            mean_phase: None,
            phases: Vec::new(),
            params: beta.map(|b| physics_params(0.4, b)),
            fluidity,
            action: action.map(str::to_string),
        }
    }

    #[test]
    fn test_new_session_metadata() {
        let logger = SessionLogger::new("subject_01");
        let meta = &logger.log().metadata;
        assert_eq!(meta.subject_id, "subject_01");
        assert!(meta.session_id.starts_with("sess_"));
        assert_eq!(meta.protocol, "NKC_v1.0_Simulation");
        assert!(chrono::DateTime::parse_from_rfc3339(&meta.timestamp_start).is_ok());
    }

    #[test]
    fn test_record_logs_markers_on_action_change() {
        let mut logger = SessionLogger::with_session_id(DEFAULT_SUBJECT, "sess_test");

        logger.record(0.0, &frame(Some("WALK"), Some(0.5), Some(0.8)));
        logger.record(0.1, &frame(Some("WALK"), Some(0.5), Some(0.7)));
        logger.record(0.2, &frame(Some("RUN"), None, Some(0.6)));
        logger.record(0.3, &frame(None, Some(0.9), None));

        let streams = &logger.log().streams;
        let labels: Vec<&str> = streams.markers.iter().map(|m| m.label.as_str()).collect();
        assert_eq!(labels, vec!["ACTION_START_WALK", "ACTION_START_RUN"]);
        assert_eq!(streams.markers[1].ts, 0.2);

        assert_eq!(streams.features.len(), 2);
        assert_eq!(streams.physics.len(), 2);
        assert_eq!(streams.physics[1].fluidity, 0.7);
        assert!((streams.physics[0].alpha - 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let mut logger = SessionLogger::with_session_id("subject_02", "sess_42");
        logger.log_marker(0.0, "ACTION_START_STAND");
        logger.log_frame(0.0, 0.8, 0.1, 0.05, 0.9);
        logger.log_frame(0.5, 0.8, 0.1, 0.05, 0.85);

        let path = logger.save(&dir.path().join("logs")).unwrap();
        assert_eq!(path.file_name().unwrap(), "sess_42.nkc.json");

        let loaded = SessionLog::load(&path).unwrap();
        assert_eq!(&loaded, logger.log());

        let raw: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["streams"]["features"][1]["ts"], 0.5);
        assert_eq!(raw["metadata"]["protocol"], PROTOCOL);
    }

    #[test]
    fn test_latest_in_picks_newest_session() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            latest_in(dir.path()),
            Err(NeuroSyncError::NoSessions(_))
        ));

        fs::write(dir.path().join("notes.json"), "{}").unwrap();
        SessionLogger::with_session_id("s", "sess_1").save(dir.path()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        SessionLogger::with_session_id("s", "sess_2").save(dir.path()).unwrap();

        let latest = latest_in(dir.path()).unwrap();
        assert_eq!(latest.file_name().unwrap(), "sess_2.nkc.json");
    }

    #[test]
    fn test_latest_in_missing_dir() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            latest_in(&dir.path().join("absent")),
            Err(NeuroSyncError::NoSessions(_))
        ));
    }

    #[test]
    fn test_latest_in_ignores_non_session_files() {
        let dir = TempDir::new().unwrap();
        SessionLogger::with_session_id("s", "sess_old").save(dir.path()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        SessionLogger::with_session_id("s", "sess_new").save(dir.path()).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));

        // written last, but none of these match *.nkc.json as a file
        fs::write(dir.path().join("sess_later.json"), "{}").unwrap();
        fs::write(dir.path().join("sess_later.nkc.json.bak"), "{}").unwrap();
        fs::write(dir.path().join("nkc.json.txt"), "{}").unwrap();
        fs::create_dir(dir.path().join("archive.nkc.json")).unwrap();

        let latest = latest_in(dir.path()).unwrap();
        assert_eq!(latest.file_name().unwrap(), "sess_new.nkc.json");
    }

    #[test]
    fn test_latest_in_only_non_matching_files() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("notes.json"), "{}").unwrap();
        fs::write(dir.path().join("sess_1.nkc.yaml"), "").unwrap();

        assert!(matches!(
            latest_in(dir.path()),
            Err(NeuroSyncError::NoSessions(_))
        ));
    }

    #[test]
    fn test_load_rejects_malformed() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.nkc.json");
        fs::write(&path, r#"{"metadata": {}}"#).unwrap();
        assert!(matches!(
            SessionLog::load(&path),
            Err(NeuroSyncError::Format(_))
        ));
    }
}
