// Drive sources
//
// A drive source produces one `DriveFrame` per presentation tick. Three sources
// are interchangeable behind `Box<dyn DriveSource>`:
//
//   LocalDrive   - frames come straight from a local oscillator engine
//   RemoteDrive  - frames reflect the latest parameters pushed by the remote
//                  simulation process
//   SteeredDrive - remote beta sets the local coupling strength
//
// The remote side publishes partial messages. The stream client folds every
// accepted message into a merged view, and `RemoteDrive` reads that view, so
// absent fields keep the value they last had even when several messages land
// between two ticks.

use kuramoto_rs::{EngineConfig, OscillatorEngine};
use neurosync_stream::{InboundMessage, SimParams, StreamClient};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::action::{canonical_label, coupling_for_beta, drive_for_label, physics_params};
use crate::error::{NeuroSyncError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriveMode {
    #[default]
    Local,
    Remote,
    Steered,
}

impl DriveMode {
    pub fn requires_stream(self) -> bool {
        !matches!(self, Self::Local)
    }
}

impl fmt::Display for DriveMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Local => "local",
            Self::Remote => "remote",
            Self::Steered => "steered",
        })
    }
}

impl FromStr for DriveMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "remote" => Ok(Self::Remote),
            "steered" => Ok(Self::Steered),
            other => Err(format!(
                "Unknown drive mode '{}': expected local, remote or steered",
                other
            )),
        }
    }
}

/// Per-tick value handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DriveFrame {
    pub source: DriveMode,
    pub tick: u64,
    /// Synchronization level in [0, 1]
    pub coherence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mean_phase: Option<f64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub phases: Vec<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<SimParams>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fluidity: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

impl DriveFrame {
    /// Drop the per-oscillator phases, e.g. before printing
    pub fn without_phases(mut self) -> Self {
        self.phases = Vec::new();
        self
    }
}

pub trait DriveSource: Send {
    fn mode(&self) -> DriveMode;

    /// Advance one presentation tick
    fn next_frame(&mut self) -> DriveFrame;
}

/// Local engine drive
#[derive(Debug)]
pub struct LocalDrive {
    engine: OscillatorEngine,
    params: Option<SimParams>,
    action: Option<String>,
}

impl LocalDrive {
    pub fn new(engine: OscillatorEngine) -> Self {
        Self {
            engine,
            params: None,
            action: None,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Ok(Self::new(OscillatorEngine::from_config(config)?))
    }

    pub fn set_coupling(&mut self, coupling: f64) {
        self.engine.set_coupling(coupling);
    }

    /// Drive the engine from a `(theta, beta)` pair
    pub fn apply_params(&mut self, theta: f64, beta: f64) {
        let params = physics_params(theta, beta);
        self.engine.set_coupling(coupling_for_beta(params.beta));
        self.params = Some(params);
    }

    /// Drive the engine from a motion label; unknown labels use the default pair
    pub fn apply_action(&mut self, label: &str) {
        let (theta, beta) = drive_for_label(label);
        self.apply_params(theta, beta);
        self.action = Some(canonical_label(label));
    }

    pub fn engine(&self) -> &OscillatorEngine {
        &self.engine
    }

    fn step(&mut self, source: DriveMode) -> DriveFrame {
        let snapshot = self.engine.update();
        DriveFrame {
            source,
            tick: self.engine.ticks(),
            coherence: snapshot.coherence,
            mean_phase: Some(snapshot.mean_phase),
            phases: snapshot.phases,
            params: self.params,
            // the engine has no separate fluidity measure
            fluidity: Some(snapshot.coherence),
            action: self.action.clone(),
        }
    }
}

impl DriveSource for LocalDrive {
    fn mode(&self) -> DriveMode {
        DriveMode::Local
    }

    fn next_frame(&mut self) -> DriveFrame {
        self.step(DriveMode::Local)
    }
}

/// Remote parameters accumulated across partial messages
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteState {
    pub params: Option<SimParams>,
    pub fluidity: Option<f64>,
    pub action: Option<String>,
}

impl RemoteState {
    pub fn merge(&mut self, message: &InboundMessage) {
        if let Some(params) = message.sim_params {
            self.params = Some(params);
        }
        if let Some(fluidity) = message.fluidity_index {
            self.fluidity = Some(fluidity);
        }
        if let Some(action) = &message.current_action {
            self.action = Some(action.clone());
        }
    }
}

/// Drive from the remote simulation's latest payload
pub struct RemoteDrive {
    client: Arc<StreamClient>,
    seen: Option<u64>,
    state: RemoteState,
    tick: u64,
}

impl RemoteDrive {
    pub fn new(client: Arc<StreamClient>) -> Self {
        Self {
            client,
            seen: None,
            state: RemoteState::default(),
            tick: 0,
        }
    }

    pub fn client(&self) -> &Arc<StreamClient> {
        &self.client
    }

    pub fn state(&self) -> &RemoteState {
        &self.state
    }

    /// Fold in the client's latest payload if it is new.
    ///
    /// Returns true when something new was merged.
    pub fn observe(&mut self) -> bool {
        let sequence = self.client.latest_sequence();
        if sequence.is_none() || sequence == self.seen {
            return false;
        }

        match self.client.latest() {
            Some(latest) => {
                // the merged view covers frames that arrived since the last tick
                self.state.merge(&latest.merged);
                self.seen = Some(latest.sequence);
                tracing::trace!("Merged remote payload #{}", latest.sequence);
                true
            }
            None => false,
        }
    }
}

impl DriveSource for RemoteDrive {
    fn mode(&self) -> DriveMode {
        DriveMode::Remote
    }

    fn next_frame(&mut self) -> DriveFrame {
        self.observe();
        self.tick += 1;

        let coherence = self
            .state
            .fluidity
            .filter(|f| f.is_finite())
            .map_or(0.0, |f| f.clamp(0.0, 1.0));

        DriveFrame {
            source: DriveMode::Remote,
            tick: self.tick,
            coherence,
            mean_phase: None,
            phases: Vec::new(),
            params: self.state.params,
            fluidity: self.state.fluidity,
            action: self.state.action.clone(),
        }
    }
}

/// Local engine steered by remote parameters
pub struct SteeredDrive {
    local: LocalDrive,
    remote: RemoteDrive,
}

impl SteeredDrive {
    pub fn new(engine: OscillatorEngine, client: Arc<StreamClient>) -> Self {
        Self {
            local: LocalDrive::new(engine),
            remote: RemoteDrive::new(client),
        }
    }

    pub fn engine(&self) -> &OscillatorEngine {
        self.local.engine()
    }
}

impl DriveSource for SteeredDrive {
    fn mode(&self) -> DriveMode {
        DriveMode::Steered
    }

    fn next_frame(&mut self) -> DriveFrame {
        if self.remote.observe() {
            if let Some(params) = self.remote.state().params {
                self.local.set_coupling(coupling_for_beta(params.beta));
            }
        }

        let mut frame = self.local.step(DriveMode::Steered);
        let state = self.remote.state();
        frame.params = state.params;
        frame.action = state.action.clone();
        if state.fluidity.is_some() {
            frame.fluidity = state.fluidity;
        }
        frame
    }
}

/// Build the drive source for `mode`.
///
/// Remote and steered modes need a stream client.
pub fn drive_source(
    mode: DriveMode,
    engine: &EngineConfig,
    client: Option<Arc<StreamClient>>,
) -> Result<Box<dyn DriveSource>> {
    match (mode, client) {
        (DriveMode::Local, _) => Ok(Box::new(LocalDrive::from_config(engine)?)),
        (DriveMode::Remote, Some(client)) => Ok(Box::new(RemoteDrive::new(client))),
        (DriveMode::Steered, Some(client)) => Ok(Box::new(SteeredDrive::new(
            OscillatorEngine::from_config(engine)?,
            client,
        ))),
        (mode, None) => Err(NeuroSyncError::InvalidInput(format!(
            "{} drive needs a stream client",
            mode
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use neurosync_stream::ReconnectPolicy;

    fn engine_config() -> EngineConfig {
        EngineConfig::with_population(50).seeded(7)
    }

    fn idle_client() -> Arc<StreamClient> {
        Arc::new(StreamClient::new(
            "ws://127.0.0.1:9/ws/simulation",
            ReconnectPolicy::default(),
        ))
    }

    #[test]
    fn test_local_frames_follow_engine() {
        let mut drive = LocalDrive::from_config(&engine_config()).unwrap();
        drive.set_coupling(2.0);

        let frame = drive.next_frame();
        assert_eq!(frame.source, DriveMode::Local);
        assert_eq!(frame.tick, 1);
        assert_eq!(frame.phases.len(), 50);
        assert!((0.0..=1.0).contains(&frame.coherence));
        assert_eq!(frame.fluidity, Some(frame.coherence));
        assert!(frame.params.is_none());
        assert_eq!(drive.next_frame().tick, 2);
    }

    #[test]
    fn test_local_action_sets_params_and_coupling() {
        let mut drive = LocalDrive::from_config(&engine_config()).unwrap();
        drive.apply_action("run");

        assert!((drive.engine().coupling() - 9.0).abs() < 1e-12);
        let frame = drive.next_frame();
        assert_eq!(frame.action.as_deref(), Some("RUN"));
        let params = frame.params.unwrap();
        assert_eq!((params.theta, params.beta), (0.1, 0.9));

        drive.apply_action("wave");
        assert!((drive.engine().coupling() - 5.0).abs() < 1e-12);
        assert_eq!(drive.next_frame().action.as_deref(), Some("wave"));
    }

    #[test]
    fn test_remote_merges_partial_messages() {
        let client = idle_client();
        let mut drive = RemoteDrive::new(client.clone());

        let frame = drive.next_frame();
        assert_eq!(frame.coherence, 0.0);
        assert!(frame.params.is_none());

        assert!(client.on_message(
            r#"{"sim_params": {"theta": 0.8, "alpha": 0.05, "beta": 0.1}, "fluidity_index": 0.9, "current_action": "STAND"}"#
        ));
        let frame = drive.next_frame();
        assert_eq!(frame.coherence, 0.9);
        assert_eq!(frame.action.as_deref(), Some("STAND"));

        // fluidity only: params and action carry over
        assert!(client.on_message(r#"{"fluidity_index": 0.4}"#));
        let frame = drive.next_frame();
        assert_eq!(frame.fluidity, Some(0.4));
        assert_eq!(frame.params.unwrap().theta, 0.8);
        assert_eq!(frame.action.as_deref(), Some("STAND"));

        // malformed frames leave everything alone
        assert!(!client.on_message("{"));
        assert!(!drive.observe());
        assert_eq!(drive.next_frame().fluidity, Some(0.4));
    }

    #[test]
    fn test_remote_keeps_fields_from_messages_between_ticks() {
        let client = idle_client();
        let mut drive = RemoteDrive::new(client.clone());
        drive.next_frame();

        assert!(client.on_message(
            r#"{"sim_params": {"theta": 0.8, "alpha": 0.05, "beta": 0.1}, "current_action": "STAND"}"#
        ));
        assert!(client.on_message(r#"{"fluidity_index": 0.4}"#));

        let frame = drive.next_frame();
        let params = frame.params.unwrap();
        assert_eq!((params.theta, params.beta), (0.8, 0.1));
        assert_eq!(frame.fluidity, Some(0.4));
        assert_eq!(frame.action.as_deref(), Some("STAND"));
    }

    #[test]
    fn test_steered_coupling_survives_trailing_partial_message() {
        let client = idle_client();
        let engine = OscillatorEngine::from_config(&engine_config()).unwrap();
        let mut drive = SteeredDrive::new(engine, client.clone());

        assert!(client.on_message(
            r#"{"sim_params": {"theta": 0.4, "alpha": 0.03, "beta": 0.5}}"#
        ));
        assert!(client.on_message(r#"{"fluidity_index": 0.6}"#));

        let frame = drive.next_frame();
        assert!((drive.engine().coupling() - 5.0).abs() < 1e-12);
        assert_eq!(frame.params.unwrap().beta, 0.5);
        assert_eq!(frame.fluidity, Some(0.6));
    }

    #[test]
    fn test_remote_coherence_is_clamped() {
        let client = idle_client();
        let mut drive = RemoteDrive::new(client.clone());

        assert!(client.on_message(r#"{"fluidity_index": 1.7}"#));
        let frame = drive.next_frame();
        assert_eq!(frame.coherence, 1.0);
        assert_eq!(frame.fluidity, Some(1.7));
    }

    #[test]
    fn test_steered_drive_uses_remote_beta() {
        let client = idle_client();
        let engine = OscillatorEngine::from_config(&engine_config()).unwrap();
        let mut drive = SteeredDrive::new(engine, client.clone());

        drive.next_frame();
        assert_eq!(drive.engine().coupling(), 0.0);

        assert!(client.on_message(
            r#"{"sim_params": {"theta": 0.1, "alpha": 0.015, "beta": 0.9}, "current_action": "RUN"}"#
        ));
        let frame = drive.next_frame();
        assert!((drive.engine().coupling() - 9.0).abs() < 1e-12);
        assert_eq!(frame.source, DriveMode::Steered);
        assert_eq!(frame.action.as_deref(), Some("RUN"));
        assert_eq!(frame.phases.len(), 50);
        // no remote fluidity yet, so the local coherence stands in
        assert_eq!(frame.fluidity, Some(frame.coherence));
    }

    #[test]
    fn test_drive_source_selection() {
        let local = drive_source(DriveMode::Local, &engine_config(), None).unwrap();
        assert_eq!(local.mode(), DriveMode::Local);

        assert!(matches!(
            drive_source(DriveMode::Remote, &engine_config(), None),
            Err(NeuroSyncError::InvalidInput(_))
        ));

        let steered = drive_source(DriveMode::Steered, &engine_config(), Some(idle_client())).unwrap();
        assert_eq!(steered.mode(), DriveMode::Steered);
        assert!(DriveMode::Remote.requires_stream());
        assert_eq!("Steered".parse::<DriveMode>().unwrap(), DriveMode::Steered);
    }

    #[test]
    fn test_frame_serialization_skips_empty_fields() {
        let mut drive = LocalDrive::from_config(&engine_config()).unwrap();
        let frame = drive.next_frame().without_phases();
        let json = serde_json::to_value(&frame).unwrap();

        assert_eq!(json["source"], "local");
        assert!(json.get("phases").is_none());
        assert!(json.get("params").is_none());
        assert!(json.get("coherence").is_some());
    }
}
