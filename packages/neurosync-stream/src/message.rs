// Wire messages
//
// Inbound (server -> client):
// {
//   "sim_params": { "theta": 0.4, "alpha": 0.03, "beta": 0.5 },
//   "fluidity_index": 0.82,
//   "current_action": "WALK"
// }
// Every top-level field is optional; unknown fields (joint angles, physics
// metadata) are ignored.
//
// Outbound (client -> server):
// { "theta": 0.5, "beta": 0.5 }   or   { "action": "RUN" }

use serde::{Deserialize, Serialize};

use crate::types::{StreamError, StreamResult};

/// Simulation drive parameters computed by the remote process
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SimParams {
    pub theta: f64,
    pub alpha: f64,
    pub beta: f64,
    /// External field magnitude, sent by the full-simulation endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub b_ext: Option<f64>,
}

/// Decoded inbound payload
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sim_params: Option<SimParams>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fluidity_index: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_action: Option<String>,
}

impl InboundMessage {
    pub fn decode(raw: &str) -> StreamResult<Self> {
        serde_json::from_str(raw).map_err(|e| StreamError::Parse(format!("Invalid JSON: {}", e)))
    }

    pub fn encode(&self) -> StreamResult<String> {
        serde_json::to_string(self).map_err(|e| StreamError::Serialization(e.to_string()))
    }

    /// Overwrite the fields `newer` carries; absent fields keep their value
    pub fn merge(&mut self, newer: &InboundMessage) {
        if let Some(params) = newer.sim_params {
            self.sim_params = Some(params);
        }
        if let Some(fluidity) = newer.fluidity_index {
            self.fluidity_index = Some(fluidity);
        }
        if let Some(action) = &newer.current_action {
            self.current_action = Some(action.clone());
        }
    }

    /// True when no known field is present
    pub fn is_empty(&self) -> bool {
        self.sim_params.is_none() && self.fluidity_index.is_none() && self.current_action.is_none()
    }
}

/// Outbound payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutboundMessage {
    /// Two named drive values
    Params { theta: f64, beta: f64 },
    /// Discrete motion label
    Action { action: String },
}

impl OutboundMessage {
    pub fn params(theta: f64, beta: f64) -> Self {
        Self::Params { theta, beta }
    }

    pub fn action(label: impl Into<String>) -> Self {
        Self::Action {
            action: label.into(),
        }
    }

    pub fn encode(&self) -> StreamResult<String> {
        serde_json::to_string(self).map_err(|e| StreamError::Serialization(e.to_string()))
    }

    pub fn decode(raw: &str) -> StreamResult<Self> {
        serde_json::from_str(raw).map_err(|e| StreamError::Parse(format!("Invalid JSON: {}", e)))
    }
}
