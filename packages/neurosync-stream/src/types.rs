// Common types for the stream client

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

use crate::message::InboundMessage;

/// Delay between a lost connection and the next attempt
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(3000);

/// Result type for stream operations
pub type StreamResult<T> = Result<T, StreamError>;

/// Errors that can occur while streaming
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("WebSocket error: {0}")]
    WebSocket(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Channel closed")]
    ChannelClosed,
}

/// Connection lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Constructed, never connected
    #[default]
    Idle,

    /// A connection attempt is in flight
    Connecting,

    /// Channel established
    Open,

    /// Channel lost or torn down
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        f.write_str(label)
    }
}

/// Fixed-delay reconnect policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub delay: Duration,
    /// Consecutive failed attempts before giving up; `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            delay: DEFAULT_RECONNECT_DELAY,
            max_attempts: None,
        }
    }
}

impl ReconnectPolicy {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// Whether the `attempt`-th consecutive retry is still allowed
    pub fn allows(&self, attempt: u32) -> bool {
        self.max_attempts.map_or(true, |max| attempt <= max)
    }
}

/// Outcome of a best-effort send
#[must_use]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Handed to the open channel
    Sent,
    /// Discarded because the channel is not open
    Dropped,
}

impl SendOutcome {
    pub fn is_sent(self) -> bool {
        matches!(self, Self::Sent)
    }
}

/// Most recent successfully decoded inbound payload
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatestData {
    /// Increments with every accepted message
    pub sequence: u64,
    /// The newest payload as received
    pub message: InboundMessage,
    /// Every accepted payload folded together, newest field values winning
    pub merged: InboundMessage,
    pub received_at: DateTime<Utc>,
}

/// Events observable by the client's owner
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    StateChanged { state: ConnectionState },
    ReconnectScheduled { attempt: u32, delay_ms: u64 },
    ReconnectAbandoned { attempts: u32 },
    MessageReceived { sequence: u64 },
    MessageDiscarded { reason: String },
    SendDropped { state: ConnectionState },
}

/// Counters for a client's lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ClientStats {
    pub connection_attempts: u64,
    pub messages_received: u64,
    pub messages_discarded: u64,
    pub sends_dropped: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy() {
        let policy = ReconnectPolicy::default();
        assert_eq!(policy.delay, Duration::from_millis(3000));
        assert!(policy.allows(1));
        assert!(policy.allows(u32::MAX));
    }

    #[test]
    fn test_capped_policy() {
        let policy = ReconnectPolicy {
            delay: Duration::from_millis(10),
            max_attempts: Some(2),
        };
        assert!(policy.allows(1));
        assert!(policy.allows(2));
        assert!(!policy.allows(3));
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_string(&ConnectionState::Connecting).unwrap();
        assert_eq!(json, "\"connecting\"");
        assert_eq!(ConnectionState::default(), ConnectionState::Idle);
        assert_eq!(ConnectionState::Open.to_string(), "open");
    }

    #[test]
    fn test_event_serialization() {
        let event = ClientEvent::ReconnectScheduled {
            attempt: 1,
            delay_ms: 3000,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "reconnect_scheduled");
        assert_eq!(json["delay_ms"], 3000);
    }
}
