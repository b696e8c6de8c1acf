use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical endpoints exposed by the remote simulation process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamEndpoint {
    /// Full simulation: the client sends drive params, the server answers
    #[default]
    Simulation,
    /// Lightweight live metrics pushed by the server
    Live,
}

impl StreamEndpoint {
    pub fn path(self) -> &'static str {
        match self {
            Self::Simulation => "/ws/simulation",
            Self::Live => "/ws/stream",
        }
    }
}

impl fmt::Display for StreamEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Simulation => "simulation",
            Self::Live => "live",
        })
    }
}

impl FromStr for StreamEndpoint {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simulation" | "sim" => Ok(Self::Simulation),
            "live" | "stream" => Ok(Self::Live),
            other => Err(format!(
                "Unknown endpoint '{}': expected 'simulation' or 'live'",
                other
            )),
        }
    }
}

/// Join a configured base address with an endpoint path
pub fn endpoint_url(base: &str, endpoint: StreamEndpoint) -> String {
    format!("{}{}", base.trim_end_matches('/'), endpoint.path())
}
