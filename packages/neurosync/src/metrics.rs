// Session evaluation
//
// NJS (normalised jerk score proxy): population standard deviation of the
// fluidity stream. Lower is smoother.
// Intent coupling: Pearson correlation between the beta (focus) stream and the
// fluidity stream. The sign is expected to be negative; only the magnitude is
// judged.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{NeuroSyncError, Result};
use crate::session::SessionLog;

pub const NJS_THRESHOLD: f64 = 0.2;
pub const COUPLING_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Pass,
    RequiresOptimization,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Pass => "PASS",
            Self::RequiresOptimization => "REQUIRES OPTIMIZATION",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionMetrics {
    pub njs_score: f64,
    /// `None` when the correlation is undefined (fewer than two samples or a
    /// constant stream)
    pub intent_coupling: Option<f64>,
    /// Seconds between the first and last physics sample
    pub duration: f64,
    pub data_points: usize,
}

impl SessionMetrics {
    /// Compute metrics for a recorded session
    ///
    /// # Returns
    /// An error if the session has no physics samples
    pub fn from_session(session: &SessionLog) -> Result<Self> {
        let physics = &session.streams.physics;
        let (first, last) = match (physics.first(), physics.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => {
                return Err(NeuroSyncError::InvalidInput(format!(
                    "session {} has no physics samples",
                    session.metadata.session_id
                )))
            }
        };

        let fluidity: Vec<f64> = physics.iter().map(|p| p.fluidity).collect();
        let beta: Vec<f64> = session.streams.features.iter().map(|f| f.beta).collect();

        if beta.len() != fluidity.len() {
            tracing::warn!(
                "Session {}: {} feature samples vs {} physics samples, correlating the common prefix",
                session.metadata.session_id,
                beta.len(),
                fluidity.len()
            );
        }

        Ok(Self {
            njs_score: std_dev(&fluidity),
            intent_coupling: pearson(&beta, &fluidity),
            duration: last.ts - first.ts,
            data_points: physics.len(),
        })
    }

    pub fn verdict(&self) -> Verdict {
        let coupled = self
            .intent_coupling
            .is_some_and(|c| c.abs() > COUPLING_THRESHOLD);
        if self.njs_score < NJS_THRESHOLD && coupled {
            Verdict::Pass
        } else {
            Verdict::RequiresOptimization
        }
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; zero for an empty slice
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Pearson correlation over the common prefix of `x` and `y`
pub fn pearson(x: &[f64], y: &[f64]) -> Option<f64> {
    let n = x.len().min(y.len());
    if n < 2 {
        return None;
    }
    let (x, y) = (&x[..n], &y[..n]);
    let (mx, my) = (mean(x), mean(y));

    let mut cov = 0.0;
    let mut var_x = 0.0;
    let mut var_y = 0.0;
    for (a, b) in x.iter().zip(y) {
        let (dx, dy) = (a - mx, b - my);
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    let denom = (var_x * var_y).sqrt();
    if denom == 0.0 || !denom.is_finite() {
        return None;
    }
    Some((cov / denom).clamp(-1.0, 1.0))
}
