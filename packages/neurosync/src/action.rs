// Motion-action vocabulary
//
// Each discrete action maps to a pair of drive values:
//   theta - relaxed/idle drive, high when standing
//   beta  - focused/active drive, high when running
// The derived physics parameters follow the remote simulation:
//   alpha (damping)        = 0.01 + 0.05 * theta
//   b_ext (external field) = 0.05 * beta

use neurosync_stream::SimParams;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Drive pair used for labels outside the vocabulary
pub const DEFAULT_DRIVE: (f64, f64) = (0.5, 0.5);

/// Coupling strength reached at `beta = 1`
pub const K_MAX: f64 = 10.0;

/// Action order of the live demo
pub const DEMO_CYCLE: [MotionAction; 5] = [
    MotionAction::Stand,
    MotionAction::Walk,
    MotionAction::Run,
    MotionAction::Walk,
    MotionAction::Stand,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MotionAction {
    Stand,
    Walk,
    Run,
}

impl MotionAction {
    pub const ALL: [MotionAction; 3] = [Self::Stand, Self::Walk, Self::Run];

    /// Wire label
    pub fn label(self) -> &'static str {
        match self {
            Self::Stand => "STAND",
            Self::Walk => "WALK",
            Self::Run => "RUN",
        }
    }

    /// `(theta, beta)` for this action
    pub fn drive(self) -> (f64, f64) {
        match self {
            Self::Stand => (0.8, 0.1),
            Self::Walk => (0.4, 0.5),
            Self::Run => (0.1, 0.9),
        }
    }

    pub fn params(self) -> SimParams {
        let (theta, beta) = self.drive();
        physics_params(theta, beta)
    }
}

impl fmt::Display for MotionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for MotionAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "STAND" => Ok(Self::Stand),
            "WALK" => Ok(Self::Walk),
            "RUN" => Ok(Self::Run),
            other => Err(format!("Unknown action '{}': expected STAND, WALK or RUN", other)),
        }
    }
}

/// `(theta, beta)` for any label; unknown labels get [`DEFAULT_DRIVE`]
pub fn drive_for_label(label: &str) -> (f64, f64) {
    label
        .parse::<MotionAction>()
        .map(MotionAction::drive)
        .unwrap_or(DEFAULT_DRIVE)
}

/// Canonical spelling of a label: vocabulary labels upper-cased, others untouched
pub fn canonical_label(label: &str) -> String {
    match label.parse::<MotionAction>() {
        Ok(action) => action.label().to_string(),
        Err(_) => label.to_string(),
    }
}

pub fn damping(theta: f64) -> f64 {
    0.01 + 0.05 * theta
}

pub fn external_field(beta: f64) -> f64 {
    0.05 * beta
}

/// Full parameter set derived from a drive pair
pub fn physics_params(theta: f64, beta: f64) -> SimParams {
    SimParams {
        theta,
        alpha: damping(theta),
        beta,
        b_ext: Some(external_field(beta)),
    }
}

/// Coupling strength for a focus drive: `K = clamp(beta, 0, 1) · K_MAX`
///
/// Non-finite input yields zero coupling.
pub fn coupling_for_beta(beta: f64) -> f64 {
    if !beta.is_finite() {
        return 0.0;
    }
    beta.clamp(0.0, 1.0) * K_MAX
}

/// Endless iterator over [`DEMO_CYCLE`]
#[derive(Debug, Clone, Default)]
pub struct DemoCycle {
    index: usize,
}

impl DemoCycle {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Iterator for DemoCycle {
    type Item = MotionAction;

    fn next(&mut self) -> Option<Self::Item> {
        let action = DEMO_CYCLE[self.index % DEMO_CYCLE.len()];
        self.index += 1;
        Some(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vocabulary() {
        assert_eq!(MotionAction::Stand.drive(), (0.8, 0.1));
        assert_eq!(MotionAction::Walk.drive(), (0.4, 0.5));
        assert_eq!(MotionAction::Run.drive(), (0.1, 0.9));
        assert_eq!(drive_for_label("jump"), DEFAULT_DRIVE);
        assert_eq!(drive_for_label("run"), (0.1, 0.9));
    }

    #[test]
    fn test_label_parsing() {
        for action in MotionAction::ALL {
            assert_eq!(action.label().parse::<MotionAction>().unwrap(), action);
        }
        assert_eq!(" walk ".parse::<MotionAction>().unwrap(), MotionAction::Walk);
        assert!("SIT".parse::<MotionAction>().is_err());
        assert_eq!(canonical_label("stand"), "STAND");
        assert_eq!(canonical_label("Wave"), "Wave");
    }

    #[test]
    fn test_physics_params() {
        let params = MotionAction::Stand.params();
        assert!((params.alpha - 0.05).abs() < 1e-12);
        assert!((params.b_ext.unwrap() - 0.005).abs() < 1e-12);

        let params = physics_params(0.0, 1.0);
        assert!((params.alpha - 0.01).abs() < 1e-12);
        assert!((params.b_ext.unwrap() - 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_coupling_for_beta() {
        assert_eq!(coupling_for_beta(0.0), 0.0);
        assert!((coupling_for_beta(0.5) - 5.0).abs() < 1e-12);
        assert_eq!(coupling_for_beta(3.0), K_MAX);
        assert_eq!(coupling_for_beta(-1.0), 0.0);
        assert_eq!(coupling_for_beta(f64::NAN), 0.0);
    }

    #[test]
    fn test_demo_cycle_wraps() {
        let labels: Vec<&str> = DemoCycle::new().take(7).map(MotionAction::label).collect();
        assert_eq!(labels, vec!["STAND", "WALK", "RUN", "WALK", "STAND", "STAND", "WALK"]);
    }
}
