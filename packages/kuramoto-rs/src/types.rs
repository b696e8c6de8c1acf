use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

/// Default number of oscillators
pub const DEFAULT_POPULATION: usize = 100;

/// Default integration step per tick
pub const DEFAULT_TIME_STEP: f64 = 0.05;

/// Centre of the natural frequency distribution
pub const FREQUENCY_MEAN: f64 = 1.0;

/// Spread of the natural frequency distribution
pub const FREQUENCY_STD: f64 = 0.2;

/// Engine construction parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub population: usize,
    pub time_step: f64,
    /// Fixed RNG seed; `None` draws from the thread RNG
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            population: DEFAULT_POPULATION,
            time_step: DEFAULT_TIME_STEP,
            seed: None,
        }
    }
}

impl EngineConfig {
    pub fn with_population(population: usize) -> Self {
        Self {
            population,
            ..Self::default()
        }
    }

    pub fn seeded(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }
}

/// Result of a single `update()` call.
///
/// `phases` is a buffer owned by the snapshot; holding on to it never affects
/// later ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderParameterSnapshot {
    pub phases: Vec<f64>,
    /// Magnitude of the order parameter, in [0, 1]
    pub coherence: f64,
    /// Argument of the order parameter, in (-π, π]
    pub mean_phase: f64,
}

impl OrderParameterSnapshot {
    /// Phases reduced to [0, 2π) for display
    pub fn wrapped(&self) -> Vec<f64> {
        self.phases.iter().map(|theta| theta.rem_euclid(TAU)).collect()
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }
}
