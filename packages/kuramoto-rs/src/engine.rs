use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::error::{EngineError, Result};
use crate::sampling::{initial_phase, natural_frequency};
use crate::types::{EngineConfig, OrderParameterSnapshot};

/// Mean-field Kuramoto population
///
/// Owns the phase and natural-frequency buffers. `update` takes `&mut self`, so a
/// single tick loop is the only writer; every snapshot carries its own copy of
/// the phases.
#[derive(Debug, Clone)]
pub struct OscillatorEngine {
    phases: Vec<f64>,
    frequencies: Vec<f64>,
    coupling: f64,
    time_step: f64,
    ticks: u64,
}

impl OscillatorEngine {
    /// Create a population of `population` oscillators with the default time step
    ///
    /// # Returns
    /// An error if `population` is zero
    pub fn new(population: usize) -> Result<Self> {
        Self::from_config(&EngineConfig::with_population(population))
    }

    /// Create a population from a full configuration
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        match config.seed {
            Some(seed) => Self::with_rng(config, &mut StdRng::seed_from_u64(seed)),
            None => Self::with_rng(config, &mut rand::rng()),
        }
    }

    /// Create a population drawing initial state from `rng`
    ///
    /// Phases are uniform in [0, 2π); natural frequencies are `1.0 + 0.2·z` with
    /// `z` from the Box–Muller transform.
    pub fn with_rng<R: Rng + ?Sized>(config: &EngineConfig, rng: &mut R) -> Result<Self> {
        if config.population == 0 {
            return Err(EngineError::InvalidPopulation(config.population));
        }
        if !config.time_step.is_finite() || config.time_step <= 0.0 {
            return Err(EngineError::InvalidTimeStep(config.time_step));
        }

        let n = config.population;
        let phases: Vec<f64> = (0..n).map(|_| initial_phase(rng)).collect();
        let frequencies: Vec<f64> = (0..n).map(|_| natural_frequency(rng)).collect();

        log::debug!(
            "Created oscillator population: n={}, dt={}, seeded={}",
            n,
            config.time_step,
            config.seed.is_some()
        );

        Ok(Self {
            phases,
            frequencies,
            coupling: 0.0,
            time_step: config.time_step,
            ticks: 0,
        })
    }

    /// Set the coupling strength K used from the next `update` on.
    ///
    /// Any value is accepted; large or negative K only changes the dynamics.
    pub fn set_coupling(&mut self, coupling: f64) {
        if !coupling.is_finite() {
            log::warn!("Non-finite coupling strength {} set on engine", coupling);
        }
        self.coupling = coupling;
    }

    /// Advance every oscillator by one time step.
    ///
    /// All velocities are computed from the pre-update phases and mean field, so
    /// the step is synchronous. The returned coherence and mean phase describe
    /// the field that drove this step.
    pub fn update(&mut self) -> OrderParameterSnapshot {
        let (coherence, mean_phase) = order_parameter(&self.phases);
        let pull = self.coupling * coherence;
        let dt = self.time_step;

        let next: Vec<f64> = self
            .phases
            .iter()
            .zip(&self.frequencies)
            .map(|(&theta, &omega)| theta + (omega + pull * (mean_phase - theta).sin()) * dt)
            .collect();

        self.phases = next;
        self.ticks += 1;

        OrderParameterSnapshot {
            phases: self.phases.clone(),
            coherence,
            mean_phase,
        }
    }

    /// Order parameter of the current phases without advancing
    pub fn order_parameter(&self) -> (f64, f64) {
        order_parameter(&self.phases)
    }

    pub fn coupling(&self) -> f64 {
        self.coupling
    }

    pub fn time_step(&self) -> f64 {
        self.time_step
    }

    pub fn len(&self) -> usize {
        self.phases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phases.is_empty()
    }

    /// Number of completed updates
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Simulated time elapsed, `ticks · dt`
    pub fn elapsed(&self) -> f64 {
        self.ticks as f64 * self.time_step
    }

    pub fn phases(&self) -> &[f64] {
        &self.phases
    }

    pub fn natural_frequencies(&self) -> &[f64] {
        &self.frequencies
    }
}

/// Compute `(r, ψ)` with `r·e^(iψ) = (1/N) Σⱼ e^(iθⱼ)`.
///
/// An empty slice has no field and yields `(0, 0)`.
pub fn order_parameter(phases: &[f64]) -> (f64, f64) {
    if phases.is_empty() {
        return (0.0, 0.0);
    }

    let n = phases.len() as f64;
    let (sum_cos, sum_sin) = phases
        .iter()
        .fold((0.0, 0.0), |(c, s), &theta| (c + theta.cos(), s + theta.sin()));

    let mean_real = sum_cos / n;
    let mean_imag = sum_sin / n;

    let r = (mean_real * mean_real + mean_imag * mean_imag).sqrt();
    // rounding can push a perfectly aligned population a hair above 1
    let r = if r > 1.0 { 1.0 } else { r };

    (r, mean_imag.atan2(mean_real))
}
