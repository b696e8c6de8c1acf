//! Mean-field Kuramoto engine.
//!
//! A fixed population of phase oscillators is advanced once per tick with
//!
//! ```text
//! dθᵢ/dt = ωᵢ + K·r·sin(ψ − θᵢ)
//! ```
//!
//! where `r·e^(iψ) = (1/N) Σⱼ e^(iθⱼ)` is the order parameter. Each update costs
//! O(N), which keeps the engine cheap enough to drive a render loop directly.

pub mod engine;
pub mod error;
pub mod sampling;
pub mod types;

pub use engine::{order_parameter, OscillatorEngine};
pub use error::{EngineError, Result};
pub use types::*;
