use rand::Rng;
use std::f64::consts::TAU;

use crate::types::{FREQUENCY_MEAN, FREQUENCY_STD};

/// Box–Muller transform of two uniform samples into one standard normal.
///
/// `u1` must lie in (0, 1]; `u2` in [0, 1).
pub fn box_muller(u1: f64, u2: f64) -> f64 {
    (-2.0 * u1.ln()).sqrt() * (TAU * u2).cos()
}

/// Draw a standard normal sample from two fresh uniforms
pub fn standard_normal<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    // `random::<f64>()` is [0, 1); flip it so ln() never sees zero
    let u1 = 1.0 - rng.random::<f64>();
    let u2 = rng.random::<f64>();
    box_muller(u1, u2)
}

/// Natural frequency `1.0 + 0.2·z`
pub fn natural_frequency<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    FREQUENCY_MEAN + standard_normal(rng) * FREQUENCY_STD
}

/// Initial phase, uniform in [0, 2π)
pub fn initial_phase<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.random_range(0.0..TAU)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_box_muller_known_values() {
        // u1 = 1 collapses the radius
        assert_eq!(box_muller(1.0, 0.3), 0.0);

        // u2 = 0 puts all mass on the cosine peak
        let expected = (-2.0 * 0.5f64.ln()).sqrt();
        assert!((box_muller(0.5, 0.0) - expected).abs() < 1e-12);

        // half a turn flips the sign
        assert!((box_muller(0.5, 0.5) + expected).abs() < 1e-12);
    }

    #[test]
    fn test_standard_normal_moments() {
        let mut rng = StdRng::seed_from_u64(7);
        let n = 20_000;
        let samples: Vec<f64> = (0..n).map(|_| standard_normal(&mut rng)).collect();

        let mean = samples.iter().sum::<f64>() / n as f64;
        let var = samples.iter().map(|z| (z - mean).powi(2)).sum::<f64>() / n as f64;

        assert!(mean.abs() < 0.05, "mean {}", mean);
        assert!((var - 1.0).abs() < 0.05, "variance {}", var);
        assert!(samples.iter().all(|z| z.is_finite()));
    }

    #[test]
    fn test_initial_phase_range() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..10_000 {
            let phase = initial_phase(&mut rng);
            assert!((0.0..TAU).contains(&phase));
        }
    }
}
