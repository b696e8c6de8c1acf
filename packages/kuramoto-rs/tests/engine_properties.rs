use kuramoto_rs::{EngineConfig, OscillatorEngine, DEFAULT_TIME_STEP};
use std::f64::consts::TAU;

fn seeded(population: usize, seed: u64) -> OscillatorEngine {
    OscillatorEngine::from_config(&EngineConfig::with_population(population).seeded(seed)).unwrap()
}

/// Mean coherence over the last `window` of `ticks` updates at coupling `k`
fn settled_coherence(seed: u64, k: f64, ticks: usize, window: usize) -> f64 {
    let mut engine = seeded(200, seed);
    engine.set_coupling(k);

    let mut tail = Vec::with_capacity(window);
    for t in 0..ticks {
        let snapshot = engine.update();
        if t >= ticks - window {
            tail.push(snapshot.coherence);
        }
    }
    tail.iter().sum::<f64>() / tail.len() as f64
}

#[test]
fn test_initial_distribution_over_many_constructions() {
    let mut frequencies = Vec::new();

    for seed in 0..50 {
        let engine = seeded(100, seed);
        assert!(engine.phases().iter().all(|&p| (0.0..TAU).contains(&p)));
        frequencies.extend_from_slice(engine.natural_frequencies());
    }

    let n = frequencies.len() as f64;
    let mean = frequencies.iter().sum::<f64>() / n;
    let std = (frequencies.iter().map(|w| (w - mean).powi(2)).sum::<f64>() / n).sqrt();

    assert!((mean - 1.0).abs() < 0.02, "frequency mean {}", mean);
    assert!((std - 0.2).abs() < 0.02, "frequency std {}", std);
}

#[test]
fn test_unseeded_construction_is_valid() {
    for population in [1, 2, 17, 100, 500] {
        let engine = OscillatorEngine::new(population).unwrap();
        assert_eq!(engine.len(), population);
        assert!(engine.phases().iter().all(|&p| (0.0..TAU).contains(&p)));
        assert!(engine.natural_frequencies().iter().all(|w| w.is_finite()));
    }
}

#[test]
fn test_zero_coupling_oscillators_are_independent() {
    let mut engine = seeded(64, 21);
    let initial = engine.phases().to_vec();
    let omega = engine.natural_frequencies().to_vec();

    let ticks = 200;
    let mut expected = initial.clone();
    let mut last = None;
    for _ in 0..ticks {
        for (e, w) in expected.iter_mut().zip(&omega) {
            *e += w * DEFAULT_TIME_STEP;
        }
        last = Some(engine.update());
    }

    let last = last.unwrap();
    for (actual, want) in last.phases.iter().zip(&expected) {
        assert!((actual - want).abs() < 1e-9, "{} vs {}", actual, want);
    }
}

#[test]
fn test_coherence_stays_in_unit_interval() {
    for (seed, k) in [(1, 0.0), (2, 0.5), (3, 2.0), (4, 10.0), (5, 20.0), (6, -3.0)] {
        let mut engine = seeded(150, seed);
        engine.set_coupling(k);
        for _ in 0..300 {
            let snapshot = engine.update();
            assert!(
                (0.0..=1.0).contains(&snapshot.coherence),
                "coherence {} at k={}",
                snapshot.coherence,
                k
            );
        }
    }
}

#[test]
fn test_single_oscillator_is_fully_coherent() {
    let mut engine = seeded(1, 8);
    engine.set_coupling(3.0);
    for _ in 0..20 {
        let snapshot = engine.update();
        assert!((snapshot.coherence - 1.0).abs() < 1e-12);
    }
}

#[test]
fn test_coherence_rises_with_coupling() {
    let couplings = [0.0, 1.0, 5.0, 20.0];
    let levels: Vec<f64> = couplings
        .iter()
        .map(|&k| settled_coherence(1234, k, 600, 200))
        .collect();

    assert!(levels[0] < 0.3, "uncoupled coherence {}", levels[0]);
    assert!(levels[3] > 0.9, "strongly coupled coherence {}", levels[3]);

    for pair in levels.windows(2) {
        assert!(
            pair[1] + 0.05 >= pair[0],
            "coherence fell as coupling grew: {:?}",
            levels
        );
    }
}

#[test]
fn test_coupling_ramp_trend() {
    let mut engine = seeded(200, 77);
    let mut block_means = Vec::new();

    for step in 0..=10 {
        engine.set_coupling(step as f64 * 2.0);
        let mut sum = 0.0;
        for _ in 0..150 {
            sum += engine.update().coherence;
        }
        block_means.push(sum / 150.0);
    }

    let first = block_means[0];
    let last = *block_means.last().unwrap();
    assert!(last > first + 0.5, "ramp {:?}", block_means);
}

#[test]
fn test_snapshot_serializes() {
    let mut engine = seeded(4, 2);
    let snapshot = engine.update();
    let json = serde_json::to_value(&snapshot).unwrap();
    assert_eq!(json["phases"].as_array().unwrap().len(), 4);
    assert!(json["coherence"].is_number());
    assert!(json["mean_phase"].is_number());
}
