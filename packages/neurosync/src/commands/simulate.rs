use anyhow::Context;
use neurosync::drive::{DriveSource, LocalDrive};
use neurosync::kuramoto_rs::EngineConfig;
use neurosync::session::SessionLogger;
use neurosync::{NeuroSyncConfig, NeuroSyncError};
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::SimulateArgs;
use crate::exit_codes;
use crate::output;

#[derive(Serialize)]
struct TickSample {
    tick: u64,
    time: f64,
    coherence: f64,
    mean_phase: f64,
}

#[derive(Serialize)]
struct SimulateOutput {
    population: usize,
    ticks: u64,
    time_step: f64,
    coupling: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    initial_coherence: f64,
    final_coherence: f64,
    mean_coherence: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    trace: Vec<TickSample>,
    #[serde(skip_serializing_if = "Option::is_none")]
    session_file: Option<PathBuf>,
}

pub fn execute(args: SimulateArgs, config: &NeuroSyncConfig) -> i32 {
    let result = run(&args, config).and_then(|summary| {
        if args.json {
            output::write_output(&output::to_json(&summary, args.compact)?, args.output.as_deref())
        } else {
            output::write_output(&render_text(&summary), args.output.as_deref())
        }
    });

    match result {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => exit_codes::report(e),
    }
}

fn run(args: &SimulateArgs, config: &NeuroSyncConfig) -> anyhow::Result<SimulateOutput> {
    if args.ticks == 0 {
        return Err(NeuroSyncError::InvalidInput("--ticks must be at least 1".to_string()).into());
    }

    let engine_config = EngineConfig {
        population: args.population.unwrap_or(config.population),
        time_step: args.dt.unwrap_or(config.time_step),
        seed: args.seed,
    };
    let mut drive =
        LocalDrive::from_config(&engine_config).context("Failed to create oscillator engine")?;

    match (&args.action, args.coupling) {
        (Some(action), _) => drive.apply_action(action.label()),
        (None, Some(coupling)) => drive.set_coupling(coupling),
        (None, None) => {}
    }

    let mut logger = args
        .session
        .log_session
        .then(|| SessionLogger::new(args.session.subject.clone()));
    if logger.is_some() && args.action.is_none() {
        tracing::warn!("No action given; the session log will only hold markers");
    }

    let initial_coherence = drive.engine().order_parameter().0;
    let mut trace = Vec::new();
    let mut coherence_sum = 0.0;

    for _ in 0..args.ticks {
        let frame = drive.next_frame();
        let time = frame.tick as f64 * engine_config.time_step;
        coherence_sum += frame.coherence;

        if args.every > 0 && frame.tick % args.every == 0 {
            trace.push(TickSample {
                tick: frame.tick,
                time,
                coherence: frame.coherence,
                mean_phase: frame.mean_phase.unwrap_or(0.0),
            });
        }
        if let Some(logger) = logger.as_mut() {
            logger.record(time, &frame);
        }
    }

    // frames report the state before their step
    let final_coherence = drive.engine().order_parameter().0;

    let session_file = match logger {
        Some(logger) => {
            let dir = args.session.log_dir.as_deref().unwrap_or(&config.log_dir);
            Some(logger.save(dir).context("Failed to save session log")?)
        }
        None => None,
    };

    tracing::info!(
        "Simulated {} ticks of {} oscillators, final coherence {:.4}",
        args.ticks,
        engine_config.population,
        final_coherence
    );

    Ok(SimulateOutput {
        population: engine_config.population,
        ticks: args.ticks,
        time_step: engine_config.time_step,
        coupling: drive.engine().coupling(),
        action: args.action.map(|a| a.label().to_string()),
        seed: args.seed,
        initial_coherence,
        final_coherence,
        mean_coherence: coherence_sum / args.ticks as f64,
        trace,
        session_file,
    })
}

fn render_text(summary: &SimulateOutput) -> String {
    let mut lines = Vec::new();

    for sample in &summary.trace {
        lines.push(format!(
            "tick {:>6}  t={:>8.2}  r={:.4}  psi={:+.4}",
            sample.tick, sample.time, sample.coherence, sample.mean_phase
        ));
    }
    if !summary.trace.is_empty() {
        lines.push(String::new());
    }

    lines.push(format!(
        "Oscillators: {}  K: {}  dt: {}",
        summary.population, summary.coupling, summary.time_step
    ));
    if let Some(action) = &summary.action {
        lines.push(format!("Action: {}", action));
    }
    lines.push(format!("Ticks: {}", summary.ticks));
    lines.push(format!("Initial coherence: {:.4}", summary.initial_coherence));
    lines.push(format!("Final coherence:   {:.4}", summary.final_coherence));
    lines.push(format!("Mean coherence:    {:.4}", summary.mean_coherence));
    if let Some(path) = &summary.session_file {
        lines.push(format!("Session saved to {}", path.display()));
    }

    lines.join("\n")
}
