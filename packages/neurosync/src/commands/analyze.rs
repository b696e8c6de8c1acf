use anyhow::Context;
use neurosync::metrics::{SessionMetrics, Verdict, COUPLING_THRESHOLD, NJS_THRESHOLD};
use neurosync::session::{latest_in, SessionLog};
use neurosync::NeuroSyncConfig;
use serde::Serialize;
use std::path::PathBuf;

use crate::cli::AnalyzeArgs;
use crate::exit_codes;
use crate::output;

#[derive(Serialize)]
struct AnalyzeOutput {
    file: PathBuf,
    session_id: String,
    subject_id: String,
    #[serde(flatten)]
    metrics: SessionMetrics,
    verdict: Verdict,
}

pub fn execute(args: AnalyzeArgs, config: &NeuroSyncConfig) -> i32 {
    let result = run(&args, config).and_then(|report| {
        let text = if args.json {
            output::to_json(&report, args.compact)?
        } else {
            render_text(&report)
        };
        output::write_output(&text, None)
    });

    match result {
        Ok(()) => exit_codes::SUCCESS,
        Err(e) => exit_codes::report(e),
    }
}

fn run(args: &AnalyzeArgs, config: &NeuroSyncConfig) -> anyhow::Result<AnalyzeOutput> {
    let file = match &args.file {
        Some(file) => file.clone(),
        None => latest_in(args.dir.as_deref().unwrap_or(&config.log_dir))?,
    };

    let session = SessionLog::load(&file)
        .with_context(|| format!("Failed to read session log {}", file.display()))?;
    let metrics = SessionMetrics::from_session(&session)?;
    let verdict = metrics.verdict();

    Ok(AnalyzeOutput {
        file,
        session_id: session.metadata.session_id,
        subject_id: session.metadata.subject_id,
        metrics,
        verdict,
    })
}

fn render_text(report: &AnalyzeOutput) -> String {
    let coupling = report
        .metrics
        .intent_coupling
        .map_or_else(|| "undefined".to_string(), |c| format!("{:.4}", c));

    [
        format!("Analyzing Session: {}", report.session_id),
        format!("Subject: {}", report.subject_id),
        String::new(),
        "=== Evaluation Results ===".to_string(),
        format!(
            "1. Smoothness (NJS Proxy): {:.4} (Target: < {})",
            report.metrics.njs_score, NJS_THRESHOLD
        ),
        format!(
            "2. Intent Coupling (Corr): {} (Target: |r| > {})",
            coupling, COUPLING_THRESHOLD
        ),
        format!("3. Sample Count: {}", report.metrics.data_points),
        format!("4. Duration: {:.2} s", report.metrics.duration),
        String::new(),
        format!(">> VERDICT: {}", report.verdict),
    ]
    .join("\n")
}
