use anyhow::Context;
use chrono::Utc;
use neurosync::action::canonical_label;
use neurosync::drive::{drive_source, DriveFrame, DriveSource};
use neurosync::neurosync_stream::{endpoint_url, ClientEvent, ConnectionState, StreamClient};
use neurosync::session::SessionLogger;
use neurosync::{DemoCycle, MotionAction, NeuroSyncConfig, NeuroSyncError};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cli::StreamArgs;
use crate::exit_codes;
use crate::output;

pub async fn execute(args: StreamArgs, config: &NeuroSyncConfig) -> i32 {
    match run(args, config).await {
        Ok(code) => code,
        Err(e) => exit_codes::report(e),
    }
}

fn positive_secs(flag: &str, value: Option<f64>) -> anyhow::Result<Option<Duration>> {
    match value {
        Some(secs) if secs.is_finite() && secs > 0.0 => Ok(Some(Duration::from_secs_f64(secs))),
        Some(secs) => Err(NeuroSyncError::InvalidInput(format!(
            "{} must be a positive number of seconds, got {}",
            flag, secs
        ))
        .into()),
        None => Ok(None),
    }
}

async fn run(args: StreamArgs, config: &NeuroSyncConfig) -> anyhow::Result<i32> {
    if !args.mode.requires_stream() {
        return Err(NeuroSyncError::InvalidInput(
            "stream needs --mode remote or steered; use `simulate` for local runs".to_string(),
        )
        .into());
    }
    let cycle_period = positive_secs("--cycle-secs", args.cycle_secs)?;
    let run_for = positive_secs("--duration", args.duration)?;

    let base_url = args.base_url.as_deref().unwrap_or(&config.base_url);
    let url = endpoint_url(base_url, args.endpoint);

    let mut policy = config.reconnect_policy();
    if let Some(ms) = args.reconnect_delay_ms {
        policy.delay = Duration::from_millis(ms);
    }
    if args.max_reconnects.is_some() {
        policy.max_attempts = args.max_reconnects;
    }

    let client = Arc::new(StreamClient::new(url.clone(), policy));
    let mut drive = drive_source(args.mode, &config.engine_config(), Some(Arc::clone(&client)))
        .context("Failed to create drive source")?;
    let mut events = client.subscribe();
    let mut logger = args
        .session
        .log_session
        .then(|| SessionLogger::new(args.session.subject.clone()));

    let print_every = args.print_every.unwrap_or(u64::from(config.tick_hz)).max(1);
    let mut ticker = tokio::time::interval(config.tick_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let deadline = async move {
        match run_for {
            Some(duration) => tokio::time::sleep(duration).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    let mut cycle = DemoCycle::new();
    let mut current_action: Option<MotionAction> = None;
    let mut next_switch: Option<Instant> = None;
    let mut ever_open = false;
    let mut abandoned = false;

    info!("Streaming from {} in {} mode", url, args.mode);
    client.connect();

    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                info!("Interrupted, shutting down");
                break;
            }
            _ = &mut deadline => {
                debug!("Run duration elapsed");
                break;
            }
            event = events.recv() => match event {
                Ok(ClientEvent::StateChanged { state: ConnectionState::Open }) => {
                    ever_open = true;
                    if let Some(period) = cycle_period {
                        if current_action.is_none() {
                            current_action = cycle.next();
                            next_switch = Some(Instant::now() + period);
                        }
                    }
                    announce(&client, &args, current_action);
                }
                Ok(ClientEvent::ReconnectAbandoned { attempts }) => {
                    warn!("Stopped reconnecting after {} attempts", attempts);
                    abandoned = true;
                    break;
                }
                Ok(event) => debug!("Client event: {:?}", event),
                Err(RecvError::Lagged(skipped)) => warn!("Missed {} client events", skipped),
                Err(RecvError::Closed) => break,
            },
            _ = ticker.tick() => {
                if let (Some(period), Some(at)) = (cycle_period, next_switch) {
                    if Instant::now() >= at {
                        current_action = cycle.next();
                        next_switch = Some(at + period);
                        info!("Switching action to {:?}", current_action);
                        announce(&client, &args, current_action);
                    }
                }

                let frame = drive.next_frame();
                if client.latest_sequence().is_none() {
                    continue;
                }
                if let Some(logger) = logger.as_mut() {
                    logger.record(unix_seconds(), &frame);
                }
                if frame.tick % print_every == 0 {
                    print_frame(&frame, client.state(), args.json)?;
                }
            }
        }
    }

    client.shutdown().await;

    if let Some(logger) = &logger {
        let dir = args.session.log_dir.as_deref().unwrap_or(&config.log_dir);
        let path = logger.save(dir).context("Failed to save session log")?;
        eprintln!("Session saved to {}", path.display());
    }

    let stats = client.stats();
    info!(
        "Stream finished: {} attempts, {} messages, {} discarded, {} sends dropped",
        stats.connection_attempts,
        stats.messages_received,
        stats.messages_discarded,
        stats.sends_dropped
    );

    if !ever_open || abandoned {
        let reason = client
            .last_error()
            .unwrap_or_else(|| "no connection established".to_string());
        eprintln!("Error: could not stay connected to {}: {}", url, reason);
        return Ok(exit_codes::CONNECTION_ERROR);
    }

    Ok(exit_codes::SUCCESS)
}

/// Send the configured drive to the remote process
fn announce(client: &StreamClient, args: &StreamArgs, current_action: Option<MotionAction>) {
    let outcome = match (args.theta, args.beta, &args.action, current_action) {
        (Some(theta), Some(beta), _, _) => client.send_params(theta, beta),
        (_, _, Some(label), _) => client.send_action(canonical_label(label)),
        (_, _, None, Some(action)) => client.send_action(action.label()),
        _ => return,
    };
    if !outcome.is_sent() {
        debug!("Drive not sent, connection is {}", client.state());
    }
}

fn unix_seconds() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}

fn print_frame(frame: &DriveFrame, state: ConnectionState, json: bool) -> anyhow::Result<()> {
    if json {
        let line = output::to_json(&frame.clone().without_phases(), true)?;
        return output::write_output(&line, None);
    }

    let mut line = format!(
        "tick {:>6} [{}] r={:.3}",
        frame.tick, state, frame.coherence
    );
    if let Some(fluidity) = frame.fluidity {
        line.push_str(&format!(" fluidity={:.3}", fluidity));
    }
    if let Some(params) = frame.params {
        line.push_str(&format!(
            " theta={:.2} beta={:.2} alpha={:.3}",
            params.theta, params.beta, params.alpha
        ));
    }
    if let Some(action) = &frame.action {
        line.push_str(&format!(" action={}", action));
    }
    output::write_output(&line, None)
}
