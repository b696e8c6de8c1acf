use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod cli;
mod commands;
mod exit_codes;
mod output;

use cli::Cli;
use neurosync::NeuroSyncConfig;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    // stdout carries command output, so logs go to stderr
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .init();

    let config = match NeuroSyncConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(exit_codes::CONFIG_ERROR);
        }
    };

    let exit_code = match cli.command {
        cli::Command::Simulate(args) => commands::simulate::execute(args, &config),
        cli::Command::Stream(args) => commands::stream::execute(args, &config).await,
        cli::Command::Analyze(args) => commands::analyze::execute(args, &config),
    };

    std::process::exit(exit_code);
}
