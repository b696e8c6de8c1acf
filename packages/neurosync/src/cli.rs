use clap::{Args, Parser, Subcommand};
use neurosync::drive::DriveMode;
use neurosync::neurosync_stream::StreamEndpoint;
use neurosync::MotionAction;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "neurosync",
    version,
    about = "Kuramoto synchronization engine and live simulation stream client",
    long_about = "Run the mean-field Kuramoto engine locally, follow a remote simulation \
                  process over WebSocket, and evaluate recorded NKC sessions.\n\
                  Defaults come from NEUROSYNC_* environment variables (or a .env file)."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the oscillator engine locally
    Simulate(SimulateArgs),
    /// Follow a remote simulation process
    Stream(StreamArgs),
    /// Evaluate a recorded session log
    Analyze(AnalyzeArgs),
}

/// Session log options shared by `simulate` and `stream`
#[derive(Args)]
pub struct SessionArgs {
    /// Record the run as an NKC session log
    #[arg(long, default_value_t = false)]
    pub log_session: bool,

    /// Directory for session logs [default: $NEUROSYNC_LOG_DIR or data_logs]
    #[arg(long)]
    pub log_dir: Option<PathBuf>,

    /// Subject identifier written to the session metadata
    #[arg(long, default_value = "user_test")]
    pub subject: String,
}

#[derive(Args)]
pub struct SimulateArgs {
    /// Number of oscillators [default: $NEUROSYNC_POPULATION or 100]
    #[arg(short = 'n', long)]
    pub population: Option<usize>,

    /// Number of ticks to run
    #[arg(long, default_value_t = 300)]
    pub ticks: u64,

    /// Coupling strength K
    #[arg(short = 'k', long, conflicts_with = "action")]
    pub coupling: Option<f64>,

    /// Drive the engine from a motion action (STAND, WALK, RUN)
    #[arg(long)]
    pub action: Option<MotionAction>,

    /// Integration step [default: $NEUROSYNC_TIME_STEP or 0.05]
    #[arg(long)]
    pub dt: Option<f64>,

    /// RNG seed for reproducible runs
    #[arg(long)]
    pub seed: Option<u64>,

    /// Report coherence every N ticks (0 = summary only)
    #[arg(long, default_value_t = 0)]
    pub every: u64,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,

    /// Output file (default: stdout)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub session: SessionArgs,
}

#[derive(Args)]
pub struct StreamArgs {
    /// Remote endpoint (simulation, live)
    #[arg(long, default_value = "simulation")]
    pub endpoint: StreamEndpoint,

    /// Base address of the remote process [default: $NEUROSYNC_BASE_URL or ws://localhost:8000]
    #[arg(long)]
    pub base_url: Option<String>,

    /// Drive mode (remote, steered)
    #[arg(long, default_value = "remote")]
    pub mode: DriveMode,

    /// Theta drive value to send on connect
    #[arg(long, requires = "beta", conflicts_with_all = ["action", "cycle_secs"])]
    pub theta: Option<f64>,

    /// Beta drive value to send on connect
    #[arg(long, requires = "theta")]
    pub beta: Option<f64>,

    /// Motion action to send on connect
    #[arg(long, conflicts_with = "cycle_secs")]
    pub action: Option<String>,

    /// Cycle through the demo actions, switching every N seconds
    #[arg(long)]
    pub cycle_secs: Option<f64>,

    /// Stop after N seconds (default: run until Ctrl-C)
    #[arg(long)]
    pub duration: Option<f64>,

    /// Print a frame every N ticks [default: once per second]
    #[arg(long)]
    pub print_every: Option<u64>,

    /// Reconnect delay in milliseconds [default: $NEUROSYNC_RECONNECT_DELAY_MS or 3000]
    #[arg(long)]
    pub reconnect_delay_ms: Option<u64>,

    /// Give up after N consecutive reconnect attempts
    #[arg(long)]
    pub max_reconnects: Option<u32>,

    /// Print frames as JSON lines
    #[arg(long, default_value_t = false)]
    pub json: bool,

    #[command(flatten)]
    pub session: SessionArgs,
}

#[derive(Args)]
pub struct AnalyzeArgs {
    /// Session log to analyze
    #[arg(long, conflicts_with = "dir")]
    pub file: Option<PathBuf>,

    /// Analyze the newest session in this directory [default: $NEUROSYNC_LOG_DIR or data_logs]
    #[arg(long)]
    pub dir: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,

    /// Compact JSON output (no indentation)
    #[arg(long, default_value_t = false)]
    pub compact: bool,
}
