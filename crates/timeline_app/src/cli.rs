use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::logging::LogDestination;

/// Collects a profile timeline from captured responses and writes resumable exports.
#[derive(Debug, Parser)]
#[command(name = "timeline_app", version, about)]
pub struct Cli {
    /// Where log output goes.
    #[arg(long, global = true, value_enum, default_value_t = LogDestination::Terminal)]
    pub log: LogDestination,

    /// Enable debug logging.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replay a JSON-lines capture of intercepted responses through a collector.
    Replay(ReplayArgs),
    /// Merge two export or resume files into one export.
    Merge(MergeArgs),
    /// Show what a file yields when imported for resuming.
    Inspect(InspectArgs),
    /// Send one raw message to the background bus and print the reply.
    Bus(BusArgs),
}

#[derive(Debug, Clone, Args)]
pub struct ReplayArgs {
    /// Capture file, one `{"event": ...}` object per line.
    #[arg(long)]
    pub capture: PathBuf,
    /// Profile being collected.
    #[arg(long)]
    pub username: String,
    /// Previously exported or saved file to resume from.
    #[arg(long)]
    pub resume_file: Option<PathBuf>,
    /// RON config with pacing and completion tuning.
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub state_dir: Option<PathBuf>,
    #[arg(long)]
    pub output_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
pub struct MergeArgs {
    /// Earlier file; its items win on duplicate ids.
    #[arg(long)]
    pub previous: PathBuf,
    #[arg(long)]
    pub new: PathBuf,
    /// Directory the merged export is written to.
    #[arg(long, default_value = "output")]
    pub out: PathBuf,
    /// Expected account; files naming another account are refused.
    #[arg(long)]
    pub username: Option<String>,
    /// Project items onto the flat minimal record.
    #[arg(long)]
    pub minimal: bool,
}

#[derive(Debug, Clone, Args)]
pub struct InspectArgs {
    pub file: PathBuf,
}

#[derive(Debug, Clone, Args)]
pub struct BusArgs {
    /// Raw JSON message, e.g. `{"type":"getSettings"}`.
    pub request: String,
    #[arg(long, default_value = ".timeline_state")]
    pub state_dir: PathBuf,
}
