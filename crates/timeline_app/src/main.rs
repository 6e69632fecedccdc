mod cli;
mod config;
mod logging;
mod offline;
mod replay;

use clap::Parser;
use collector_logging::collector_info;

use crate::cli::{Cli, Commands};
use crate::config::load_config;
use crate::replay::{run_replay, ReplayOptions};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::initialize(cli.log, cli.verbose);

    match cli.command {
        Commands::Replay(args) => {
            let config = load_config(args.config.as_deref())?
                .with_overrides(args.state_dir, args.output_dir);
            let outcome = run_replay(ReplayOptions {
                username: args.username,
                capture: args.capture,
                resume_file: args.resume_file,
                config,
            })?;
            collector_info!("Replayed {} capture lines", outcome.lines);
            if let Some(summary) = outcome.export {
                println!(
                    "{} ({} items, {} duplicates removed)",
                    summary.path.display(),
                    summary.meta.final_count,
                    summary.meta.duplicates_removed
                );
            }
        }
        Commands::Merge(args) => {
            let summary = offline::merge_files(&args)?;
            println!("{} ({} items)", summary.path.display(), summary.meta.final_count);
        }
        Commands::Inspect(args) => {
            let report = offline::inspect_file(&args.file)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::Bus(args) => {
            let reply = offline::send_bus_request(&args.state_dir, &args.request)?;
            println!("{}", serde_json::to_string_pretty(&reply)?);
        }
    }
    Ok(())
}
