use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;
mod config;
mod logging;
mod pipeline;
mod region;
mod tool;
mod util;

use logging::LogFormat;

#[derive(Parser)]
#[command(version, about)]
struct Args {
    /// Log line format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// The command to execute
    #[command(subcommand)]
    command: RegionflowCommand,
}

#[derive(Parser)]
struct RunArgs {
    /// The path to the configuration file
    #[arg(short, long, default_value = "regionflow.yaml")]
    config_file: Option<PathBuf>,

    /// Regions file, overriding the one in the configuration
    #[arg(short, long)]
    regions: Option<PathBuf>,

    /// Working directory, overriding the one in the configuration
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Parser)]
struct StatusArgs {
    /// The path to the configuration file
    #[arg(short, long, default_value = "regionflow.yaml")]
    config_file: Option<PathBuf>,

    /// Working directory, overriding the one in the configuration
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Subcommand)]
enum RegionflowCommand {
    /// Fetch, send and convert every configured region
    Run(RunArgs),

    /// Show per-region progress of the working directory
    Status(StatusArgs),
}

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    let args = Args::parse();
    logging::init_logging(args.log_format)?;

    match args.command {
        RegionflowCommand::Run(args) => {
            commands::run::run(&args).await?;
        }
        RegionflowCommand::Status(args) => {
            commands::status::run(&args).await?;
        }
    }

    Ok(())
}
