use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{debug, error};

use fqcombine::runtime::{self, Commands, LogLevel, LogMode};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    #[arg(long = "log-level", global = true, default_value = "info")]
    log_level: LogLevel,

    #[arg(long = "log-mode", global = true, default_value = "terminal")]
    log_mode: LogMode,

    #[arg(long = "log-path", global = true, default_value = runtime::DEFAULT_LOG_PATH)]
    log_path: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = runtime::setup_global_logger(cli.log_level, cli.log_mode, cli.log_path) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }
    debug!("Running command {:?}", cli.command);

    let result = match cli.command {
        Commands::Combine(mut cmd) => cmd.try_execute(),
        Commands::Discover(mut cmd) => cmd.try_execute(),
        Commands::Validate(mut cmd) => cmd.try_execute(),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
