mod cli;
mod commands;
mod error;
mod logging;
mod output;

use std::process::ExitCode;

use clap::Parser;
use tracing::warn;

use crate::cli::Cli;
use crate::error::CliError;

/// Exit code when Ctrl-C cancels the running command.
const EXIT_INTERRUPTED: u8 = 130;
/// Exit code when output was produced but some symbols failed.
const EXIT_PARTIAL: u8 = 3;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(&cli.log_level);

    tokio::select! {
        result = run(&cli) => match result {
            Ok(code) => code,
            Err(error) => {
                eprintln!("error: {error}");
                ExitCode::from(error.exit_code())
            }
        },
        Ok(()) = tokio::signal::ctrl_c() => {
            warn!("interrupted, cancelling outstanding requests");
            eprintln!("interrupted");
            ExitCode::from(EXIT_INTERRUPTED)
        }
    }
}

async fn run(cli: &Cli) -> Result<ExitCode, CliError> {
    let envelope = commands::run(cli).await?;
    output::render(&envelope, cli.format, cli.pretty)?;

    if !envelope.errors.is_empty() {
        return Ok(ExitCode::from(EXIT_PARTIAL));
    }
    Ok(ExitCode::SUCCESS)
}
