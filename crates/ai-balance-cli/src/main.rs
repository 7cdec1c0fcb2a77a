mod cli;
mod commands;
mod error;
mod output;

use clap::Parser;
use std::process::ExitCode;

use ai_balance_core::EnvSnapshot;
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::error::CliError;

const LOG_ENV: &str = "AI_BALANCE_LOG";
const DEFAULT_LOG_FILTER: &str = "error";

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::from(error.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();
    let env = EnvSnapshot::from_process();
    init_tracing(&env);

    commands::run(&cli, &env).await
}

fn init_tracing(env: &EnvSnapshot) {
    let filter = env
        .first_of(&[LOG_ENV, "RUST_LOG"])
        .and_then(|(_, directives)| EnvFilter::try_new(directives).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
