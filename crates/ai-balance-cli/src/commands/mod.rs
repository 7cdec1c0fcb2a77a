mod check;
mod platforms;
mod validate;

use std::process::ExitCode;

use ai_balance_core::EnvSnapshot;

use crate::cli::{Cli, Command};
use crate::error::CliError;

pub async fn run(cli: &Cli, env: &EnvSnapshot) -> Result<ExitCode, CliError> {
    match cli.selected_command() {
        Command::Check => check::run(cli, env).await,
        Command::Validate => validate::run(cli, env),
        Command::Platforms => Ok(platforms::run(env)),
    }
}
