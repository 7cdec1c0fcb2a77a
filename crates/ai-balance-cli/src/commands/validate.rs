use std::process::ExitCode;

use ai_balance_core::{load_config, merge_platform, EnvSnapshot};

use crate::cli::Cli;
use crate::error::CliError;

/// Load the config through the full pipeline and report what was found.
pub fn run(cli: &Cli, env: &EnvSnapshot) -> Result<ExitCode, CliError> {
    let loaded = load_config(cli.config.as_deref(), env)?;
    println!("config ok: {}", loaded.path.display());

    for key in loaded.document.platform_keys() {
        let Some(platform) = loaded.document.platform(&key) else {
            continue;
        };
        let effective = merge_platform(&key, platform);
        let key_state = if effective.api_key.is_some() { "key" } else { "no key" };
        let endpoint_state = if effective.has_any_endpoint() {
            "endpoint"
        } else {
            "no endpoint"
        };
        println!(
            "  {key}: {} metric(s), {key_state}, {endpoint_state}",
            effective.metric_ids().len()
        );
    }
    Ok(ExitCode::SUCCESS)
}
