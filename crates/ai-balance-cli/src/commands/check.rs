use std::process::ExitCode;
use std::sync::Arc;

use ai_balance_core::{
    load_config, select_platforms, EnvSnapshot, FetchOptions, Lang, PlatformFetcher,
    ProxyAwareHttpClient,
};
use tracing::debug;

use crate::cli::Cli;
use crate::error::CliError;
use crate::output;

pub async fn run(cli: &Cli, env: &EnvSnapshot) -> Result<ExitCode, CliError> {
    let loaded = load_config(cli.config.as_deref(), env)?;
    let lang = Lang::resolve(cli.lang.as_deref(), loaded.document.language.as_deref());
    let messages = lang.messages();
    debug!(path = %loaded.path.display(), lang = lang.as_str(), "config loaded");

    let selection = select_platforms(&loaded.document, cli.platform.as_deref(), cli.all || cli.json);
    if !selection.skipped.is_empty() {
        eprintln!(
            "{}: {} ({})",
            messages.skipped_platforms,
            selection.skipped.join(", "),
            messages.run_all_hint
        );
    }

    let client = ProxyAwareHttpClient::from_env(env)?;
    let options = FetchOptions::from_env(env, lang).with_raw(cli.raw);
    let fetcher = PlatformFetcher::new(Arc::new(client), options);

    if !cli.json {
        println!("{}\n", messages.loading);
    }
    let report = fetcher.check(&loaded.document, &selection.run).await;

    if cli.json {
        println!("{}", report.to_json(cli.pretty)?);
    } else {
        print!("{}", output::render_text(&report, cli.raw));
    }

    if report.all_failed() {
        return Ok(ExitCode::from(1));
    }
    Ok(ExitCode::SUCCESS)
}
