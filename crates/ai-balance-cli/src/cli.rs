//! CLI argument definitions for ai-balance.
//!
//! Running the binary without a subcommand is the same as `check`.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `check` | Query every configured platform (default) |
//! | `validate` | Load and validate the config file without sending requests |
//! | `platforms` | List the platform keys that ship with built-in defaults |
//!
//! # Global Options
//!
//! | Option | Default | Description |
//! |--------|---------|-------------|
//! | `-c, --config` | discovered | Path to `config.json` |
//! | `-p, --platform` | all | Check a single platform key |
//! | `--lang` | document / `zh` | Output language (`zh`, `en`) |
//! | `--json` | `false` | Print the report as JSON |
//! | `--pretty` | `false` | Pretty-print JSON output |
//! | `--raw` | `false` | Include raw response bodies |
//! | `--all` | `false` | Also check platforms without an endpoint |
//!
//! # Examples
//!
//! ```bash
//! # Check every platform that has an endpoint
//! ai-balance
//!
//! # One platform, English, with the raw response
//! ai-balance --platform deepseek --lang en --raw
//!
//! # Machine-readable report
//! ai-balance --json --pretty
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Check balances, usage and plans of AI API platforms.
#[derive(Debug, Parser)]
#[command(
    name = "ai-balance",
    author,
    version,
    about = "Check balances, usage and plans of AI API platforms",
    long_about = "ai-balance queries provider APIs described in a JSON config file and \
extracts account metrics from their responses.\n\
\n\
Config discovery: --config, ./config.json, ~/.ai-balance-checker/config.json.\n\
API keys may come from AI_BALANCE_<PLATFORM>_API_KEY; proxies from HTTPS_PROXY, \
HTTP_PROXY and NO_PROXY."
)]
pub struct Cli {
    /// Path to the config file.
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Only check this platform key.
    #[arg(short = 'p', long, global = true)]
    pub platform: Option<String>,

    /// Output language: zh or en.
    #[arg(long, global = true)]
    pub lang: Option<String>,

    /// Print the report as JSON.
    #[arg(long, global = true, default_value_t = false)]
    pub json: bool,

    /// Pretty-print JSON output with indentation.
    #[arg(long, global = true, default_value_t = false)]
    pub pretty: bool,

    /// Include the raw response body of each metric.
    #[arg(long, global = true, default_value_t = false)]
    pub raw: bool,

    /// Check platforms even when none of their metrics has an endpoint.
    #[arg(long, global = true, default_value_t = false)]
    pub all: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Query configured platforms (default).
    Check,
    /// Validate the config file and exit.
    Validate,
    /// List platforms with built-in defaults.
    Platforms,
}

impl Cli {
    pub fn selected_command(&self) -> Command {
        self.command.unwrap_or(Command::Check)
    }
}
