use std::process::ExitCode;

use ai_balance_core::config::defaults::{api_key_env_names, builtin_platform, has_builtin_metrics};
use ai_balance_core::{EnvSnapshot, KNOWN_PLATFORMS};

/// Print known platform keys, their built-in defaults and key variables.
pub fn run(env: &EnvSnapshot) -> ExitCode {
    for key in KNOWN_PLATFORMS {
        let name = builtin_platform(key)
            .and_then(|platform| platform.name)
            .unwrap_or_else(|| key.to_owned());
        let defaults = if has_builtin_metrics(key) {
            "built-in metrics"
        } else {
            "metrics required"
        };
        let env_names = api_key_env_names(key);
        let key_source = env_names
            .iter()
            .find(|name| env.get(name).is_some())
            .map_or("not set", String::as_str);

        println!("{key:<10} {name}");
        println!("           {defaults}; key env: {} ({key_source})", env_names.join(", "));
    }
    ExitCode::SUCCESS
}
