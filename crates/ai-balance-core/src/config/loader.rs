use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::ConfigError;

use super::defaults::api_key_env_names;
use super::env::EnvSnapshot;
use super::model::ConfigDocument;

const CONFIG_FILE_NAME: &str = "config.json";
const HOME_CONFIG_DIR: &str = ".ai-balance-checker";

/// A validated document together with the file it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedConfig {
    pub path: PathBuf,
    pub document: ConfigDocument,
}

/// Config locations in lookup order: explicit path, working directory, home.
pub fn candidate_paths(explicit: Option<&Path>) -> Vec<PathBuf> {
    let mut candidates = Vec::with_capacity(3);
    if let Some(explicit) = explicit {
        candidates.push(explicit.to_path_buf());
    }
    candidates.push(PathBuf::from(CONFIG_FILE_NAME));
    if let Some(home) = dirs::home_dir() {
        candidates.push(home.join(HOME_CONFIG_DIR).join(CONFIG_FILE_NAME));
    }
    candidates
}

/// Load the first existing config among [`candidate_paths`].
pub fn load_config(explicit: Option<&Path>, env: &EnvSnapshot) -> Result<LoadedConfig, ConfigError> {
    let searched = candidate_paths(explicit);
    let Some(path) = searched.iter().find(|path| path.is_file()).cloned() else {
        return Err(ConfigError::NotFound { searched });
    };

    let document = load_from_path(&path, env)?;
    Ok(LoadedConfig { path, document })
}

pub fn load_from_path(path: &Path, env: &EnvSnapshot) -> Result<ConfigDocument, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config_str(&text, &path.display().to_string(), env)
}

/// Parse, validate, decode and apply environment overrides.
///
/// `origin` only labels parse errors.
pub fn parse_config_str(
    text: &str,
    origin: &str,
    env: &EnvSnapshot,
) -> Result<ConfigDocument, ConfigError> {
    let value: Value = serde_json::from_str(text).map_err(|error| ConfigError::Parse {
        path: origin.to_owned(),
        message: error.to_string(),
    })?;

    let mut document = ConfigDocument::from_value(value)?;
    apply_env_overrides(&mut document, env);
    Ok(document)
}

/// Replace each platform's API key with an environment value when one is set.
pub fn apply_env_overrides(document: &mut ConfigDocument, env: &EnvSnapshot) {
    for (key, platform) in &mut document.platforms {
        let names = api_key_env_names(key);
        let names: Vec<&str> = names.iter().map(String::as_str).collect();
        if let Some((name, value)) = env.first_of(&names) {
            debug!(platform = %key, variable = name, "api key taken from environment");
            platform.api_key = Some(value.to_owned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"{
        "platforms": {
            "deepseek": { "apiKey": "from-file" },
            "qwen": { "metrics": { "usage": { "endpoint": "https://x.test" } } }
        }
    }"#;

    #[test]
    fn environment_key_wins_over_file_key() {
        let env = EnvSnapshot::from_pairs([("DEEPSEEK_API_KEY", "from-env")]);
        let document = parse_config_str(MINIMAL, "inline", &env).expect("config parses");

        assert_eq!(
            document.platforms["deepseek"].api_key.as_deref(),
            Some("from-env")
        );
        assert_eq!(document.platforms["qwen"].api_key, None);
    }

    #[test]
    fn generic_variable_beats_alias() {
        let env = EnvSnapshot::from_pairs([
            ("DASHSCOPE_API_KEY", "alias"),
            ("AI_BALANCE_QWEN_API_KEY", "generic"),
        ]);
        let document = parse_config_str(MINIMAL, "inline", &env).expect("config parses");
        assert_eq!(document.platforms["qwen"].api_key.as_deref(), Some("generic"));
    }

    #[test]
    fn blank_environment_value_keeps_file_key() {
        let env = EnvSnapshot::from_pairs([("DEEPSEEK_API_KEY", "   ")]);
        let document = parse_config_str(MINIMAL, "inline", &env).expect("config parses");
        assert_eq!(
            document.platforms["deepseek"].api_key.as_deref(),
            Some("from-file")
        );
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let error = parse_config_str("{ not json", "broken.json", &EnvSnapshot::empty())
            .expect_err("must fail");
        assert!(matches!(error, ConfigError::Parse { ref path, .. } if path == "broken.json"));
    }

    #[test]
    fn explicit_path_is_searched_first() {
        let candidates = candidate_paths(Some(Path::new("/tmp/custom.json")));
        assert_eq!(candidates[0], PathBuf::from("/tmp/custom.json"));
        assert_eq!(candidates[1], PathBuf::from("config.json"));
    }
}
