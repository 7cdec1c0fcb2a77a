use std::path::PathBuf;

use thiserror::Error;

/// Fatal configuration problems detected before any request is attempted.
///
/// Every variant names the dotted key path (or file path) the user has to fix.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found (searched: {})", format_searched(searched))]
    NotFound { searched: Vec<PathBuf> },

    #[error("failed to read config file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file '{path}' is not valid JSON: {message}")]
    Parse { path: String, message: String },

    #[error("invalid config at '{path}': {message}")]
    Malformed { path: String, message: String },

    #[error("deprecated config key '{path}' is no longer supported; move it to '{replacement}'")]
    LegacyKey { path: String, replacement: String },

    #[error("'{path}' is missing; declare at least one metric under it")]
    MetricsMissing { path: String },

    #[error("'{path}' is empty; declare at least one metric under it")]
    MetricsEmpty { path: String },
}

impl ConfigError {
    pub fn malformed(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn legacy_key(path: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self::LegacyKey {
            path: path.into(),
            replacement: replacement.into(),
        }
    }

    pub const fn code(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "config.not_found",
            Self::Io { .. } => "config.io",
            Self::Parse { .. } => "config.parse",
            Self::Malformed { .. } => "config.malformed",
            Self::LegacyKey { .. } => "config.legacy_key",
            Self::MetricsMissing { .. } => "config.metrics_missing",
            Self::MetricsEmpty { .. } => "config.metrics_empty",
        }
    }
}

fn format_searched(searched: &[PathBuf]) -> String {
    searched
        .iter()
        .map(|path| path.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Top-level error type for core operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
