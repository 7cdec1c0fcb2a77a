use ai_balance_core::{ConfigError, CoreError, HttpError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("transport setup failed: {0}")]
    Transport(#[from] HttpError),

    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 2,
            Self::Transport(_) => 3,
            Self::Core(_) => 4,
            Self::Io(_) => 10,
        }
    }
}
