use std::path::PathBuf;

use capmath_core::{EngineError, ValidationError};
use thiserror::Error;

/// CLI-level error categories mapped to exit codes.
#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("invalid scenario input {path:?}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("cannot load config {path:?}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("strict mode failed: warnings={warning_count}, errors={error_count}")]
    StrictModeViolation {
        warning_count: usize,
        error_count: usize,
    },

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation(_) | Self::Input { .. } => 2,
            Self::Engine(EngineError::Validation(_)) => 2,
            Self::Engine(EngineError::Arithmetic(_)) => 3,
            Self::Engine(EngineError::Conservation(_)) => 4,
            Self::StrictModeViolation { .. } => 5,
            Self::Config { .. } | Self::Serialization(_) | Self::Io(_) => 10,
        }
    }
}
