//! CLI-specific error types and exit codes.

use std::path::PathBuf;

use thiserror::Error;
use toolweave_core::{SettingsError, ValidationError};

#[derive(Debug, Error)]
pub enum CliError {
    /// Settings could not be loaded or are invalid.
    #[error(transparent)]
    Settings(#[from] SettingsError),

    /// Argument parsing error.
    #[error("Invalid arguments: {0}")]
    Arguments(String),

    /// A definition file could not be read.
    #[error("Failed to read {}: {message}", path.display())]
    Io { path: PathBuf, message: String },

    /// Definitions failed validation.
    #[error("{}: {source}", path.display())]
    Definitions {
        path: PathBuf,
        #[source]
        source: ValidationError,
    },

    /// The batch as a whole failed validation.
    #[error(transparent)]
    Batch(ValidationError),

    /// The tool call completed with a failed result.
    #[error("Tool call failed: {0}")]
    ToolFailed(String),
}

impl CliError {
    /// Map error to an exit code (sysexits.h where one fits).
    pub const fn exit_code(&self) -> u8 {
        match self {
            Self::ToolFailed(_) => 1,
            Self::Arguments(_) => 2,                         // EX_USAGE
            Self::Definitions { .. } | Self::Batch(_) => 65, // EX_DATAERR
            Self::Io { .. } => 74,                           // EX_IOERR
            Self::Settings(_) => 78,                         // EX_CONFIG
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(CliError::Arguments("x".into()).exit_code(), 2);
        assert_eq!(CliError::ToolFailed("x".into()).exit_code(), 1);
        assert_eq!(
            CliError::Settings(SettingsError::InvalidEventCapacity).exit_code(),
            78
        );
        assert_eq!(
            CliError::Batch(ValidationError::Malformed("x".into())).exit_code(),
            65
        );
    }
}
