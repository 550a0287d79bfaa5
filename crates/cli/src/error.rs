//! Error types for CLI operations.

use thiserror::Error;

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Neither a config file nor `--source` named any source
    #[error("No sources given: pass --config or at least two --source locators")]
    NoSources,

    /// Synchronizer stopped because of a fault
    #[error("Synchronizer failed: {message}")]
    SyncFailure { message: String },
}

impl CliError {
    pub fn config_not_found(path: impl Into<String>) -> Self {
        Self::ConfigNotFound { path: path.into() }
    }

    pub fn sync_failure(message: impl Into<String>) -> Self {
        Self::SyncFailure {
            message: message.into(),
        }
    }
}
