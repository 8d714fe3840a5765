//! Error types for the dray CLI
//!
//! User-facing errors with actionable messages. Fatal conditions name
//! the offending file, table, or configuration value; per-file load
//! failures are counted and reported after the batch finishes instead
//! of aborting it.

use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    /// Engine/database error (connection, identifiers, SQL)
    #[error("{0}")]
    Db(#[from] dray_core::DbError),

    /// Dataset filter referenced a base name with no files
    #[error("{0}. Run 'dray scan' to list known datasets.")]
    UnknownDataset(#[from] dray_core::KeyNotFound),

    /// File system operation failed
    #[error("File operation failed: {0}. Check path and permissions.")]
    Io(#[from] std::io::Error),

    /// Bulk load of one file failed (already recorded in the audit log)
    #[error("{0}")]
    Load(#[from] dray_core::LoadError),

    /// Decoding a source file failed
    #[error("Could not decode '{file}': {message}")]
    Decode { file: String, message: String },

    /// Source config TOML is missing or malformed
    #[error("Invalid source config '{path}': {message}")]
    InvalidSourceConfig { path: String, message: String },

    /// Required configuration is missing or malformed
    #[error("Configuration error: {0}")]
    Config(String),

    /// Some file loads failed after the batch ran to completion
    #[error("{failed} of {attempted} file loads failed; see the audit log for details")]
    LoadsFailed { failed: usize, attempted: usize },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl CliError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn decode(file: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            file: file.into(),
            message: message.into(),
        }
    }
}
