//! Error types for runkit.
//!
//! Uses thiserror for derive macros. Every variant is fatal to the
//! bootstrap path and maps to an exit code.

use crate::exit_codes;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for runkit operations.
#[derive(Error, Debug)]
pub enum RunkitError {
    /// An external command could not be spawned, waited on, or read from.
    ///
    /// Spawn, wait and pipe failures are deliberately not distinguished;
    /// inspect `source` for the underlying cause.
    #[error("Couldn't successfully execute: {command} {args:?}")]
    CommandError {
        command: String,
        args: Vec<String>,
        #[source]
        source: std::io::Error,
    },

    /// The single-instance lock could not be acquired.
    #[error("Lock acquisition failed: {0}")]
    LockError(String),

    /// A directory or file required at startup could not be created or written.
    #[error("Filesystem error at '{}': {source}", path.display())]
    FilesystemError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The signal listener could not be installed.
    #[error("Signal setup failed: {0}")]
    SignalError(String),

    /// The configuration could not be read, parsed, or validated.
    #[error("Config error: {0}")]
    ConfigError(String),

    /// Invalid arguments or invalid state.
    #[error("{0}")]
    UserError(String),
}

impl RunkitError {
    /// Returns the exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunkitError::CommandError { .. } => exit_codes::FAILURE,
            RunkitError::LockError(_) => exit_codes::FAILURE,
            RunkitError::FilesystemError { .. } => exit_codes::FAILURE,
            RunkitError::SignalError(_) => exit_codes::FAILURE,
            RunkitError::ConfigError(_) => exit_codes::FAILURE,
            RunkitError::UserError(_) => exit_codes::FAILURE,
        }
    }

    /// Wrap an I/O error with the path it occurred on.
    pub fn filesystem(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RunkitError::FilesystemError {
            path: path.into(),
            source,
        }
    }
}

/// Result type alias for runkit operations.
pub type Result<T> = std::result::Result<T, RunkitError>;
