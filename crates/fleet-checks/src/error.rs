//! Error types for fleet-checks

use thiserror::Error;

/// Errors raised while probing the local machine
#[derive(Error, Debug)]
pub enum CheckError {
    /// A system tool could not be started
    #[error("failed to run {command}: {source}")]
    CommandSpawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// A system tool exited non-zero
    #[error("{command} failed: {stderr}")]
    CommandFailed { command: String, stderr: String },

    /// Property list read/write error
    #[error("plist error: {0}")]
    Plist(#[from] plist::Error),

    /// A property list did not have the expected shape
    #[error("unexpected plist contents in {path}: {reason}")]
    UnexpectedPlist { path: String, reason: String },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for fleet checks
pub type Result<T> = std::result::Result<T, CheckError>;
