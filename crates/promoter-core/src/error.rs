//! Error taxonomy for the promotion engine.

use std::path::PathBuf;

/// Errors produced while loading configuration, scanning the pkgsinfo tree,
/// or writing promoted records back.
#[derive(Debug, thiserror::Error)]
pub enum PromoterError {
    #[error("failed to read deferral configuration {path:?}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid deferral configuration {path:?}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("promotion \"{0}\" not found, use --list to see valid names")]
    UnknownPromotion(String),

    #[error("pkgsinfo path {0:?} is not a directory")]
    StoreMissing(PathBuf),

    #[error("pkgsinfo path {path:?} is not writable: {source}")]
    StoreNotWritable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read pkginfo {path:?}: {source}")]
    RecordRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse pkginfo {path:?}: {source}")]
    RecordParse {
        path: PathBuf,
        #[source]
        source: plist::Error,
    },

    #[error("pkginfo {path:?} is invalid: {reason}")]
    RecordInvalid { path: PathBuf, reason: String },

    #[error("pkginfo {0:?} changed on disk since it was scanned")]
    RecordChanged(PathBuf),

    #[error("failed to write pkginfo {path:?}: {source}")]
    RecordWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("plist serialization error: {0}")]
    Serialization(#[from] plist::Error),

    #[error("notification failed: {0}")]
    Notify(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for PromoterError {
    fn from(err: reqwest::Error) -> Self {
        PromoterError::Notify(err.to_string())
    }
}

/// Result type for promotion operations.
pub type Result<T> = std::result::Result<T, PromoterError>;
