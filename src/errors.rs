//! Typed error definitions for backup_staging.
//! `StagingError` covers invalid values built from settings or events;
//! `MoveError` covers the transient failures a worker retries.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Construction and rewrite failures. These are bugs in settings or callers,
/// never retried.
#[derive(Debug, Error)]
pub enum StagingError {
    #[error("{field} cannot be empty")]
    EmptyField { field: &'static str },

    #[error("{field} must be an absolute path: {path}")]
    RelativePath { field: &'static str, path: PathBuf },

    #[error("Path {path} is not under source root {root}")]
    OutsideSource { path: PathBuf, root: PathBuf },

    #[error("Path is not valid UTF-8 and cannot be rewritten: {0}")]
    NonUtf8Path(PathBuf),

    #[error("Invalid setting {name}: {reason}")]
    InvalidSetting { name: &'static str, reason: String },
}

/// A single failed move attempt. Every variant is transient from the
/// worker's point of view and leads to the retry path.
#[derive(Debug, Error)]
pub enum MoveError {
    #[error("{op} '{}': {source}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(
        "Hashes don't match: {}: {source_digest}, {}: {destination_digest}",
        source_path.display(),
        destination_path.display()
    )]
    Integrity {
        source_path: PathBuf,
        source_digest: String,
        destination_path: PathBuf,
        destination_digest: String,
    },

    #[error("Insufficient disk space for destination {dest}: need {required} bytes, have {available} bytes")]
    InsufficientSpace {
        required: u64,
        available: u64,
        dest: PathBuf,
    },
}

impl MoveError {
    /// Closure adapter for `map_err` on io results.
    pub fn io<'a>(op: &'static str, path: &'a std::path::Path) -> impl FnOnce(io::Error) -> Self + 'a {
        move |source| MoveError::Io {
            op,
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn is_integrity(&self) -> bool {
        matches!(self, MoveError::Integrity { .. })
    }

    /// Short machine-friendly tag used as a structured log field.
    pub fn kind(&self) -> &'static str {
        match self {
            MoveError::Io { .. } => "io",
            MoveError::Integrity { .. } => "integrity",
            MoveError::InsufficientSpace { .. } => "insufficient_space",
        }
    }
}
