//! Structured error type shared by every pipeline stage.
//!
//! Each variant maps to one failure kind a stage can surface. Messages are
//! meant to be printed as-is by the CLI.

use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrepError {
    #[error("authentication failed: {0}")]
    Authentication(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("corrupt archive {path}: {reason}")]
    CorruptArchive { path: PathBuf, reason: String },

    #[error("schema error: {0}")]
    Schema(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PrepError {
    /// Wrap an I/O error, turning `NotFound` into [`PrepError::NotFound`].
    pub fn from_io(path: &Path, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            PrepError::NotFound(path.display().to_string())
        } else {
            PrepError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    }

    /// Wrap an I/O error without the `NotFound` translation.
    ///
    /// Used on the write side, where a missing path is a creation failure.
    pub fn io(path: &Path, source: std::io::Error) -> Self {
        PrepError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub fn corrupt_archive(path: &Path, reason: impl Into<String>) -> Self {
        PrepError::CorruptArchive {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_maps_to_not_found() {
        let err = PrepError::from_io(
            Path::new("data/raw/train.csv"),
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
        );
        assert!(matches!(err, PrepError::NotFound(ref p) if p.contains("train.csv")));
    }

    #[test]
    fn permission_error_stays_io() {
        let err = PrepError::from_io(
            Path::new("data/raw"),
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "nope"),
        );
        assert!(matches!(err, PrepError::Io { .. }));
        assert!(err.to_string().contains("data/raw"));
    }
}
