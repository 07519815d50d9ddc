//! Snapshot-side error taxonomy.
//!
//! Every variant is component-local: callers turn these into status markers
//! rather than letting them cross the control plane (the monitor skips the
//! document and records a read-error).

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SnapshotError {
    /// The package could not be opened or is not a readable archive.
    #[error("cannot open workbook package {path}: {message}")]
    Archive { path: PathBuf, message: String },

    /// The package opened but cell extraction failed.
    #[error("workbook read failed for {path}: {message}")]
    Read { path: PathBuf, message: String },

    /// The copy-through cache could not be populated. Non-fatal: the engine
    /// falls back to reading the source directly.
    #[error("cache copy failed for {path}: {message}")]
    Cache { path: PathBuf, message: String },
}

impl SnapshotError {
    pub fn archive(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        SnapshotError::Archive {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub fn read(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        SnapshotError::Read {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub fn cache(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        SnapshotError::Cache {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
