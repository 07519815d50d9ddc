//! Store-side error taxonomy.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),

    /// The file exists but its contents do not parse. Load-side callers
    /// treat this as "absent" and rebuild a fresh baseline.
    #[error("malformed store file {path}: {message}")]
    Malformed { path: PathBuf, message: String },

    /// Re-reading the just-written bytes failed; the target was left
    /// untouched.
    #[error("save verification failed for {path}: {message}")]
    Verify { path: PathBuf, message: String },
}

impl StoreError {
    pub fn malformed(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        StoreError::Malformed {
            path: path.into(),
            message: err.to_string(),
        }
    }

    pub fn verify(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        StoreError::Verify {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
