//! Resumable-build progress record.
//!
//! A single compact JSON file `{ timestamp, completed, total }`. Written
//! after every file during a batch build, offered back to the operator on
//! restart, removed on clean completion.

use crate::StoreError;
use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildProgress {
    pub timestamp: String,
    pub completed: usize,
    pub total: usize,
}

impl BuildProgress {
    pub fn new(completed: usize, total: usize) -> Self {
        Self {
            timestamp: Local::now().to_rfc3339(),
            completed,
            total,
        }
    }
}

pub fn load_progress(path: &Path) -> Result<Option<BuildProgress>, StoreError> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    serde_json::from_slice(&bytes)
        .map(Some)
        .map_err(|e| StoreError::malformed(path, e))
}

pub fn save_progress(path: &Path, progress: &BuildProgress) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let json = serde_json::to_vec(progress).map_err(|e| StoreError::malformed(path, e))?;
    std::fs::write(path, json)?;
    Ok(())
}

pub fn clear_progress(path: &Path) -> Result<(), StoreError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
