//! Control-plane errors. Only initialisation failures are allowed to
//! terminate the process; everything else is downgraded to a status marker
//! before it reaches the event loop.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("cannot load config {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("filesystem watch failed: {0}")]
    Watch(String),

    #[error(transparent)]
    Store(#[from] sheetwatch_store::StoreError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
