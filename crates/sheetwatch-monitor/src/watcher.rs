//! Filesystem event intake.
//!
//! Subscribes recursively to the configured roots and forwards modify and
//! create events over a channel. A root that fails to subscribe is logged
//! and skipped; initialisation fails only when no root remains.

use crate::MonitorError;
use crossbeam_channel::Receiver;
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use std::path::PathBuf;

pub struct WatchHandle {
    /// Kept alive to maintain the subscription.
    _watcher: RecommendedWatcher,
    pub events: Receiver<PathBuf>,
    pub roots: usize,
}

pub fn watch_dirs(dirs: &[PathBuf]) -> Result<WatchHandle, MonitorError> {
    let (tx, events) = crossbeam_channel::unbounded();
    let mut watcher =
        notify::recommended_watcher(move |result: Result<notify::Event, notify::Error>| {
            match result {
                Ok(event) if event.kind.is_modify() || event.kind.is_create() => {
                    for path in event.paths {
                        let _ = tx.send(path);
                    }
                }
                Ok(_) => {}
                Err(err) => tracing::warn!(%err, "watch backend error"),
            }
        })
        .map_err(|e| MonitorError::Watch(e.to_string()))?;

    let mut roots = 0;
    for dir in dirs {
        match watcher.watch(dir, RecursiveMode::Recursive) {
            Ok(()) => {
                tracing::info!(dir = %dir.display(), "watching");
                roots += 1;
            }
            Err(err) => {
                tracing::warn!(dir = %dir.display(), %err, "subscription failed, continuing with remaining roots");
            }
        }
    }
    if roots == 0 {
        return Err(MonitorError::Watch(
            "no watch roots could be subscribed".to_string(),
        ));
    }

    Ok(WatchHandle {
        _watcher: watcher,
        events,
        roots,
    })
}
