//! Batch baseline building with resume, timeout, and memory supervision.
//!
//! The loop is sequential: the resume record's `completed` index is only
//! meaningful when files finish in order.

use crate::{MemoryMonitor, MonitorError};
use parking_lot::Mutex;
use sheetwatch_common::{fingerprint, Baseline};
use sheetwatch_io::SnapshotEngine;
use sheetwatch_store::{clear_progress, save_progress, BaselineStore, BuildProgress};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How often the supervisor thread inspects the in-flight slot.
const SUPERVISOR_INSPECT_EVERY: Duration = Duration::from_secs(10);
/// Pause before re-sampling memory when over budget.
const MEMORY_PAUSE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    Ok,
    Skipped,
    ReadError,
    SaveError,
    Timeout,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BuildStats {
    pub ok: usize,
    pub skipped: usize,
    pub read_errors: usize,
    pub save_errors: usize,
    pub timeouts: usize,
    /// Stop flag or memory pressure ended the loop early; resume state was
    /// persisted.
    pub interrupted: bool,
}

impl BuildStats {
    fn record(&mut self, status: FileStatus) {
        match status {
            FileStatus::Ok => self.ok += 1,
            FileStatus::Skipped => self.skipped += 1,
            FileStatus::ReadError => self.read_errors += 1,
            FileStatus::SaveError => self.save_errors += 1,
            FileStatus::Timeout => self.timeouts += 1,
        }
    }

    pub fn completed(&self) -> usize {
        self.ok + self.skipped + self.read_errors + self.save_errors + self.timeouts
    }
}

struct InFlight {
    path: PathBuf,
    started: Instant,
}

/// Decide whether the in-flight file has exceeded its advisory deadline;
/// clearing the slot is the whole intervention (the worker is never
/// killed, it just finds the slot empty when it comes back).
fn supervise_once(slot: &Mutex<Option<InFlight>>, timeout: Duration) -> bool {
    let mut slot = slot.lock();
    match slot.as_ref() {
        Some(in_flight) if in_flight.started.elapsed() > timeout => {
            tracing::warn!(
                path = %in_flight.path.display(),
                elapsed = ?in_flight.started.elapsed(),
                "file exceeded advisory timeout, abandoning"
            );
            *slot = None;
            true
        }
        _ => false,
    }
}

pub struct BaselineBuilder {
    engine: SnapshotEngine,
    store: BaselineStore,
    stop: Arc<AtomicBool>,
    file_timeout: Option<Duration>,
    memory: Option<MemoryMonitor>,
    resume_log: Option<PathBuf>,
}

impl BaselineBuilder {
    pub fn new(
        engine: SnapshotEngine,
        store: BaselineStore,
        stop: Arc<AtomicBool>,
        file_timeout: Option<Duration>,
        memory: Option<MemoryMonitor>,
        resume_log: Option<PathBuf>,
    ) -> Self {
        Self {
            engine,
            store,
            stop,
            file_timeout,
            memory,
            resume_log,
        }
    }

    /// Build or refresh baselines for `targets[start_index..]`. The
    /// progress record is rewritten after every file and removed iff the
    /// loop ran to completion.
    pub fn build(&self, targets: &[PathBuf], start_index: usize) -> Result<BuildStats, MonitorError> {
        let total = targets.len();
        let mut stats = BuildStats::default();
        let slot: Arc<Mutex<Option<InFlight>>> = Arc::new(Mutex::new(None));

        let supervisor_stop = Arc::new(AtomicBool::new(false));
        let supervisor = self.file_timeout.map(|timeout| {
            let slot = Arc::clone(&slot);
            let stop = Arc::clone(&supervisor_stop);
            std::thread::Builder::new()
                .name("file-timeout".to_string())
                .spawn(move || {
                    let mut last_inspect = Instant::now();
                    while !stop.load(Ordering::Relaxed) {
                        std::thread::sleep(Duration::from_millis(250));
                        if last_inspect.elapsed() >= SUPERVISOR_INSPECT_EVERY {
                            last_inspect = Instant::now();
                            supervise_once(&slot, timeout);
                        }
                    }
                })
                .expect("spawn timeout supervisor")
        });

        tracing::info!(total, start_index, "baseline build starting");
        for (index, path) in targets.iter().enumerate().skip(start_index) {
            if self.stop.load(Ordering::Relaxed) {
                tracing::info!(completed = index, total, "stop requested, persisting progress");
                self.persist_progress(index, total);
                stats.interrupted = true;
                break;
            }
            if let Some(memory) = &self.memory {
                if memory.over_budget() {
                    std::thread::sleep(MEMORY_PAUSE);
                    if memory.over_budget() {
                        tracing::warn!(
                            completed = index,
                            "memory still over budget after pause, halting build"
                        );
                        self.persist_progress(index, total);
                        stats.interrupted = true;
                        break;
                    }
                }
            }

            let started = Instant::now();
            let status = self.build_one(path, &slot);
            stats.record(status);
            self.persist_progress(index + 1, total);
            tracing::info!(
                file = index + 1,
                total,
                ?status,
                elapsed_ms = started.elapsed().as_millis() as u64,
                path = %path.display(),
                "baseline step"
            );
        }

        supervisor_stop.store(true, Ordering::Relaxed);
        if let Some(supervisor) = supervisor {
            let _ = supervisor.join();
        }

        if !stats.interrupted {
            if let Some(resume_log) = &self.resume_log {
                clear_progress(resume_log)?;
            }
        }
        tracing::info!(
            ok = stats.ok,
            skipped = stats.skipped,
            read_errors = stats.read_errors,
            save_errors = stats.save_errors,
            timeouts = stats.timeouts,
            interrupted = stats.interrupted,
            "baseline build finished"
        );
        Ok(stats)
    }

    fn build_one(&self, path: &Path, slot: &Arc<Mutex<Option<InFlight>>>) -> FileStatus {
        let key = BaselineStore::key_for(path);
        let stored = self.store.load(&key).unwrap_or_else(|err| {
            tracing::warn!(key, %err, "stored baseline unreadable, rebuilding");
            None
        });

        *slot.lock() = Some(InFlight {
            path: path.to_path_buf(),
            started: Instant::now(),
        });
        let result = self.engine.snapshot(path);
        // The supervisor clears the slot past the deadline; finding it
        // empty here means this file is already accounted a timeout.
        let timed_out = slot.lock().take().is_none();
        if timed_out {
            return FileStatus::Timeout;
        }

        let snapshot = match result {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(key, %err, "snapshot failed");
                return FileStatus::ReadError;
            }
        };

        let hash = fingerprint(&snapshot.model);
        if let Some(stored) = &stored {
            if stored.content_hash == hash {
                return FileStatus::Skipped;
            }
        }

        let baseline = Baseline {
            last_author: snapshot.last_author,
            content_hash: hash,
            cells: snapshot.model,
        };
        match self.store.save(&key, &baseline) {
            Ok(()) => FileStatus::Ok,
            Err(err) => {
                tracing::warn!(key, %err, "baseline save failed");
                FileStatus::SaveError
            }
        }
    }

    fn persist_progress(&self, completed: usize, total: usize) {
        let Some(resume_log) = &self.resume_log else {
            return;
        };
        if let Err(err) = save_progress(resume_log, &BuildProgress::new(completed, total)) {
            tracing::warn!(%err, "could not persist build progress");
        }
    }
}
