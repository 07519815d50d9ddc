//! The monitor control plane.
//!
//! Owns event intake, the per-path in-flight guard, the committed event
//! counter, and the settling poller. Accepted events run their
//! change-check on a worker thread; the in-flight set keeps at most one
//! check per path alive no matter how fast events arrive.

use crate::pipeline::ChangeHandler;
use crate::poller::{PollerHandle, SettlingPoller};
use crate::watcher::watch_dirs;
use crate::{MonitorConfig, MonitorError};
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Host-application lock files (`~$Book.xlsx`) are churn, not content.
pub const LOCK_FILE_PREFIX: &str = "~$";

pub struct Monitor<H: ChangeHandler> {
    config: MonitorConfig,
    check: Arc<H>,
    poller: SettlingPoller,
    in_flight: Arc<Mutex<HashSet<PathBuf>>>,
    event_seq: Arc<Mutex<u64>>,
    stop: Arc<AtomicBool>,
}

impl<H: ChangeHandler> Monitor<H> {
    pub fn new(config: MonitorConfig, check: Arc<H>, stop: Arc<AtomicBool>) -> Self {
        let in_flight: Arc<Mutex<HashSet<PathBuf>>> = Arc::new(Mutex::new(HashSet::new()));

        // Poll ticks share the event path's in-flight set, so a settling
        // recheck never overlaps an event-dispatched check of the same
        // document. A tick that loses the race reads as a quiet tick; the
        // running check restarts the timer itself if it finds a change.
        let poller_check = Arc::clone(&check);
        let poller_in_flight = Arc::clone(&in_flight);
        let poller = SettlingPoller::new(
            config.poll_interval(),
            config.poll_window(),
            Arc::new(move |path: &Path| {
                if !poller_in_flight.lock().insert(path.to_path_buf()) {
                    return false;
                }
                let _guard = InFlightGuard {
                    set: Arc::clone(&poller_in_flight),
                    path: path.to_path_buf(),
                };
                poller_check.check(path, true).is_semantic_change()
            }),
        );
        Self {
            config,
            check,
            poller,
            in_flight,
            event_seq: Arc::new(Mutex::new(0)),
            stop,
        }
    }

    /// Number of committed change events so far.
    pub fn event_count(&self) -> u64 {
        *self.event_seq.lock()
    }

    pub fn poller(&self) -> &SettlingPoller {
        &self.poller
    }

    /// Subscribe and pump events until the stop flag is raised or the
    /// watcher goes away. Teardown cancels all settle timers before
    /// returning.
    pub fn run(&self) -> Result<(), MonitorError> {
        let handle = watch_dirs(&self.config.watch_dirs)?;
        tracing::info!(roots = handle.roots, "monitor running");

        loop {
            if self.stop.load(Ordering::Relaxed) {
                tracing::info!("stop requested");
                break;
            }
            match handle.events.recv_timeout(Duration::from_millis(250)) {
                Ok(path) => self.handle_event(path),
                Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
                Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
            }
        }

        self.poller.stop();
        drop(handle);
        tracing::info!(events = self.event_count(), "monitor stopped");
        Ok(())
    }

    /// Filter, debounce, and dispatch one filesystem event.
    pub fn handle_event(&self, path: PathBuf) {
        if !self.accepts(&path) {
            return;
        }
        {
            let mut in_flight = self.in_flight.lock();
            if !in_flight.insert(path.clone()) {
                tracing::debug!(path = %path.display(), "check already in flight, event dropped");
                return;
            }
        }

        let check = Arc::clone(&self.check);
        let in_flight = Arc::clone(&self.in_flight);
        let event_seq = Arc::clone(&self.event_seq);
        let poller = self.poller.handle();
        let path_for_err = path.clone();
        let spawned = std::thread::Builder::new()
            .name("change-check".to_string())
            .spawn(move || {
                let _guard = InFlightGuard {
                    set: in_flight,
                    path: path.clone(),
                };
                run_check(check.as_ref(), &event_seq, &poller, &path);
            });
        if let Err(err) = spawned {
            tracing::warn!(%err, "could not spawn change-check worker");
            self.in_flight.lock().remove(&path_for_err);
        }
    }

    fn accepts(&self, path: &Path) -> bool {
        if path.is_dir() {
            return false;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        if name.starts_with(LOCK_FILE_PREFIX) {
            return false;
        }
        self.config.is_supported(path)
    }

    /// Wait for in-flight checks to drain; test support.
    #[doc(hidden)]
    pub fn drain_in_flight(&self, budget: Duration) -> bool {
        let deadline = std::time::Instant::now() + budget;
        while !self.in_flight.lock().is_empty() {
            if std::time::Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        true
    }
}

fn run_check<H: ChangeHandler>(
    check: &H,
    event_seq: &Mutex<u64>,
    poller: &PollerHandle,
    path: &Path,
) {
    let outcome = check.check(path, false);
    if outcome.is_semantic_change() {
        // Allocate-and-commit in one critical section so concurrent
        // checks on distinct paths get distinct numbers; quiet checks
        // consume nothing.
        let event = {
            let mut seq = event_seq.lock();
            *seq += 1;
            *seq
        };
        tracing::info!(event, path = %path.display(), "change event committed");
        poller.start(path);
    }
}

/// Clears the per-path debounce entry no matter how the check exits.
struct InFlightGuard {
    set: Arc<Mutex<HashSet<PathBuf>>>,
    path: PathBuf,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.lock().remove(&self.path);
    }
}
