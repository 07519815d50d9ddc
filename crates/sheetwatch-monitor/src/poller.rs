//! The settling poller.
//!
//! A freshly-modified workbook is usually rewritten several times in quick
//! succession (autosave, network copy, application buffering). The poller
//! rechecks such a file every `interval` until it has been quiet for a full
//! `window`, then declares it settled and forgets it.
//!
//! One worker thread consumes a time-sorted task table under a single
//! mutex, woken by a condvar when [`start`](SettlingPoller::start) inserts
//! or resets a task. The change-check itself always runs with the lock
//! released.

use parking_lot::{Condvar, Mutex, MutexGuard};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

/// Runs one silent change-check; returns whether a semantic change was seen.
pub type CheckFn = Arc<dyn Fn(&Path) -> bool + Send + Sync>;

struct Task {
    due: Instant,
    remaining: Duration,
    /// Bumped by every `start` so a tick that raced a restart applies to
    /// nothing.
    epoch: u64,
}

struct PollerState {
    tasks: HashMap<PathBuf, Task>,
    next_epoch: u64,
    shutdown: bool,
}

struct PollerInner {
    interval: Duration,
    window: Duration,
    check: CheckFn,
    state: Mutex<PollerState>,
    wakeup: Condvar,
}

impl PollerInner {
    fn start(&self, path: &Path) {
        let mut state = self.state.lock();
        if state.shutdown {
            return;
        }
        let epoch = state.next_epoch;
        state.next_epoch += 1;
        let replaced = state
            .tasks
            .insert(
                path.to_path_buf(),
                Task {
                    due: Instant::now() + self.interval,
                    remaining: self.window,
                    epoch,
                },
            )
            .is_some();
        if replaced {
            tracing::debug!(path = %path.display(), "settle timer reset");
        } else {
            tracing::info!(path = %path.display(), window = ?self.window, "settling watch started");
        }
        self.wakeup.notify_one();
    }

    fn worker_loop(&self) {
        let mut state = self.state.lock();
        loop {
            if state.shutdown {
                return;
            }
            let next = state
                .tasks
                .iter()
                .min_by_key(|(_, task)| task.due)
                .map(|(path, task)| (path.clone(), task.due, task.epoch));

            let Some((path, due, epoch)) = next else {
                self.wakeup.wait(&mut state);
                continue;
            };
            if due > Instant::now() {
                // Re-evaluate after the wait: tasks may have been added,
                // reset, or cleared while we slept.
                let _ = self.wakeup.wait_until(&mut state, due);
                continue;
            }

            let mut changed = false;
            MutexGuard::unlocked(&mut state, || {
                changed = (self.check)(&path);
            });

            if state.shutdown {
                return;
            }
            let Some(task) = state.tasks.get_mut(&path) else {
                // No longer tracked; nothing to apply.
                continue;
            };
            if task.epoch != epoch {
                continue;
            }
            if changed {
                task.remaining = self.window;
                task.due = Instant::now() + self.interval;
                tracing::debug!(path = %path.display(), "still changing, window reset");
            } else {
                task.remaining = task.remaining.saturating_sub(self.interval);
                if task.remaining > Duration::ZERO {
                    task.due = Instant::now() + self.interval;
                } else {
                    state.tasks.remove(&path);
                    tracing::info!(path = %path.display(), "file settled");
                }
            }
        }
    }

    fn stop(&self) {
        let mut state = self.state.lock();
        state.tasks.clear();
        state.shutdown = true;
        self.wakeup.notify_all();
    }
}

/// Cloneable handle for starting settle timers from worker threads.
#[derive(Clone)]
pub struct PollerHandle {
    inner: Arc<PollerInner>,
}

impl PollerHandle {
    pub fn start(&self, path: &Path) {
        self.inner.start(path);
    }
}

pub struct SettlingPoller {
    inner: Arc<PollerInner>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SettlingPoller {
    pub fn new(interval: Duration, window: Duration, check: CheckFn) -> Self {
        let inner = Arc::new(PollerInner {
            interval,
            window,
            check,
            state: Mutex::new(PollerState {
                tasks: HashMap::new(),
                next_epoch: 0,
                shutdown: false,
            }),
            wakeup: Condvar::new(),
        });
        let worker_inner = Arc::clone(&inner);
        let worker = std::thread::Builder::new()
            .name("settling-poller".to_string())
            .spawn(move || worker_inner.worker_loop())
            .expect("spawn settling poller worker");
        Self {
            inner,
            worker: Mutex::new(Some(worker)),
        }
    }

    /// (Re)arm the settle timer for `path`: any existing timer is
    /// cancelled and the quiet window starts over.
    pub fn start(&self, path: &Path) {
        self.inner.start(path);
    }

    pub fn handle(&self) -> PollerHandle {
        PollerHandle {
            inner: Arc::clone(&self.inner),
        }
    }

    pub fn is_tracking(&self, path: &Path) -> bool {
        self.inner.state.lock().tasks.contains_key(path)
    }

    /// Cancel all outstanding timers and stop the worker. Idempotent.
    pub fn stop(&self) {
        self.inner.stop();
        if let Some(worker) = self.worker.lock().take() {
            let _ = worker.join();
        }
    }
}

impl Drop for SettlingPoller {
    fn drop(&mut self) {
        self.stop();
    }
}
