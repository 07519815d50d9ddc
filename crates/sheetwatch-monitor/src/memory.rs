//! Process-memory supervision for the baseline builder.
//!
//! Samples this process's RSS through `sysinfo`. The builder pauses when
//! the budget is crossed and halts (persisting resume state) if a re-check
//! still reads over budget.

use parking_lot::Mutex;
use sysinfo::{Pid, System};

pub struct MemoryMonitor {
    system: Mutex<System>,
    pid: Pid,
    limit_bytes: u64,
}

impl MemoryMonitor {
    /// `None` when the current pid cannot be resolved, in which case the
    /// caller simply runs unsupervised.
    pub fn new(limit_mb: u64) -> Option<Self> {
        let pid = sysinfo::get_current_pid().ok()?;
        Some(Self {
            system: Mutex::new(System::new()),
            pid,
            limit_bytes: limit_mb.saturating_mul(1024 * 1024),
        })
    }

    pub fn rss_bytes(&self) -> u64 {
        let mut system = self.system.lock();
        system.refresh_process(self.pid);
        system.process(self.pid).map(|p| p.memory()).unwrap_or(0)
    }

    pub fn limit_bytes(&self) -> u64 {
        self.limit_bytes
    }

    pub fn over_budget(&self) -> bool {
        let rss = self.rss_bytes();
        let over = rss > self.limit_bytes;
        if over {
            tracing::warn!(
                rss_mb = rss / (1024 * 1024),
                limit_mb = self.limit_bytes / (1024 * 1024),
                "process memory over budget"
            );
        }
        over
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn samples_a_nonzero_rss() {
        let monitor = MemoryMonitor::new(64 * 1024).unwrap();
        assert!(monitor.rss_bytes() > 0);
        assert!(!monitor.over_budget());
    }

    #[test]
    fn tiny_budget_reads_over() {
        let monitor = MemoryMonitor::new(0).unwrap();
        assert!(monitor.over_budget());
    }
}
