//! Monitor configuration.
//!
//! A closed enumeration of knobs, loaded from a JSON file. Every field has
//! a serde default so a partial config is valid; unknown keys are rejected
//! so typos fail loudly at startup instead of silently disabling features.

use crate::MonitorError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MonitorConfig {
    /// Roots observed recursively.
    pub watch_dirs: Vec<PathBuf>,
    /// Where baselines are written.
    pub baseline_dir: PathBuf,
    /// Where daily audit logs are written.
    pub log_dir: PathBuf,

    /// Copy-through cache for snapshot reads.
    pub use_local_cache: bool,
    pub cache_dir: PathBuf,

    /// Advisory per-file deadline during baseline builds.
    pub enable_timeout: bool,
    pub timeout_seconds: u64,

    /// Pause/halt the builder when process RSS crosses the limit.
    pub enable_memory_monitor: bool,
    pub memory_limit_mb: u64,

    /// Resumable baseline build.
    pub enable_resume: bool,
    pub resume_log: PathBuf,

    /// Build baselines for every supported file under `watch_dirs` at
    /// startup; otherwise only `manual_targets` are built.
    pub scan_all_mode: bool,
    pub manual_targets: Vec<PathBuf>,

    /// Substring patterns whose matches get a baseline built silently on
    /// first sight instead of a full new-content report.
    pub force_baseline_patterns: Vec<String>,

    /// Settling poller cadence and quiet window, in seconds.
    pub poll_interval: u64,
    pub poll_window: u64,

    /// File extensions considered to be monitored workbooks.
    pub supported_extensions: Vec<String>,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            watch_dirs: Vec::new(),
            baseline_dir: PathBuf::from("baselines"),
            log_dir: PathBuf::from("logs"),
            use_local_cache: false,
            cache_dir: PathBuf::from("cache"),
            enable_timeout: true,
            timeout_seconds: 120,
            enable_memory_monitor: false,
            memory_limit_mb: 2048,
            enable_resume: true,
            resume_log: PathBuf::from("baseline_resume.json"),
            scan_all_mode: true,
            manual_targets: Vec::new(),
            force_baseline_patterns: Vec::new(),
            poll_interval: 5,
            poll_window: 15,
            supported_extensions: vec!["xlsx".to_string(), "xlsm".to_string()],
        }
    }
}

impl MonitorConfig {
    pub fn load(path: &Path) -> Result<Self, MonitorError> {
        let bytes = std::fs::read(path).map_err(|e| MonitorError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| MonitorError::Config {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// The cache directory when the copy-through cache is enabled.
    pub fn effective_cache_dir(&self) -> Option<PathBuf> {
        self.use_local_cache.then(|| self.cache_dir.clone())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval)
    }

    pub fn poll_window(&self) -> Duration {
        Duration::from_secs(self.poll_window)
    }

    pub fn file_timeout(&self) -> Option<Duration> {
        self.enable_timeout
            .then(|| Duration::from_secs(self.timeout_seconds))
    }

    /// Extension check, case-insensitive.
    pub fn is_supported(&self, path: &Path) -> bool {
        let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        self.supported_extensions
            .iter()
            .any(|s| s.eq_ignore_ascii_case(ext))
    }
}
