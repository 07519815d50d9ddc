pub mod builder;
pub mod config;
pub mod error;
pub mod memory;
pub mod monitor;
pub mod pipeline;
pub mod poller;
pub mod watcher;

pub use builder::{BaselineBuilder, BuildStats, FileStatus};
pub use config::MonitorConfig;
pub use error::MonitorError;
pub use memory::MemoryMonitor;
pub use monitor::Monitor;
pub use pipeline::{ChangeCheck, ChangeHandler, CheckOutcome};
pub use poller::SettlingPoller;
pub use watcher::WatchHandle;
