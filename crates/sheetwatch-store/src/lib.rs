pub mod audit;
pub mod baseline;
pub mod error;
pub mod resume;

pub use audit::AuditLog;
pub use baseline::{BaselineStore, BASELINE_SUFFIX};
pub use error::StoreError;
pub use resume::{clear_progress, load_progress, save_progress, BuildProgress};
