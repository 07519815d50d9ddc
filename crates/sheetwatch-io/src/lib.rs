pub mod author;
pub mod error;
pub mod links;
pub mod package;
pub mod snapshot;

pub use author::read_last_author;
pub use error::SnapshotError;
pub use links::read_external_refs;
pub use package::XlsxPackage;
pub use snapshot::{DocumentSnapshot, SnapshotEngine};

// Re-export for convenience
pub use sheetwatch_common::{CellEntry, CellModel, CellRef, CellScalar, ExternalRefMap};
