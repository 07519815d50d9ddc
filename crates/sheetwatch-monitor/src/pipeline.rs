//! One change-check: snapshot → compare → report → rotate.
//!
//! This is the path both the event dispatcher and the settling poller run.
//! Every component failure is downgraded to a status marker here; nothing
//! below this function unwinds into the control plane.

use sheetwatch_common::{fingerprint, Baseline};
use sheetwatch_diff::{annotate_changes, diff_cell_models};
use sheetwatch_io::SnapshotEngine;
use sheetwatch_store::{AuditLog, BaselineStore};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckOutcome {
    /// Fingerprint match, or every candidate was suppressed as noise. The
    /// stored baseline stays authoritative.
    Unchanged,
    /// Semantic changes audited and the baseline rotated forward.
    Changed(usize),
    /// First sight of the document; baseline built without a change report.
    Baselined,
    ReadError,
    SaveError,
}

impl CheckOutcome {
    pub fn is_semantic_change(&self) -> bool {
        matches!(self, CheckOutcome::Changed(_))
    }
}

/// The one capability the control plane needs from the pipeline. The
/// monitor and the settling poller both dispatch through this seam.
pub trait ChangeHandler: Send + Sync + 'static {
    fn check(&self, path: &Path, silent: bool) -> CheckOutcome;
}

impl ChangeHandler for ChangeCheck {
    fn check(&self, path: &Path, silent: bool) -> CheckOutcome {
        self.run(path, silent)
    }
}

pub struct ChangeCheck {
    engine: SnapshotEngine,
    store: BaselineStore,
    audit: AuditLog,
    force_patterns: Vec<String>,
}

impl ChangeCheck {
    pub fn new(
        engine: SnapshotEngine,
        store: BaselineStore,
        audit: AuditLog,
        force_patterns: Vec<String>,
    ) -> Self {
        Self {
            engine,
            store,
            audit,
            force_patterns,
        }
    }

    pub fn store(&self) -> &BaselineStore {
        &self.store
    }

    /// Run one check. `silent` marks settling rechecks: logging drops to
    /// debug, but detection, audit rows, and baseline rotation are
    /// identical.
    pub fn run(&self, path: &Path, silent: bool) -> CheckOutcome {
        let snapshot = match self.engine.snapshot(path) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "snapshot failed");
                return CheckOutcome::ReadError;
            }
        };
        if !silent {
            tracing::info!(
                path = %path.display(),
                bytes = snapshot.byte_size,
                sheets = snapshot.sheet_count(),
                "checking document"
            );
        }

        let key = BaselineStore::key_for(path);
        let stored = match self.store.load(&key) {
            Ok(stored) => stored,
            Err(err) => {
                tracing::warn!(key, %err, "baseline unreadable, treating as absent");
                None
            }
        };

        let current_hash = fingerprint(&snapshot.model);
        let first_sight = stored.is_none();
        let stored = stored.unwrap_or_else(Baseline::empty);

        if stored.content_hash == current_hash {
            if !silent {
                tracing::debug!(key, "content fingerprint unchanged");
            }
            return CheckOutcome::Unchanged;
        }

        let mut changes = diff_cell_models(&stored.cells, &snapshot.model);

        // A brand-new document matching a force pattern is baselined
        // without flooding the audit trail with its entire content.
        if first_sight && self.matches_force_pattern(path) {
            let baseline = Baseline {
                last_author: snapshot.last_author,
                content_hash: current_hash,
                cells: snapshot.model,
            };
            return match self.store.save(&key, &baseline) {
                Ok(()) => {
                    tracing::info!(key, "baseline forced on first sight");
                    CheckOutcome::Baselined
                }
                Err(err) => {
                    tracing::warn!(key, %err, "baseline save failed");
                    CheckOutcome::SaveError
                }
            };
        }

        if changes.is_empty() {
            // The fingerprint moved but every candidate was noise; do not
            // rotate the baseline, its hash stays the reference point.
            tracing::debug!(key, "all candidates noise-suppressed");
            return CheckOutcome::Unchanged;
        }

        let count = changes.len();
        annotate_changes(&mut changes, &snapshot.external_refs);
        if let Err(err) =
            self.audit
                .append(path, snapshot.last_author.as_deref(), &changes)
        {
            tracing::warn!(key, %err, "audit append failed");
        }

        let baseline = Baseline {
            last_author: snapshot.last_author,
            content_hash: current_hash,
            cells: snapshot.model,
        };
        match self.store.save(&key, &baseline) {
            Ok(()) => {
                if silent {
                    tracing::debug!(key, changes = count, "changes recorded (settling recheck)");
                } else {
                    tracing::info!(key, changes = count, "changes recorded");
                }
                CheckOutcome::Changed(count)
            }
            Err(err) => {
                tracing::warn!(key, %err, "baseline save failed, next event retries");
                CheckOutcome::SaveError
            }
        }
    }

    fn matches_force_pattern(&self, path: &Path) -> bool {
        let path_text = path.to_string_lossy();
        self.force_patterns
            .iter()
            .any(|pattern| path_text.contains(pattern.as_str()))
    }
}
