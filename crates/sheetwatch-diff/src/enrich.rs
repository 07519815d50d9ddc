//! External-reference annotation of reported formulas.
//!
//! Formula tokens of the shape `[3]Rates!B2` index the workbook's external
//! link table. Reported changes get a readable `[external3: <path>]` prefix
//! in front of each token; the stored baseline keeps the raw text.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use sheetwatch_common::{CellChange, ExternalRefMap};

static EXTERNAL_REF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\d+)\]([^\[\]!]+)!").expect("static pattern"));

/// Prefix every `[n]Name!` occurrence with its resolved workbook path.
/// Indices missing from the map pass through unchanged, and a formula with
/// no such tokens comes back identical (annotation is idempotent there).
pub fn annotate_external_refs(formula: &str, refs: &ExternalRefMap) -> String {
    EXTERNAL_REF
        .replace_all(formula, |caps: &Captures<'_>| {
            let index: u32 = caps[1].parse().unwrap_or(u32::MAX);
            match refs.get(&index) {
                Some(href) => format!("[external{}: {}]{}", &caps[1], href, &caps[0]),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Rewrite both formula fields of each reported change.
pub fn annotate_changes(changes: &mut [CellChange], refs: &ExternalRefMap) {
    if refs.is_empty() {
        return;
    }
    for change in changes {
        if let Some(formula) = &change.old_formula {
            change.old_formula = Some(annotate_external_refs(formula, refs));
        }
        if let Some(formula) = &change.new_formula {
            change.new_formula = Some(annotate_external_refs(formula, refs));
        }
    }
}
