//! Semantic diffing between a stored baseline and a fresh cell model.
//!
//! A change is emitted when the formula texts differ or the string-coerced
//! values differ. Because the snapshot engine reduces array formulas to
//! their shared text, any candidate whose formula is present and unchanged
//! on both sides can only be object-identity churn from an older reading
//! and is dropped. Value-only cells (no formula on either side) always keep
//! their value diffs.

pub mod enrich;

pub use enrich::{annotate_changes, annotate_external_refs};

use sheetwatch_common::{fingerprint, Baseline, CellChange, CellEntry, CellModel};
use std::collections::BTreeSet;

/// Diff a fresh model against the stored baseline. Equal fingerprints
/// short-circuit to an empty diff without touching a single cell.
pub fn diff_against_baseline(stored: &Baseline, current: &CellModel) -> Vec<CellChange> {
    if fingerprint(current) == stored.content_hash {
        return Vec::new();
    }
    diff_cell_models(&stored.cells, current)
}

/// Full cell-level comparison over the union of worksheets and coordinates.
/// The result order is deterministic for a given pair of inputs; callers
/// must not rely on any particular ordering beyond that.
pub fn diff_cell_models(old: &CellModel, new: &CellModel) -> Vec<CellChange> {
    let mut changes = Vec::new();

    let sheet_names: BTreeSet<&String> = old.sheets.keys().chain(new.sheets.keys()).collect();
    for name in sheet_names {
        let old_sheet = old.sheet(name);
        let new_sheet = new.sheet(name);

        let coords: BTreeSet<_> = old_sheet
            .into_iter()
            .flat_map(|s| s.keys())
            .chain(new_sheet.into_iter().flat_map(|s| s.keys()))
            .copied()
            .collect();

        for cell in coords {
            let old_entry = old_sheet.and_then(|s| s.get(&cell));
            let new_entry = new_sheet.and_then(|s| s.get(&cell));
            if let Some(change) = compare_entries(name, cell, old_entry, new_entry) {
                changes.push(change);
            }
        }
    }

    changes
}

fn compare_entries(
    worksheet: &str,
    cell: sheetwatch_common::CellRef,
    old: Option<&CellEntry>,
    new: Option<&CellEntry>,
) -> Option<CellChange> {
    let old_formula = old.and_then(|e| e.formula.as_deref());
    let new_formula = new.and_then(|e| e.formula.as_deref());
    let old_value = old.and_then(|e| e.value.as_ref());
    let new_value = new.and_then(|e| e.value.as_ref());

    let formula_changed = old_formula != new_formula;
    let value_changed = old_value.map(|v| v.coerced()) != new_value.map(|v| v.coerced());
    if !formula_changed && !value_changed {
        return None;
    }

    // Noise filter: the same formula read twice is the same content, no
    // matter what the reader did to its value slot.
    if !formula_changed && old_formula.is_some() {
        return None;
    }

    Some(CellChange {
        worksheet: worksheet.to_string(),
        cell,
        old_formula: old_formula.map(str::to_string),
        old_value: old_value.cloned(),
        new_formula: new_formula.map(str::to_string),
        new_value: new_value.cloned(),
    })
}
