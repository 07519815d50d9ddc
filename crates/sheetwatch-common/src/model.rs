//! The normalised cell model and the shapes persisted around it.

use crate::{fingerprint, CellRef, CellScalar};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A cell's stored content. At least one component is present for the cell
/// to be recorded at all; a missing component is absent, not empty-string.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CellEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<CellScalar>,
}

impl CellEntry {
    pub fn from_formula(formula: impl Into<String>) -> Self {
        Self {
            formula: Some(formula.into()),
            value: None,
        }
    }

    pub fn from_value(value: impl Into<CellScalar>) -> Self {
        Self {
            formula: None,
            value: Some(value.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.formula.is_none() && self.value.is_none()
    }
}

/// Cells of one worksheet, keyed row-major by coordinate.
pub type Sheet = BTreeMap<CellRef, CellEntry>;

/// Worksheet name → cells. Sheets are name-sorted here; the document's
/// recorded sheet order is not semantic and is reported separately by the
/// snapshot engine where logging wants it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CellModel {
    pub sheets: BTreeMap<String, Sheet>,
}

impl CellModel {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.get(name)
    }

    pub fn cell_count(&self) -> usize {
        self.sheets.values().map(Sheet::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.sheets.values().all(Sheet::is_empty)
    }

    /// Insert a single entry, creating the worksheet on demand.
    pub fn set(&mut self, sheet: impl Into<String>, cell: CellRef, entry: CellEntry) {
        self.sheets.entry(sheet.into()).or_default().insert(cell, entry);
    }
}

/// The persisted last-known state of one monitored document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Baseline {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_author: Option<String>,
    pub content_hash: String,
    pub cells: CellModel,
}

impl Baseline {
    /// Build a baseline whose `content_hash` is the fingerprint of `cells`.
    pub fn new(cells: CellModel, last_author: Option<String>) -> Self {
        let content_hash = fingerprint(&cells);
        Self {
            last_author,
            content_hash,
            cells,
        }
    }

    /// The baseline of a never-seen document.
    pub fn empty() -> Self {
        Self::new(CellModel::default(), None)
    }
}

/// One semantic difference between two readings of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellChange {
    pub worksheet: String,
    pub cell: CellRef,
    pub old_formula: Option<String>,
    pub old_value: Option<CellScalar>,
    pub new_formula: Option<String>,
    pub new_value: Option<CellScalar>,
}

/// `externalLink<n>` index → referenced workbook path, as recorded in the
/// package.
pub type ExternalRefMap = BTreeMap<u32, String>;
