//! Content fingerprinting over a canonical serialisation of a [`CellModel`].

use crate::CellModel;
use sha2::{Digest, Sha256};

// Separators keep adjacent fields from gluing together ("AB"+"C" vs "A"+"BC").
const FIELD_SEP: [u8; 1] = [0x1f];
const RECORD_SEP: [u8; 1] = [0x1e];

/// Reduce a model to a stable SHA-256 hex digest.
///
/// Worksheets and coordinates are iterated in sorted order (the model's
/// containers guarantee it) and values are coerced to their canonical string
/// form, so the digest is pure and stable across runs and hosts. Worksheets
/// with no recorded cells contribute nothing, matching the differ's view
/// that an empty sheet and an absent sheet are the same content.
pub fn fingerprint(model: &CellModel) -> String {
    let mut hasher = Sha256::new();
    for (sheet, cells) in &model.sheets {
        for (cell, entry) in cells {
            hasher.update(sheet.as_bytes());
            hasher.update(FIELD_SEP);
            hasher.update(cell.label().as_bytes());
            hasher.update(FIELD_SEP);
            if let Some(formula) = &entry.formula {
                hasher.update(formula.as_bytes());
            }
            hasher.update(FIELD_SEP);
            if let Some(value) = &entry.value {
                hasher.update(value.coerced().as_bytes());
            }
            hasher.update(RECORD_SEP);
        }
    }
    hex::encode(hasher.finalize())
}
