//! Scalar cell values and their canonical string coercion.
//!
//! A [`CellScalar`] is the content a workbook *stores* in a cell, never a
//! computed result. Timestamps are carried as `NaiveDateTime` and coerce to
//! ISO-8601 text; equality never involves host-object identity.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// Format used both by `coerced()` and by the serde representation of
/// `NaiveDateTime`, so a timestamp that round-trips through JSON as plain
/// text still coerces to the same string.
const ISO_DATETIME_FMT: &str = "%Y-%m-%dT%H:%M:%S%.f";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellScalar {
    Int(i64),
    Number(f64),
    Boolean(bool),
    Text(String),
    DateTime(NaiveDateTime),
}

impl CellScalar {
    /// Canonical string form used for fingerprinting, diff comparison, and
    /// audit rows.
    pub fn coerced(&self) -> String {
        match self {
            CellScalar::Int(i) => i.to_string(),
            CellScalar::Number(n) => n.to_string(),
            CellScalar::Boolean(b) => b.to_string(),
            CellScalar::Text(s) => s.clone(),
            CellScalar::DateTime(dt) => dt.format(ISO_DATETIME_FMT).to_string(),
        }
    }
}

impl Display for CellScalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.coerced())
    }
}

impl From<i64> for CellScalar {
    fn from(v: i64) -> Self {
        CellScalar::Int(v)
    }
}

impl From<f64> for CellScalar {
    fn from(v: f64) -> Self {
        CellScalar::Number(v)
    }
}

impl From<bool> for CellScalar {
    fn from(v: bool) -> Self {
        CellScalar::Boolean(v)
    }
}

impl From<String> for CellScalar {
    fn from(v: String) -> Self {
        CellScalar::Text(v)
    }
}

impl<'a> From<&'a str> for CellScalar {
    fn from(v: &'a str) -> Self {
        CellScalar::Text(v.to_string())
    }
}

impl From<NaiveDateTime> for CellScalar {
    fn from(v: NaiveDateTime) -> Self {
        CellScalar::DateTime(v)
    }
}
