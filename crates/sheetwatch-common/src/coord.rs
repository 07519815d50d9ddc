//! A1-style cell references.
//!
//! [`CellRef`] holds a 1-based (row, column) position and renders as the
//! familiar `A1`/`BC27` label. Ordering follows natural row-major order so a
//! `BTreeMap<CellRef, _>` iterates the way a reader scans a sheet, which is
//! what keeps fingerprints deterministic.

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::error::Error;
use std::fmt;
use std::str::FromStr;

/// Errors produced when parsing an A1 label.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum A1ParseError {
    Empty,
    BadColumn(String),
    BadRow(String),
}

impl fmt::Display for A1ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            A1ParseError::Empty => write!(f, "empty cell label"),
            A1ParseError::BadColumn(s) => write!(f, "invalid column letters in '{s}'"),
            A1ParseError::BadRow(s) => write!(f, "invalid row number in '{s}'"),
        }
    }
}

impl Error for A1ParseError {}

/// 1-based cell position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellRef {
    pub row: u32,
    pub col: u32,
}

impl CellRef {
    pub fn new(row: u32, col: u32) -> Self {
        debug_assert!(row >= 1 && col >= 1, "CellRef is 1-based");
        Self { row, col }
    }

    /// The `A1`-style label.
    pub fn label(&self) -> String {
        format!("{}{}", column_to_letters(self.col), self.row)
    }
}

impl fmt::Display for CellRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", column_to_letters(self.col), self.row)
    }
}

impl FromStr for CellRef {
    type Err = A1ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(A1ParseError::Empty);
        }
        let split = s.find(|c: char| c.is_ascii_digit()).unwrap_or(s.len());
        let (letters, digits) = s.split_at(split);
        let col =
            letters_to_column(letters).ok_or_else(|| A1ParseError::BadColumn(s.to_string()))?;
        let row: u32 = digits
            .parse()
            .ok()
            .filter(|r| *r >= 1)
            .ok_or_else(|| A1ParseError::BadRow(s.to_string()))?;
        Ok(CellRef { row, col })
    }
}

impl Serialize for CellRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for CellRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

/// 1-based column index to letters: 1 → `A`, 27 → `AA`.
pub fn column_to_letters(col: u32) -> String {
    assert!(col >= 1, "column index is 1-based");
    let mut col = col - 1;
    let mut buf = Vec::new();
    loop {
        let rem = (col % 26) as u8;
        buf.push(b'A' + rem);
        col /= 26;
        if col == 0 {
            break;
        }
        col -= 1;
    }
    buf.reverse();
    String::from_utf8(buf).expect("only ASCII A-Z")
}

/// Letters to 1-based column index. Rejects empty and non-uppercase input.
pub fn letters_to_column(s: &str) -> Option<u32> {
    if s.is_empty() {
        return None;
    }
    let mut col: u32 = 0;
    for ch in s.bytes() {
        if !ch.is_ascii_uppercase() {
            return None;
        }
        col = col.checked_mul(26)?.checked_add((ch - b'A' + 1) as u32)?;
    }
    Some(col)
}
