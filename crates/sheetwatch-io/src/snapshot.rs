//! Formula-preserving snapshot extraction.
//!
//! `SnapshotEngine` turns a workbook path into a normalised [`CellModel`]:
//! formula cells keep their text (the cached computed value is not trusted),
//! value cells coerce to [`CellScalar`]s, empty cells are omitted. Array and
//! shared formulas surface as their shared formula text, which is what makes
//! two reads of an unchanged document compare equal.

use crate::{read_external_refs, read_last_author, SnapshotError, XlsxPackage};
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use sha2::{Digest, Sha256};
use sheetwatch_common::{CellEntry, CellModel, CellRef, CellScalar, ExternalRefMap, Sheet};
use std::fs;
use std::path::{Path, PathBuf};

/// One full reading of a document, plus the metadata the monitor logs.
#[derive(Debug, Clone)]
pub struct DocumentSnapshot {
    pub model: CellModel,
    /// Worksheet names in the document's recorded order.
    pub sheet_order: Vec<String>,
    /// On-disk size of the source document.
    pub byte_size: u64,
    pub external_refs: ExternalRefMap,
    pub last_author: Option<String>,
}

impl DocumentSnapshot {
    pub fn sheet_count(&self) -> usize {
        self.sheet_order.len()
    }
}

pub struct SnapshotEngine {
    cache_dir: Option<PathBuf>,
}

impl SnapshotEngine {
    pub fn new(cache_dir: Option<PathBuf>) -> Self {
        Self { cache_dir }
    }

    pub fn snapshot(&self, path: &Path) -> Result<DocumentSnapshot, SnapshotError> {
        let byte_size = fs::metadata(path)
            .map_err(|e| SnapshotError::read(path, e))?
            .len();
        let read_path = self.read_path_for(path);

        let mut workbook: Xlsx<_> =
            open_workbook(&read_path).map_err(|e| SnapshotError::archive(&read_path, e))?;
        let sheet_order = workbook.sheet_names().to_vec();

        let mut model = CellModel::default();
        for name in &sheet_order {
            let range = workbook
                .worksheet_range(name)
                .map_err(|e| SnapshotError::read(&read_path, format!("sheet '{name}': {e}")))?;
            let formulas = workbook.worksheet_formula(name).ok();
            model
                .sheets
                .insert(name.clone(), sheet_cells(&range, formulas.as_ref()));
        }

        let mut pkg = XlsxPackage::open(&read_path)?;
        let external_refs = read_external_refs(&mut pkg);
        let last_author = read_last_author(&mut pkg);

        tracing::debug!(
            path = %path.display(),
            bytes = byte_size,
            sheets = sheet_order.len(),
            cells = model.cell_count(),
            "snapshot complete"
        );

        Ok(DocumentSnapshot {
            model,
            sheet_order,
            byte_size,
            external_refs,
            last_author,
        })
    }

    /// The path all reads go through: the copy-through cache when one is
    /// configured and populatable, otherwise the source itself. Cache
    /// failures are non-fatal by contract.
    fn read_path_for(&self, source: &Path) -> PathBuf {
        let Some(cache_dir) = &self.cache_dir else {
            return source.to_path_buf();
        };
        match populate_cache(source, cache_dir) {
            Ok(cached) => cached,
            Err(err) => {
                tracing::warn!(%err, "falling back to direct read");
                source.to_path_buf()
            }
        }
    }
}

fn populate_cache(source: &Path, cache_dir: &Path) -> Result<PathBuf, SnapshotError> {
    fs::create_dir_all(cache_dir).map_err(|e| SnapshotError::cache(source, e))?;
    let cached = cache_dir.join(cache_file_name(source)?);

    let source_mtime = fs::metadata(source)
        .and_then(|m| m.modified())
        .map_err(|e| SnapshotError::cache(source, e))?;
    let cache_is_fresh = fs::metadata(&cached)
        .and_then(|m| m.modified())
        .map(|cached_mtime| cached_mtime >= source_mtime)
        .unwrap_or(false);

    if !cache_is_fresh {
        fs::copy(source, &cached).map_err(|e| SnapshotError::cache(source, e))?;
    }
    Ok(cached)
}

/// Cache entry name: first 16 hex characters of SHA-256 over the absolute
/// source path, joined to the basename. Distinct source paths sharing a
/// basename therefore get distinct cache entries.
fn cache_file_name(source: &Path) -> Result<String, SnapshotError> {
    let absolute = source
        .canonicalize()
        .map_err(|e| SnapshotError::cache(source, e))?;
    let mut hasher = Sha256::new();
    hasher.update(absolute.to_string_lossy().as_bytes());
    let digest = hex::encode(hasher.finalize());
    let basename = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "workbook".to_string());
    Ok(format!("{}_{}", &digest[..16], basename))
}

fn sheet_cells(range: &Range<Data>, formulas: Option<&Range<String>>) -> Sheet {
    let mut cells = Sheet::new();

    let (start_row, start_col) = range.start().unwrap_or_default();
    for (row, col, data) in range.used_cells() {
        let value = match data {
            Data::Empty => None,
            // Empty strings are storage noise, not content.
            Data::String(s) if s.is_empty() => None,
            other => convert_value(other),
        };
        if let Some(value) = value {
            let cell = CellRef::new(
                row as u32 + start_row + 1,
                col as u32 + start_col + 1,
            );
            cells.insert(cell, CellEntry::from_value(value));
        }
    }

    // Formula cells replace any value entry: only the stored text is
    // compared, never the last-computed value.
    if let Some(formula_range) = formulas {
        let (start_row, start_col) = formula_range.start().unwrap_or_default();
        for (row, col, formula) in formula_range.used_cells() {
            if formula.is_empty() {
                continue;
            }
            let text = if formula.starts_with('=') {
                formula.clone()
            } else {
                format!("={formula}")
            };
            let cell = CellRef::new(
                row as u32 + start_row + 1,
                col as u32 + start_col + 1,
            );
            cells.insert(cell, CellEntry::from_formula(text));
        }
    }

    cells
}

fn convert_value(data: &Data) -> Option<CellScalar> {
    match data {
        Data::Empty => None,
        Data::String(s) => Some(CellScalar::Text(s.clone())),
        Data::Float(f) => Some(CellScalar::Number(*f)),
        Data::Int(i) => Some(CellScalar::Int(*i)),
        Data::Bool(b) => Some(CellScalar::Boolean(*b)),
        Data::DateTime(dt) => Some(
            dt.as_datetime()
                .map(CellScalar::DateTime)
                .unwrap_or(CellScalar::Number(dt.as_f64())),
        ),
        Data::DateTimeIso(s) => Some(CellScalar::Text(s.clone())),
        Data::DurationIso(s) => Some(CellScalar::Text(s.clone())),
        Data::Error(e) => Some(CellScalar::Text(error_code(e).to_string())),
    }
}

fn error_code(e: &calamine::CellErrorType) -> &'static str {
    use calamine::CellErrorType::*;
    match e {
        Div0 => "#DIV/0!",
        NA => "#N/A",
        Name => "#NAME?",
        Null => "#NULL!",
        Num => "#NUM!",
        Ref => "#REF!",
        Value => "#VALUE!",
        GettingData => "#GETTING_DATA",
    }
}
