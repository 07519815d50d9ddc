//! Append-only audit trail of detected cell changes.
//!
//! One gzip CSV per calendar day. Each append encodes a complete gzip
//! member in memory and writes it with a single locked append, so members
//! from concurrent change-checks never interleave; standard decoders read
//! the member concatenation transparently. Durability is best-effort: no
//! fsync between records.

use crate::StoreError;
use chrono::{Local, NaiveDate};
use flate2::write::GzEncoder;
use flate2::Compression;
use parking_lot::Mutex;
use sheetwatch_common::CellChange;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

const FILE_PREFIX: &str = "excel_change_log_";

const HEADER: [&str; 9] = [
    "Timestamp",
    "File Path",
    "Author",
    "Worksheet",
    "Cell",
    "Old Formula",
    "Old Value",
    "New Formula",
    "New Value",
];

pub struct AuditLog {
    dir: PathBuf,
    /// Serialises the exists-check and the member write; `O_APPEND` only
    /// makes single `write()`s atomic, not whole members.
    append_lock: Mutex<()>,
}

impl AuditLog {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            append_lock: Mutex::new(()),
        })
    }

    pub fn path_for_date(&self, date: NaiveDate) -> PathBuf {
        self.dir
            .join(format!("{FILE_PREFIX}{}.csv.gz", date.format("%Y%m%d")))
    }

    pub fn todays_path(&self) -> PathBuf {
        self.path_for_date(Local::now().date_naive())
    }

    /// Append one row per change to today's log, writing the header row
    /// exactly once when the file is first created.
    pub fn append(
        &self,
        document: &Path,
        author: Option<&str>,
        changes: &[CellChange],
    ) -> Result<(), StoreError> {
        if changes.is_empty() {
            return Ok(());
        }

        let _guard = self.append_lock.lock();
        let path = self.todays_path();
        let write_header = !path.exists();
        let member = encode_member(document, author, changes, write_header)?;

        let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
        file.write_all(&member)?;

        tracing::debug!(rows = changes.len(), path = %path.display(), "audit rows appended");
        Ok(())
    }
}

/// One self-contained gzip member holding the CSV rows (and the header on
/// first creation).
fn encode_member(
    document: &Path,
    author: Option<&str>,
    changes: &[CellChange],
    write_header: bool,
) -> Result<Vec<u8>, StoreError> {
    let mut writer =
        csv::Writer::from_writer(GzEncoder::new(Vec::new(), Compression::default()));

    if write_header {
        writer.write_record(HEADER)?;
    }
    let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
    for change in changes {
        writer.write_record([
            timestamp.clone(),
            document.display().to_string(),
            author.unwrap_or("").to_string(),
            change.worksheet.clone(),
            change.cell.label(),
            change.old_formula.clone().unwrap_or_default(),
            change
                .old_value
                .as_ref()
                .map(|v| v.coerced())
                .unwrap_or_default(),
            change.new_formula.clone().unwrap_or_default(),
            change
                .new_value
                .as_ref()
                .map(|v| v.coerced())
                .unwrap_or_default(),
        ])?;
    }
    writer.flush()?;
    let encoder = writer
        .into_inner()
        .map_err(|e| StoreError::Io(std::io::Error::other(e.to_string())))?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::MultiGzDecoder;
    use sheetwatch_common::{CellRef, CellScalar};
    use std::fs::File;
    use std::sync::Arc;

    fn change(cell: &str, old: &str, new: &str) -> CellChange {
        CellChange {
            worksheet: "Sheet1".to_string(),
            cell: cell.parse().unwrap(),
            old_formula: None,
            old_value: Some(CellScalar::Text(old.to_string())),
            new_formula: None,
            new_value: Some(CellScalar::Text(new.to_string())),
        }
    }

    fn read_rows(path: &Path) -> Vec<Vec<String>> {
        let reader = MultiGzDecoder::new(File::open(path).unwrap());
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(reader);
        csv_reader
            .records()
            .map(|r| r.unwrap().iter().map(str::to_string).collect())
            .collect()
    }

    #[test]
    fn header_is_written_exactly_once_across_appends() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path()).unwrap();
        let doc = Path::new("/watched/book.xlsx");

        log.append(doc, Some("alice"), &[change("A1", "hello", "world")])
            .unwrap();
        log.append(doc, Some("bob"), &[change("B2", "1", "2"), change("C3", "x", "y")])
            .unwrap();

        let rows = read_rows(&log.todays_path());
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], HEADER.map(str::to_string).to_vec());
        assert_eq!(rows[1][1], "/watched/book.xlsx");
        assert_eq!(rows[1][2], "alice");
        assert_eq!(rows[1][4], "A1");
        assert_eq!(rows[1][6], "hello");
        assert_eq!(rows[1][8], "world");
        assert_eq!(rows[3][2], "bob");
    }

    #[test]
    fn empty_change_list_touches_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path()).unwrap();
        log.append(Path::new("/watched/book.xlsx"), None, &[])
            .unwrap();
        assert!(!log.todays_path().exists());
    }

    #[test]
    fn log_files_rotate_by_date() {
        let dir = tempfile::tempdir().unwrap();
        let log = AuditLog::new(dir.path()).unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(
            log.path_for_date(date).file_name().unwrap(),
            "excel_change_log_20240307.csv.gz"
        );
    }

    #[test]
    fn concurrent_appends_from_distinct_documents_never_interleave() {
        let dir = tempfile::tempdir().unwrap();
        let log = Arc::new(AuditLog::new(dir.path()).unwrap());

        let workers: Vec<_> = (0..8)
            .map(|worker| {
                let log = Arc::clone(&log);
                std::thread::spawn(move || {
                    let doc = PathBuf::from(format!("/watched/book{worker}.xlsx"));
                    for round in 0..20 {
                        log.append(
                            &doc,
                            Some("alice"),
                            &[change("A1", "old", &format!("w{worker} r{round}"))],
                        )
                        .unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        // Every member decodes and every row parses: one header plus one
        // row per append, none of them torn.
        let rows = read_rows(&log.todays_path());
        assert_eq!(rows.len(), 1 + 8 * 20);
        assert_eq!(rows[0], HEADER.map(str::to_string).to_vec());
        assert!(rows[1..].iter().all(|row| row.len() == 9 && row[4] == "A1"));
        assert_eq!(
            rows[1..]
                .iter()
                .filter(|row| row[8] == "w3 r19")
                .count(),
            1
        );
    }
}
