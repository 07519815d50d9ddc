//! End-to-end checks of the snapshot → diff → audit → rotate pipeline
//! against real workbook packages.

use flate2::read::MultiGzDecoder;
use sheetwatch_common::{fingerprint, CellRef};
use sheetwatch_io::SnapshotEngine;
use sheetwatch_monitor::{ChangeCheck, CheckOutcome};
use sheetwatch_store::{AuditLog, BaselineStore};
use sheetwatch_testkit::WorkbookFixture;
use std::fs::File;
use std::path::Path;

fn pipeline(root: &Path, force_patterns: Vec<String>) -> ChangeCheck {
    ChangeCheck::new(
        SnapshotEngine::new(None),
        BaselineStore::new(root.join("baselines")).unwrap(),
        AuditLog::new(root.join("logs")).unwrap(),
        force_patterns,
    )
}

fn audit_rows(root: &Path) -> Vec<Vec<String>> {
    let log_dir = root.join("logs");
    let Ok(entries) = std::fs::read_dir(&log_dir) else {
        return Vec::new();
    };
    let mut rows = Vec::new();
    for entry in entries.flatten() {
        let reader = MultiGzDecoder::new(File::open(entry.path()).unwrap());
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .from_reader(reader);
        for record in csv_reader.records() {
            rows.push(record.unwrap().iter().map(str::to_string).collect());
        }
    }
    rows
}

#[test]
fn first_sight_builds_baseline_and_reports_content() {
    // S1: no baseline yet; one check produces a loadable baseline whose
    // hash is the fingerprint of its cells.
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("A.xlsx");
    WorkbookFixture::new()
        .text("Sheet1", "A1", "hello")
        .write_to(&doc)
        .unwrap();

    let check = pipeline(dir.path(), Vec::new());
    assert_eq!(check.run(&doc, false), CheckOutcome::Changed(1));

    let baseline = check.store().load("A.xlsx").unwrap().unwrap();
    assert_eq!(baseline.content_hash, fingerprint(&baseline.cells));
    assert_eq!(baseline.content_hash.len(), 64);
    let entry = &baseline.cells.sheet("Sheet1").unwrap()[&"A1".parse::<CellRef>().unwrap()];
    assert_eq!(entry.value.as_ref().unwrap().coerced(), "hello");
}

#[test]
fn value_edit_produces_one_change_one_audit_row_and_rotates() {
    // S2.
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("A.xlsx");
    WorkbookFixture::new()
        .text("Sheet1", "A1", "hello")
        .write_to(&doc)
        .unwrap();

    let check = pipeline(dir.path(), vec!["A.xlsx".to_string()]);
    // Force pattern keeps the initial baseline out of the audit trail.
    assert_eq!(check.run(&doc, false), CheckOutcome::Baselined);
    assert!(audit_rows(dir.path()).is_empty());
    let first_hash = check.store().load("A.xlsx").unwrap().unwrap().content_hash;

    WorkbookFixture::new()
        .text("Sheet1", "A1", "world")
        .write_to(&doc)
        .unwrap();
    assert_eq!(check.run(&doc, false), CheckOutcome::Changed(1));

    let rows = audit_rows(dir.path());
    assert_eq!(rows.len(), 2); // header + one change
    let row = &rows[1];
    assert_eq!(row[3], "Sheet1");
    assert_eq!(row[4], "A1");
    assert_eq!(row[6], "hello");
    assert_eq!(row[8], "world");

    let rotated = check.store().load("A.xlsx").unwrap().unwrap();
    assert_ne!(rotated.content_hash, first_hash);
    let entry = &rotated.cells.sheet("Sheet1").unwrap()[&"A1".parse::<CellRef>().unwrap()];
    assert_eq!(entry.value.as_ref().unwrap().coerced(), "world");
}

#[test]
fn identical_resave_of_array_formula_is_silent() {
    // S3: same stored array formula, reconstructed on every read, must
    // produce zero changes, zero audit rows, and an untouched baseline.
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("arrays.xlsx");
    let fixture = WorkbookFixture::new()
        .number("Sheet1", "A1", 1.0)
        .array_formula("Sheet1", "B2", "SUM(A1:A3)", "B2:B4");
    fixture.write_to(&doc).unwrap();

    let check = pipeline(dir.path(), vec!["arrays".to_string()]);
    assert_eq!(check.run(&doc, false), CheckOutcome::Baselined);
    let hash = check.store().load("arrays.xlsx").unwrap().unwrap().content_hash;

    fixture.write_to(&doc).unwrap(); // resave, byte-identical content
    assert_eq!(check.run(&doc, false), CheckOutcome::Unchanged);
    assert_eq!(check.run(&doc, true), CheckOutcome::Unchanged);

    assert!(audit_rows(dir.path()).is_empty());
    assert_eq!(
        check.store().load("arrays.xlsx").unwrap().unwrap().content_hash,
        hash
    );
}

#[test]
fn external_refs_are_annotated_in_reports_but_raw_in_baselines() {
    // S4.
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("linked.xlsx");
    WorkbookFixture::new()
        .formula("Sheet1", "C3", "[1]Data!A1")
        .external_link(1, "source.xlsx")
        .write_to(&doc)
        .unwrap();

    let check = pipeline(dir.path(), Vec::new());
    assert_eq!(check.run(&doc, false), CheckOutcome::Changed(1));

    let rows = audit_rows(dir.path());
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1][7], "=[external1: source.xlsx][1]Data!A1");

    let baseline = check.store().load("linked.xlsx").unwrap().unwrap();
    let entry = &baseline.cells.sheet("Sheet1").unwrap()[&"C3".parse::<CellRef>().unwrap()];
    assert_eq!(entry.formula.as_deref(), Some("=[1]Data!A1"));
}

#[test]
fn unreadable_document_is_a_read_error_status() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("garbage.xlsx");
    std::fs::write(&doc, b"not an archive").unwrap();

    let check = pipeline(dir.path(), Vec::new());
    assert_eq!(check.run(&doc, false), CheckOutcome::ReadError);
    assert!(audit_rows(dir.path()).is_empty());
}

#[test]
fn corrupt_baseline_is_treated_as_absent_and_rebuilt() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("B.xlsx");
    WorkbookFixture::new()
        .text("Sheet1", "A1", "fresh")
        .write_to(&doc)
        .unwrap();

    let check = pipeline(dir.path(), Vec::new());
    std::fs::write(
        check.store().path_for("B.xlsx"),
        b"definitely not gzip json",
    )
    .unwrap();

    assert_eq!(check.run(&doc, false), CheckOutcome::Changed(1));
    let rebuilt = check.store().load("B.xlsx").unwrap().unwrap();
    assert_eq!(rebuilt.content_hash, fingerprint(&rebuilt.cells));
}

#[test]
fn failed_save_leaves_baseline_untouched_and_retries() {
    let dir = tempfile::tempdir().unwrap();
    let doc = dir.path().join("C.xlsx");
    WorkbookFixture::new()
        .text("Sheet1", "A1", "v1")
        .write_to(&doc)
        .unwrap();

    let check = pipeline(dir.path(), Vec::new());
    // A directory squatting on the baseline path makes the rename fail.
    std::fs::create_dir_all(check.store().path_for("C.xlsx")).unwrap();
    assert_eq!(check.run(&doc, false), CheckOutcome::SaveError);

    // Unblock; the next event succeeds.
    std::fs::remove_dir(check.store().path_for("C.xlsx")).unwrap();
    assert_eq!(check.run(&doc, false), CheckOutcome::Changed(1));
}
