//! Raw access to the parts of a packaged workbook.
//!
//! An `.xlsx`/`.xlsm` document is a deflate archive of XML parts. This is
//! the only module that touches the archive container; everything above it
//! works with part names and bytes.

use crate::SnapshotError;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use zip::ZipArchive;

pub struct XlsxPackage {
    path: PathBuf,
    archive: ZipArchive<BufReader<File>>,
    part_names: Vec<String>,
}

impl XlsxPackage {
    pub fn open(path: &Path) -> Result<Self, SnapshotError> {
        let file = File::open(path).map_err(|e| SnapshotError::archive(path, e))?;
        let archive =
            ZipArchive::new(BufReader::new(file)).map_err(|e| SnapshotError::archive(path, e))?;
        let part_names = archive.file_names().map(str::to_string).collect();
        Ok(Self {
            path: path.to_path_buf(),
            archive,
            part_names,
        })
    }

    /// Read one named part in full. Absent or unreadable parts surface as
    /// archive errors; callers that treat a part as optional check
    /// [`has_part`](Self::has_part) first.
    pub fn part_bytes(&mut self, name: &str) -> Result<Vec<u8>, SnapshotError> {
        let mut entry = self
            .archive
            .by_name(name)
            .map_err(|e| SnapshotError::archive(&self.path, format!("part '{name}': {e}")))?;
        let mut buf = Vec::with_capacity(entry.size() as usize);
        entry
            .read_to_end(&mut buf)
            .map_err(|e| SnapshotError::archive(&self.path, format!("part '{name}': {e}")))?;
        Ok(buf)
    }

    pub fn has_part(&self, name: &str) -> bool {
        self.part_names.iter().any(|n| n == name)
    }

    /// Part names starting with `prefix`, in archive order.
    pub fn part_names_with_prefix(&self, prefix: &str) -> Vec<String> {
        self.part_names
            .iter()
            .filter(|n| n.starts_with(prefix))
            .cloned()
            .collect()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::FileOptions;

    fn write_archive(path: &Path, parts: &[(&str, &str)]) {
        let file = File::create(path).unwrap();
        let mut writer = zip::ZipWriter::new(file);
        for (name, body) in parts {
            writer.start_file(*name, FileOptions::default()).unwrap();
            writer.write_all(body.as_bytes()).unwrap();
        }
        writer.finish().unwrap();
    }

    #[test]
    fn reads_named_parts_and_lists_prefixes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        write_archive(
            &path,
            &[
                ("xl/workbook.xml", "<workbook/>"),
                ("xl/externalLinks/externalLink1.xml", "<externalLink/>"),
                ("xl/externalLinks/externalLink2.xml", "<externalLink/>"),
            ],
        );

        let mut pkg = XlsxPackage::open(&path).unwrap();
        assert_eq!(pkg.part_bytes("xl/workbook.xml").unwrap(), b"<workbook/>");
        assert!(pkg.has_part("xl/externalLinks/externalLink1.xml"));
        assert!(!pkg.has_part("xl/missing.xml"));
        assert_eq!(
            pkg.part_names_with_prefix("xl/externalLinks/").len(),
            2
        );
        assert!(pkg.part_bytes("xl/missing.xml").is_err());
    }

    #[test]
    fn refuses_non_archives() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-a-zip.xlsx");
        std::fs::write(&path, "plain text").unwrap();
        assert!(matches!(
            XlsxPackage::open(&path),
            Err(SnapshotError::Archive { .. })
        ));
    }
}
