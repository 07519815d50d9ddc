//! Last-author metadata from the package's core properties.

use crate::package::XlsxPackage;
use quick_xml::events::Event;
use quick_xml::Reader;

const CORE_PART: &str = "docProps/core.xml";

/// The `cp:lastModifiedBy` field, when present and non-empty. Any failure
/// reads as "no author"; authorship is advisory metadata, never load-bearing.
pub fn read_last_author(pkg: &mut XlsxPackage) -> Option<String> {
    if !pkg.has_part(CORE_PART) {
        return None;
    }
    let bytes = pkg.part_bytes(CORE_PART).ok()?;
    let mut reader = Reader::from_reader(bytes.as_slice());
    let mut buf = Vec::new();
    let mut in_field = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                in_field = e.local_name().as_ref() == b"lastModifiedBy";
            }
            Ok(Event::Text(t)) if in_field => {
                let text = t.unescape().ok()?.trim().to_string();
                return (!text.is_empty()).then_some(text);
            }
            Ok(Event::End(_)) => in_field = false,
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::path::Path;
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
    fn extracts_last_modified_by() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        write_archive(
            &path,
            &[(
                CORE_PART,
                r#"<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties"><cp:lastModifiedBy>Jordan Li</cp:lastModifiedBy></cp:coreProperties>"#,
            )],
        );
        let mut pkg = XlsxPackage::open(&path).unwrap();
        assert_eq!(read_last_author(&mut pkg).as_deref(), Some("Jordan Li"));
    }

    #[test]
    fn missing_part_or_field_reads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        write_archive(&path, &[("xl/workbook.xml", "<workbook/>")]);
        let mut pkg = XlsxPackage::open(&path).unwrap();
        assert_eq!(read_last_author(&mut pkg), None);

        let path2 = dir.path().join("book2.xlsx");
        write_archive(&path2, &[(CORE_PART, "<cp:coreProperties/>")]);
        let mut pkg2 = XlsxPackage::open(&path2).unwrap();
        assert_eq!(read_last_author(&mut pkg2), None);
    }
}
