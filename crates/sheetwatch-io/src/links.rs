//! External-reference resolution.
//!
//! Cross-workbook formula tokens look like `[1]Data!A1`, where the integer
//! indexes `xl/externalLinks/externalLink1.xml` inside the package. Each
//! link part either carries the referenced path directly
//! (`externalBookPr/@href`) or points at it indirectly through
//! `externalBook/@r:id` and the part's relationship file; both shapes are
//! resolved here.

use crate::package::XlsxPackage;
use quick_xml::events::Event;
use quick_xml::Reader;
use sheetwatch_common::ExternalRefMap;

const LINK_PREFIX: &str = "xl/externalLinks/externalLink";

/// Build the `{ n → href }` map for a package. Unresolvable entries are
/// skipped rather than failing the snapshot; a missing mapping only means a
/// formula annotation passes through un-enriched.
pub fn read_external_refs(pkg: &mut XlsxPackage) -> ExternalRefMap {
    let mut refs = ExternalRefMap::new();
    for part in pkg.part_names_with_prefix(LINK_PREFIX) {
        if !part.ends_with(".xml") {
            continue;
        }
        let Some(index) = link_index(&part) else {
            continue;
        };
        let bytes = match pkg.part_bytes(&part) {
            Ok(bytes) => bytes,
            Err(err) => {
                tracing::debug!(part, %err, "skipping unreadable external link part");
                continue;
            }
        };
        let parsed = parse_link_part(&bytes);
        let href = match parsed {
            LinkTarget::Href(href) => Some(href),
            LinkTarget::RelId(rid) => resolve_rel_target(pkg, index, &rid),
            LinkTarget::None => None,
        };
        if let Some(href) = href {
            refs.insert(index, href);
        }
    }
    refs
}

/// Trailing integer of `xl/externalLinks/externalLink<n>.xml`.
fn link_index(part: &str) -> Option<u32> {
    part.strip_prefix(LINK_PREFIX)?
        .strip_suffix(".xml")?
        .parse()
        .ok()
}

enum LinkTarget {
    Href(String),
    RelId(String),
    None,
}

fn parse_link_part(bytes: &[u8]) -> LinkTarget {
    let mut reader = Reader::from_reader(bytes);
    let mut buf = Vec::new();
    let mut rel_id = None;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                // The direct href wins when both shapes are present.
                b"externalBookPr" => {
                    if let Some(href) = attr_value(&e, b"href") {
                        return LinkTarget::Href(href);
                    }
                }
                b"externalBook" => {
                    if rel_id.is_none() {
                        rel_id = attr_value(&e, b"id");
                    }
                }
                _ => {}
            },
            Ok(Event::Eof) | Err(_) => break,
            _ => {}
        }
        buf.clear();
    }
    match rel_id {
        Some(rid) => LinkTarget::RelId(rid),
        None => LinkTarget::None,
    }
}

/// Follow `externalLink<n>.xml.rels` to the relationship's `Target`.
fn resolve_rel_target(pkg: &mut XlsxPackage, index: u32, rid: &str) -> Option<String> {
    let rels_part = format!("xl/externalLinks/_rels/externalLink{index}.xml.rels");
    if !pkg.has_part(&rels_part) {
        return None;
    }
    let bytes = pkg.part_bytes(&rels_part).ok()?;
    let mut reader = Reader::from_reader(bytes.as_slice());
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) | Ok(Event::Empty(e)) => {
                if e.local_name().as_ref() == b"Relationship"
                    && attr_value(&e, b"Id").as_deref() == Some(rid)
                {
                    return attr_value(&e, b"Target");
                }
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}

fn attr_value(e: &quick_xml::events::BytesStart<'_>, local: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == local)
        .and_then(|attr| attr.unescape_value().ok())
        .map(|v| v.into_owned())
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
    fn reads_href_from_external_book_pr() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        write_archive(
            &path,
            &[(
                "xl/externalLinks/externalLink1.xml",
                r#"<externalLink><externalBookPr href="source.xlsx"/></externalLink>"#,
            )],
        );
        let mut pkg = XlsxPackage::open(&path).unwrap();
        let refs = read_external_refs(&mut pkg);
        assert_eq!(refs.get(&1).map(String::as_str), Some("source.xlsx"));
    }

    #[test]
    fn follows_relationship_indirection() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        write_archive(
            &path,
            &[
                (
                    "xl/externalLinks/externalLink2.xml",
                    r#"<externalLink xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><externalBook r:id="rId1"/></externalLink>"#,
                ),
                (
                    "xl/externalLinks/_rels/externalLink2.xml.rels",
                    r#"<Relationships><Relationship Id="rId1" Target="\\share\quarterly.xlsx" TargetMode="External"/></Relationships>"#,
                ),
            ],
        );
        let mut pkg = XlsxPackage::open(&path).unwrap();
        let refs = read_external_refs(&mut pkg);
        assert_eq!(
            refs.get(&2).map(String::as_str),
            Some(r"\\share\quarterly.xlsx")
        );
    }

    #[test]
    fn unresolvable_links_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.xlsx");
        write_archive(
            &path,
            &[
                (
                    "xl/externalLinks/externalLink1.xml",
                    // r:id with no rels part to resolve it
                    r#"<externalLink><externalBook r:id="rId9"/></externalLink>"#,
                ),
                (
                    "xl/externalLinks/externalLink3.xml",
                    r#"<externalLink><externalBookPr href="ok.xlsx"/></externalLink>"#,
                ),
            ],
        );
        let mut pkg = XlsxPackage::open(&path).unwrap();
        let refs = read_external_refs(&mut pkg);
        assert!(!refs.contains_key(&1));
        assert_eq!(refs.get(&3).map(String::as_str), Some("ok.xlsx"));
    }
}
