//! Workbook fixtures for tests.
//!
//! Assembles minimal but well-formed `.xlsx` packages directly with the
//! `zip` crate, so tests control exactly which parts exist: sheets with
//! values and (array) formulas, external-link parts in both the direct-href
//! and relationship-indirected shapes, and core-properties authorship.

use sheetwatch_common::CellRef;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use zip::write::FileOptions;
use zip::ZipWriter;

#[derive(Debug, Clone)]
pub enum FixtureCell {
    Text(String),
    Number(f64),
    Bool(bool),
    /// Formula text without the leading `=`, the way sheet XML stores it.
    Formula(String),
    /// Anchor cell of an array formula covering `range` (e.g. `"B2:B4"`).
    ArrayFormula { text: String, range: String },
}

#[derive(Debug, Clone)]
enum ExternalLink {
    /// `externalBookPr href="..."` directly in the link part.
    Direct(String),
    /// `externalBook r:id="rId1"` resolved through the part's `.rels`.
    ViaRels(String),
}

#[derive(Debug, Clone, Default)]
pub struct WorkbookFixture {
    sheets: Vec<(String, BTreeMap<CellRef, FixtureCell>)>,
    links: BTreeMap<u32, ExternalLink>,
    author: Option<String>,
}

impl WorkbookFixture {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace one cell; the worksheet is created on first mention,
    /// in mention order.
    pub fn cell(mut self, sheet: &str, cell: &str, content: FixtureCell) -> Self {
        let cell: CellRef = cell.parse().expect("fixture cell label");
        if let Some((_, cells)) = self.sheets.iter_mut().find(|(name, _)| name.as_str() == sheet) {
            cells.insert(cell, content);
        } else {
            self.sheets
                .push((sheet.to_string(), BTreeMap::from([(cell, content)])));
        }
        self
    }

    pub fn text(self, sheet: &str, cell: &str, value: &str) -> Self {
        self.cell(sheet, cell, FixtureCell::Text(value.to_string()))
    }

    pub fn number(self, sheet: &str, cell: &str, value: f64) -> Self {
        self.cell(sheet, cell, FixtureCell::Number(value))
    }

    pub fn boolean(self, sheet: &str, cell: &str, value: bool) -> Self {
        self.cell(sheet, cell, FixtureCell::Bool(value))
    }

    pub fn formula(self, sheet: &str, cell: &str, text: &str) -> Self {
        self.cell(sheet, cell, FixtureCell::Formula(text.to_string()))
    }

    pub fn array_formula(self, sheet: &str, cell: &str, text: &str, range: &str) -> Self {
        self.cell(
            sheet,
            cell,
            FixtureCell::ArrayFormula {
                text: text.to_string(),
                range: range.to_string(),
            },
        )
    }

    pub fn external_link(mut self, index: u32, href: &str) -> Self {
        self.links.insert(index, ExternalLink::Direct(href.to_string()));
        self
    }

    pub fn external_link_via_rels(mut self, index: u32, target: &str) -> Self {
        self.links
            .insert(index, ExternalLink::ViaRels(target.to_string()));
        self
    }

    pub fn author(mut self, name: &str) -> Self {
        self.author = Some(name.to_string());
        self
    }

    pub fn write_to(&self, path: &Path) -> io::Result<()> {
        let file = File::create(path)?;
        let mut zip = ZipWriter::new(file);
        let options = FileOptions::default();

        let part = |zip: &mut ZipWriter<File>, name: &str, body: String| -> io::Result<()> {
            zip.start_file(name, options)
                .map_err(io::Error::other)?;
            zip.write_all(body.as_bytes())
        };

        part(&mut zip, "[Content_Types].xml", self.content_types())?;
        part(&mut zip, "_rels/.rels", self.root_rels())?;
        part(&mut zip, "xl/workbook.xml", self.workbook_xml())?;
        part(&mut zip, "xl/_rels/workbook.xml.rels", self.workbook_rels())?;
        for (i, (_, cells)) in self.sheets.iter().enumerate() {
            part(
                &mut zip,
                &format!("xl/worksheets/sheet{}.xml", i + 1),
                sheet_xml(cells),
            )?;
        }
        for (index, link) in &self.links {
            let (link_xml, rels) = external_link_parts(link);
            part(
                &mut zip,
                &format!("xl/externalLinks/externalLink{index}.xml"),
                link_xml,
            )?;
            if let Some(rels) = rels {
                part(
                    &mut zip,
                    &format!("xl/externalLinks/_rels/externalLink{index}.xml.rels"),
                    rels,
                )?;
            }
        }
        if let Some(author) = &self.author {
            part(&mut zip, "docProps/core.xml", core_xml(author))?;
        }

        zip.finish().map_err(io::Error::other)?;
        Ok(())
    }

    fn content_types(&self) -> String {
        let mut out = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
<Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
<Default Extension="xml" ContentType="application/xml"/>
<Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/>
"#,
        );
        for i in 1..=self.sheets.len() {
            let _ = writeln!(
                out,
                r#"<Override PartName="/xl/worksheets/sheet{i}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
            );
        }
        for index in self.links.keys() {
            let _ = writeln!(
                out,
                r#"<Override PartName="/xl/externalLinks/externalLink{index}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.externalLink+xml"/>"#
            );
        }
        if self.author.is_some() {
            out.push_str(
                r#"<Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>
"#,
            );
        }
        out.push_str("</Types>");
        out
    }

    fn root_rels(&self) -> String {
        let mut out = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/>
"#,
        );
        if self.author.is_some() {
            out.push_str(
                r#"<Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>
"#,
            );
        }
        out.push_str("</Relationships>");
        out
    }

    fn workbook_xml(&self) -> String {
        let mut out = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships">
<sheets>
"#,
        );
        for (i, (name, _)) in self.sheets.iter().enumerate() {
            let _ = writeln!(
                out,
                r#"<sheet name="{}" sheetId="{}" r:id="rId{}"/>"#,
                escape_xml(name),
                i + 1,
                i + 1
            );
        }
        out.push_str("</sheets>\n");
        if !self.links.is_empty() {
            out.push_str("<externalReferences>\n");
            for (pos, _) in self.links.keys().enumerate() {
                let _ = writeln!(
                    out,
                    r#"<externalReference r:id="rId{}"/>"#,
                    self.sheets.len() + pos + 1
                );
            }
            out.push_str("</externalReferences>\n");
        }
        out.push_str("</workbook>");
        out
    }

    fn workbook_rels(&self) -> String {
        let mut out = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
"#,
        );
        for i in 1..=self.sheets.len() {
            let _ = writeln!(
                out,
                r#"<Relationship Id="rId{i}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{i}.xml"/>"#
            );
        }
        for (pos, index) in self.links.keys().enumerate() {
            let _ = writeln!(
                out,
                r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/externalLink" Target="externalLinks/externalLink{index}.xml"/>"#,
                self.sheets.len() + pos + 1
            );
        }
        out.push_str("</Relationships>");
        out
    }
}

fn sheet_xml(cells: &BTreeMap<CellRef, FixtureCell>) -> String {
    let mut out = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main">
<sheetData>
"#,
    );
    let mut current_row = None;
    for (cell, content) in cells {
        if current_row != Some(cell.row) {
            if current_row.is_some() {
                out.push_str("</row>\n");
            }
            let _ = write!(out, r#"<row r="{}">"#, cell.row);
            current_row = Some(cell.row);
        }
        let label = cell.label();
        match content {
            FixtureCell::Text(s) => {
                let _ = write!(
                    out,
                    r#"<c r="{label}" t="inlineStr"><is><t>{}</t></is></c>"#,
                    escape_xml(s)
                );
            }
            FixtureCell::Number(n) => {
                let _ = write!(out, r#"<c r="{label}"><v>{n}</v></c>"#);
            }
            FixtureCell::Bool(b) => {
                let _ = write!(
                    out,
                    r#"<c r="{label}" t="b"><v>{}</v></c>"#,
                    if *b { 1 } else { 0 }
                );
            }
            FixtureCell::Formula(text) => {
                let _ = write!(
                    out,
                    r#"<c r="{label}"><f>{}</f><v>0</v></c>"#,
                    escape_xml(text)
                );
            }
            FixtureCell::ArrayFormula { text, range } => {
                let _ = write!(
                    out,
                    r#"<c r="{label}"><f t="array" ref="{range}">{}</f><v>0</v></c>"#,
                    escape_xml(text)
                );
            }
        }
    }
    if current_row.is_some() {
        out.push_str("</row>\n");
    }
    out.push_str("</sheetData>\n</worksheet>");
    out
}

fn external_link_parts(link: &ExternalLink) -> (String, Option<String>) {
    match link {
        ExternalLink::Direct(href) => (
            format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<externalLink xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><externalBookPr href="{}"/></externalLink>"#,
                escape_xml(href)
            ),
            None,
        ),
        ExternalLink::ViaRels(target) => (
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<externalLink xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><externalBook r:id="rId1"/></externalLink>"#
                .to_string(),
            Some(format!(
                r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
<Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/externalLinkPath" Target="{}" TargetMode="External"/>
</Relationships>"#,
                escape_xml(target)
            )),
        ),
    }
}

fn core_xml(author: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties"><cp:lastModifiedBy>{}</cp:lastModifiedBy></cp:coreProperties>"#,
        escape_xml(author)
    )
}

fn escape_xml(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
