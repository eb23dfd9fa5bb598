// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Office Open XML containers: a ZIP of XML parts. Parts are read with
// roxmltree and written with quick-xml.

use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use seitenwerk_core::SeitenwerkError;
use thiserror::Error;
use zip::ZipArchive;
use zip::write::SimpleFileOptions;

pub const RELS_NS: &str = "http://schemas.openxmlformats.org/package/2006/relationships";
pub const CONTENT_TYPES_NS: &str = "http://schemas.openxmlformats.org/package/2006/content-types";
pub const OFFICE_DOC_REL: &str =
    "http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument";
pub const DOC_RELS_NS: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";

#[derive(Error, Debug)]
pub enum OoxmlError {
    #[error("failed to read ZIP archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("failed to read part: {0}")]
    Io(#[from] std::io::Error),

    #[error("XML write error: {0}")]
    XmlWrite(#[from] quick_xml::Error),

    #[error("XML parse error in {part}: {message}")]
    XmlParse { part: String, message: String },

    #[error("missing part: {0}")]
    MissingPart(String),
}

impl From<OoxmlError> for SeitenwerkError {
    fn from(err: OoxmlError) -> Self {
        SeitenwerkError::Conversion(err.to_string())
    }
}

pub type OoxmlResult<T> = std::result::Result<T, OoxmlError>;

/// Every file of an OOXML package, held in memory.
#[derive(Debug, Clone)]
pub struct Package {
    parts: BTreeMap<String, Vec<u8>>,
}

impl Package {
    pub fn from_bytes(data: &[u8]) -> OoxmlResult<Self> {
        let mut archive = ZipArchive::new(Cursor::new(data))?;
        let mut parts = BTreeMap::new();
        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_file() {
                let name = file.name().to_string();
                let mut content = Vec::new();
                file.read_to_end(&mut content)?;
                parts.insert(name, content);
            }
        }
        Ok(Self { parts })
    }

    pub fn has(&self, name: &str) -> bool {
        self.parts.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.parts.keys().map(String::as_str)
    }

    /// A part as UTF-8 text.
    pub fn text(&self, name: &str) -> OoxmlResult<&str> {
        let bytes = self
            .parts
            .get(name)
            .ok_or_else(|| OoxmlError::MissingPart(name.to_string()))?;
        std::str::from_utf8(bytes).map_err(|err| OoxmlError::XmlParse {
            part: name.to_string(),
            message: err.to_string(),
        })
    }

    /// Relationship id to target, from a `.rels` part. Missing parts yield an
    /// empty map.
    pub fn rels(&self, rels_part: &str) -> OoxmlResult<BTreeMap<String, String>> {
        if !self.has(rels_part) {
            return Ok(BTreeMap::new());
        }
        let xml = self.text(rels_part)?;
        let doc = parse(rels_part, xml)?;
        Ok(doc
            .descendants()
            .filter(|node| is(node, "Relationship"))
            .filter_map(|node| Some((node.attribute("Id")?.to_string(), node.attribute("Target")?.to_string())))
            .collect())
    }
}

pub fn parse<'a>(part: &str, xml: &'a str) -> OoxmlResult<roxmltree::Document<'a>> {
    roxmltree::Document::parse(xml).map_err(|err| OoxmlError::XmlParse {
        part: part.to_string(),
        message: err.to_string(),
    })
}

/// Local-name match, ignoring the namespace prefix.
pub fn is(node: &roxmltree::Node<'_, '_>, local: &str) -> bool {
    node.is_element() && node.tag_name().name() == local
}

pub fn child<'a, 'input>(node: &roxmltree::Node<'a, 'input>, local: &str) -> Option<roxmltree::Node<'a, 'input>> {
    node.children().find(|c| is(c, local))
}

/// An attribute by local name, whatever its namespace.
pub fn attr<'a>(node: &roxmltree::Node<'a, '_>, local: &str) -> Option<&'a str> {
    node.attributes().find(|a| a.name() == local).map(|a| a.value())
}

/// Concatenated text of every descendant element named `local`.
pub fn text_of(node: &roxmltree::Node<'_, '_>, local: &str) -> String {
    node.descendants()
        .filter(|n| is(n, local))
        .filter_map(|n| n.text())
        .collect()
}

/// Resolve a relationship target relative to the directory of `base_part`.
pub fn resolve_target(base_part: &str, target: &str) -> String {
    if let Some(absolute) = target.strip_prefix('/') {
        return absolute.to_string();
    }
    let mut segments: Vec<&str> = base_part.rsplit_once('/').map(|(dir, _)| dir.split('/').collect()).unwrap_or_default();
    for segment in target.split('/') {
        match segment {
            ".." => {
                segments.pop();
            }
            "." | "" => {}
            other => segments.push(other),
        }
    }
    segments.join("/")
}

// -- Writing ------------------------------------------------------------------

/// Streaming XML part builder.
pub struct XmlPart {
    writer: Writer<Cursor<Vec<u8>>>,
}

impl XmlPart {
    pub fn new() -> OoxmlResult<Self> {
        let mut writer = Writer::new(Cursor::new(Vec::new()));
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), Some("yes"))))?;
        Ok(Self { writer })
    }

    pub fn open(&mut self, name: &str, attributes: &[(&str, &str)]) -> OoxmlResult<&mut Self> {
        let element = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.writer.write_event(Event::Start(element))?;
        Ok(self)
    }

    pub fn close(&mut self, name: &str) -> OoxmlResult<&mut Self> {
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(self)
    }

    pub fn empty(&mut self, name: &str, attributes: &[(&str, &str)]) -> OoxmlResult<&mut Self> {
        let element = BytesStart::new(name).with_attributes(attributes.iter().copied());
        self.writer.write_event(Event::Empty(element))?;
        Ok(self)
    }

    /// `<name attrs>text</name>` with the text escaped.
    pub fn leaf(&mut self, name: &str, attributes: &[(&str, &str)], text: &str) -> OoxmlResult<&mut Self> {
        self.open(name, attributes)?;
        self.writer.write_event(Event::Text(BytesText::new(text)))?;
        self.close(name)
    }

    pub fn finish(self) -> Vec<u8> {
        self.writer.into_inner().into_inner()
    }
}

/// `[Content_Types].xml` with the two standard defaults plus `overrides`
/// (part name, content type).
pub fn content_types(overrides: &[(String, &str)]) -> OoxmlResult<Vec<u8>> {
    let mut xml = XmlPart::new()?;
    xml.open("Types", &[("xmlns", CONTENT_TYPES_NS)])?;
    xml.empty(
        "Default",
        &[
            ("Extension", "rels"),
            ("ContentType", "application/vnd.openxmlformats-package.relationships+xml"),
        ],
    )?;
    xml.empty("Default", &[("Extension", "xml"), ("ContentType", "application/xml")])?;
    for (part, content_type) in overrides {
        xml.empty("Override", &[("PartName", part.as_str()), ("ContentType", *content_type)])?;
    }
    xml.close("Types")?;
    Ok(xml.finish())
}

/// A `.rels` part from `(id, type, target)` triples.
pub fn relationships(entries: &[(String, &str, String)]) -> OoxmlResult<Vec<u8>> {
    let mut xml = XmlPart::new()?;
    xml.open("Relationships", &[("xmlns", RELS_NS)])?;
    for (id, kind, target) in entries {
        xml.empty(
            "Relationship",
            &[("Id", id.as_str()), ("Type", *kind), ("Target", target.as_str())],
        )?;
    }
    xml.close("Relationships")?;
    Ok(xml.finish())
}

/// Collects parts and zips them, `[Content_Types].xml` first.
#[derive(Default)]
pub struct PackageWriter {
    parts: Vec<(String, Vec<u8>)>,
}

impl PackageWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.parts.push((name.into(), bytes));
    }

    pub fn finish(mut self) -> OoxmlResult<Vec<u8>> {
        self.parts.sort_by_key(|(name, _)| name != "[Content_Types].xml");
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (name, bytes) in &self.parts {
            zip.start_file(name.as_str(), options)?;
            zip.write_all(bytes)?;
        }
        Ok(zip.finish()?.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn written_package_reads_back() {
        let mut part = XmlPart::new().unwrap();
        part.open("root", &[("xmlns:x", "urn:test")]).unwrap();
        part.leaf("x:item", &[("x:kind", "a")], "fish & chips <3").unwrap();
        part.close("root").unwrap();

        let mut writer = PackageWriter::new();
        writer.add("dir/part.xml", part.finish());
        writer.add("[Content_Types].xml", content_types(&[("/dir/part.xml".to_string(), "application/xml")]).unwrap());
        let package = Package::from_bytes(&writer.finish().unwrap()).unwrap();

        assert_eq!(package.names().next(), Some("[Content_Types].xml"));
        let xml = package.text("dir/part.xml").unwrap();
        let doc = parse("dir/part.xml", xml).unwrap();
        let item = doc.descendants().find(|n| is(n, "item")).unwrap();
        assert_eq!(item.text(), Some("fish & chips <3"));
        assert_eq!(attr(&item, "kind"), Some("a"));
        assert!(matches!(package.text("missing.xml"), Err(OoxmlError::MissingPart(_))));
    }

    #[test]
    fn relationship_targets_resolve_relative_to_the_part() {
        assert_eq!(resolve_target("xl/workbook.xml", "worksheets/sheet1.xml"), "xl/worksheets/sheet1.xml");
        assert_eq!(resolve_target("ppt/slides/slide1.xml", "../slideLayouts/slideLayout1.xml"), "ppt/slideLayouts/slideLayout1.xml");
        assert_eq!(resolve_target("xl/workbook.xml", "/xl/sharedStrings.xml"), "xl/sharedStrings.xml");
    }

    #[test]
    fn garbage_is_not_a_package() {
        assert!(matches!(Package::from_bytes(b"plain text"), Err(OoxmlError::Zip(_))));
    }
}
