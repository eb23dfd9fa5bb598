// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF <-> DOCX (WordprocessingML).

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use seitenwerk_core::error::Result;
use tracing::{debug, warn};

use super::fonts::FontFamily;
use super::ooxml::{
    self, DOC_RELS_NS, OFFICE_DOC_REL, OoxmlResult, Package, PackageWriter, XmlPart, attr, child, is,
};
use super::NO_TEXT_PLACEHOLDER;
use crate::classify::is_scanned;
use crate::ocr::ocr_pages;
use crate::ops::OpContext;
use crate::pdf::writer::{Align, LayoutWriter, StyledLine, plain_text_pdf};
use crate::pdf::{Document, TextLine};

const W_NS: &str = "http://schemas.openxmlformats.org/wordprocessingml/2006/main";
const DOCUMENT_PART: &str = "word/document.xml";
const DOCUMENT_TYPE: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml";
const STYLES_TYPE: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.styles+xml";
const STYLES_REL: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles";

const NO_CONTENT_NOTICE: [&str; 5] = [
    "No extractable text content found in this PDF document.",
    "This may be due to:",
    "\u{2022} The PDF contains only images",
    "\u{2022} The text is embedded as images",
    "\u{2022} The PDF uses unsupported text encoding",
];

static NUMBERED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.").expect("static pattern"));
static CHAPTER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\d+\.|\bchapter\b|\bsection\b").expect("static pattern"));

fn is_upper(text: &str) -> bool {
    text.chars().any(char::is_alphabetic) && !text.chars().any(char::is_lowercase)
}

/// Short upper-case, numbered, "Chapter" or "Section" lines read as headings.
pub fn looks_like_heading(text: &str) -> bool {
    text.chars().count() < 100 && (is_upper(text) || CHAPTER.is_match(text))
}

// -- Model --------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct Run {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
    /// Points.
    pub size: Option<f32>,
    pub font: Option<String>,
}

impl Run {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
            italic: false,
            size: None,
            font: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Paragraph {
    pub runs: Vec<Run>,
    /// 1 or 2 for headings.
    pub heading: Option<u8>,
    pub align: Align,
    pub page_break_before: bool,
}

impl Paragraph {
    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }

    fn heading(text: impl Into<String>, level: u8) -> Self {
        Self {
            runs: vec![Run::plain(text)],
            heading: Some(level),
            align: Align::Left,
            page_break_before: false,
        }
    }

    fn body(runs: Vec<Run>, align: Align) -> Self {
        Self {
            runs,
            heading: None,
            align,
            page_break_before: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Paragraph(Paragraph),
    Table(Vec<Vec<String>>),
}

// -- Writing ------------------------------------------------------------------

fn write_run(xml: &mut XmlPart, run: &Run) -> OoxmlResult<()> {
    xml.open("w:r", &[])?;
    let has_props = run.bold || run.italic || run.size.is_some() || run.font.is_some();
    if has_props {
        xml.open("w:rPr", &[])?;
        if let Some(font) = &run.font {
            xml.empty("w:rFonts", &[("w:ascii", font.as_str()), ("w:hAnsi", font.as_str()), ("w:cs", font.as_str())])?;
        }
        if run.bold {
            xml.empty("w:b", &[])?;
        }
        if run.italic {
            xml.empty("w:i", &[])?;
        }
        if let Some(size) = run.size {
            let half_points = ((size * 2.0).round() as i64).to_string();
            xml.empty("w:sz", &[("w:val", &half_points)])?;
        }
        xml.close("w:rPr")?;
    }
    xml.leaf("w:t", &[("xml:space", "preserve")], &run.text)?;
    xml.close("w:r")?;
    Ok(())
}

fn write_paragraph(xml: &mut XmlPart, paragraph: &Paragraph) -> OoxmlResult<()> {
    if paragraph.page_break_before {
        xml.open("w:p", &[])?.open("w:r", &[])?;
        xml.empty("w:br", &[("w:type", "page")])?;
        xml.close("w:r")?.close("w:p")?;
    }
    xml.open("w:p", &[])?;
    let jc = match paragraph.align {
        Align::Left => None,
        Align::Center => Some("center"),
        Align::Right => Some("right"),
    };
    if paragraph.heading.is_some() || jc.is_some() {
        xml.open("w:pPr", &[])?;
        if let Some(level) = paragraph.heading {
            let style = format!("Heading{level}");
            xml.empty("w:pStyle", &[("w:val", &style)])?;
        }
        if let Some(jc) = jc {
            xml.empty("w:jc", &[("w:val", jc)])?;
        }
        xml.close("w:pPr")?;
    }
    for run in &paragraph.runs {
        write_run(xml, run)?;
    }
    xml.close("w:p")?;
    Ok(())
}

fn styles_part() -> OoxmlResult<Vec<u8>> {
    let mut xml = XmlPart::new()?;
    xml.open("w:styles", &[("xmlns:w", W_NS)])?;
    xml.open("w:style", &[("w:type", "paragraph"), ("w:default", "1"), ("w:styleId", "Normal")])?;
    xml.empty("w:name", &[("w:val", "Normal")])?;
    xml.open("w:rPr", &[])?;
    xml.empty("w:rFonts", &[("w:ascii", "Times New Roman"), ("w:hAnsi", "Times New Roman")])?;
    xml.empty("w:sz", &[("w:val", "22")])?;
    xml.close("w:rPr")?;
    xml.close("w:style")?;
    for (id, name, half_points) in [("Heading1", "heading 1", "32"), ("Heading2", "heading 2", "28")] {
        xml.open("w:style", &[("w:type", "paragraph"), ("w:styleId", id)])?;
        xml.empty("w:name", &[("w:val", name)])?;
        xml.empty("w:basedOn", &[("w:val", "Normal")])?;
        xml.open("w:pPr", &[])?;
        xml.empty("w:spacing", &[("w:before", "240"), ("w:after", "120")])?;
        xml.close("w:pPr")?;
        xml.open("w:rPr", &[])?;
        xml.empty("w:rFonts", &[("w:ascii", "Arial"), ("w:hAnsi", "Arial")])?;
        xml.empty("w:b", &[])?;
        xml.empty("w:sz", &[("w:val", half_points)])?;
        xml.close("w:rPr")?;
        xml.close("w:style")?;
    }
    xml.close("w:styles")?;
    Ok(xml.finish())
}

/// Serialize paragraphs into a DOCX package.
pub fn write_docx(paragraphs: &[Paragraph]) -> OoxmlResult<Vec<u8>> {
    let mut body = XmlPart::new()?;
    body.open("w:document", &[("xmlns:w", W_NS), ("xmlns:r", DOC_RELS_NS)])?;
    body.open("w:body", &[])?;
    for paragraph in paragraphs {
        write_paragraph(&mut body, paragraph)?;
    }
    body.open("w:sectPr", &[])?;
    body.empty("w:pgSz", &[("w:w", "12240"), ("w:h", "15840")])?;
    body.empty(
        "w:pgMar",
        &[("w:top", "1440"), ("w:right", "1440"), ("w:bottom", "1440"), ("w:left", "1440")],
    )?;
    body.close("w:sectPr")?;
    body.close("w:body")?.close("w:document")?;

    let mut package = PackageWriter::new();
    package.add(
        "[Content_Types].xml",
        ooxml::content_types(&[
            (format!("/{DOCUMENT_PART}"), DOCUMENT_TYPE),
            ("/word/styles.xml".to_string(), STYLES_TYPE),
        ])?,
    );
    package.add(
        "_rels/.rels",
        ooxml::relationships(&[("rId1".to_string(), OFFICE_DOC_REL, DOCUMENT_PART.to_string())])?,
    );
    package.add(
        "word/_rels/document.xml.rels",
        ooxml::relationships(&[("rId1".to_string(), STYLES_REL, "styles.xml".to_string())])?,
    );
    package.add(DOCUMENT_PART, body.finish());
    package.add("word/styles.xml", styles_part()?);
    package.finish()
}

// -- Reading ------------------------------------------------------------------

fn flag(props: Option<roxmltree::Node<'_, '_>>, local: &str) -> bool {
    props
        .and_then(|props| child(&props, local))
        .map(|node| !matches!(attr(&node, "val"), Some("0" | "false" | "off")))
        .unwrap_or(false)
}

fn read_paragraph(node: &roxmltree::Node<'_, '_>) -> Paragraph {
    let props = child(node, "pPr");
    let align = match props.and_then(|p| child(&p, "jc")).and_then(|jc| attr(&jc, "val")) {
        Some("center") => Align::Center,
        Some("right" | "end") => Align::Right,
        _ => Align::Left,
    };
    let heading = props
        .and_then(|p| child(&p, "pStyle"))
        .and_then(|style| attr(&style, "val"))
        .and_then(|style| {
            let lower = style.to_ascii_lowercase();
            if lower == "title" || lower.ends_with("heading1") {
                Some(1)
            } else if lower.starts_with("heading") {
                Some(2)
            } else {
                None
            }
        });
    let runs = node
        .descendants()
        .filter(|n| is(n, "r"))
        .map(|run| {
            let props = child(&run, "rPr");
            let text: String = run
                .children()
                .filter_map(|c| match c.tag_name().name() {
                    "t" if c.is_element() => c.text().map(str::to_string),
                    "tab" if c.is_element() => Some("\t".to_string()),
                    _ => None,
                })
                .collect();
            Run {
                text,
                bold: flag(props, "b"),
                italic: flag(props, "i"),
                size: props
                    .and_then(|p| child(&p, "sz"))
                    .and_then(|sz| attr(&sz, "val"))
                    .and_then(|val| val.parse::<f32>().ok())
                    .map(|half| half / 2.0),
                font: props
                    .and_then(|p| child(&p, "rFonts"))
                    .and_then(|fonts| attr(&fonts, "ascii").or_else(|| attr(&fonts, "hAnsi")))
                    .map(str::to_string),
            }
        })
        .collect();
    Paragraph {
        runs,
        heading,
        align,
        page_break_before: false,
    }
}

/// Body paragraphs and tables in document order.
pub fn read_docx(package: &Package) -> OoxmlResult<Vec<Block>> {
    let xml = package.text(DOCUMENT_PART)?;
    let doc = ooxml::parse(DOCUMENT_PART, xml)?;
    let Some(body) = doc.descendants().find(|n| is(n, "body")) else {
        return Ok(Vec::new());
    };
    let mut blocks = Vec::new();
    for node in body.children() {
        if is(&node, "p") {
            blocks.push(Block::Paragraph(read_paragraph(&node)));
        } else if is(&node, "tbl") {
            let rows = node
                .children()
                .filter(|n| is(n, "tr"))
                .map(|row| {
                    row.children()
                        .filter(|n| is(n, "tc"))
                        .map(|cell| ooxml::text_of(&cell, "t").trim().to_string())
                        .collect()
                })
                .collect();
            blocks.push(Block::Table(rows));
        }
    }
    Ok(blocks)
}

// -- PDF -> DOCX --------------------------------------------------------------

fn line_paragraph(line: &TextLine) -> Paragraph {
    let text = line.text();
    let chars = text.chars().count();
    let size = line.average_size();
    let bold = line.any_bold();
    let heading = (size > 13.0)
        || (bold && chars < 100)
        || (size > 12.0 && chars < 150)
        || (is_upper(&text) && chars < 200);
    if heading {
        return Paragraph::heading(text, if size > 14.0 { 1 } else { 2 });
    }
    let family = FontFamily::from_name(line.dominant_font());
    let run = Run {
        text,
        bold,
        italic: line.any_italic(),
        size: Some(size.round().clamp(8.0, 24.0)),
        font: Some(family.word_name().to_string()),
    };
    let x = line.x();
    let align = if x > 200.0 {
        Align::Right
    } else if x > 100.0 {
        Align::Center
    } else {
        Align::Left
    };
    Paragraph::body(vec![run], align)
}

fn text_paragraphs(text: &str) -> Vec<Paragraph> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|para| !para.is_empty())
        .map(|para| {
            if is_upper(para) && para.chars().count() < 100 {
                Paragraph::heading(para, 2)
            } else {
                Paragraph::body(vec![Run::plain(para)], Align::Left)
            }
        })
        .collect()
}

/// Styled conversion: fonts, sizes, alignment and headings from the text
/// layer, OCR for scanned or nearly empty pages.
pub fn pdf_to_docx_rich(ctx: &OpContext<'_>, document: &Document) -> Result<Vec<u8>> {
    let verdict = is_scanned(document, ctx.config);
    let ocr_targets: Vec<u32> = document
        .pages()
        .iter()
        .filter(|page| verdict.scanned || page.text_chars < ctx.config.docx_ocr_min_chars)
        .map(|page| page.number)
        .collect();
    let zoom = if verdict.scanned { 4.0 } else { 2.0 };
    let ocr = ocr_pages(ctx, document, &ocr_targets, zoom, ctx.config.ocr_confidence_structured);

    let mut paragraphs = Vec::new();
    let mut content = 0usize;
    for page in document.pages() {
        let mut header = Paragraph::heading(format!("Page {}", page.number), 1);
        header.page_break_before = page.number > 1;
        paragraphs.push(header);

        let page_paragraphs: Vec<Paragraph> = match ocr.get(&page.number) {
            Some(Ok(regions)) if !regions.is_empty() => regions
                .iter()
                .map(|region| {
                    let text = region.text.trim();
                    if looks_like_heading(text) {
                        Paragraph::heading(text, 2)
                    } else {
                        Paragraph::body(vec![Run::plain(text)], Align::Left)
                    }
                })
                .collect(),
            Some(Err(reason)) => {
                debug!(page = page.number, %reason, "Using plain text after OCR failure");
                let fallback = text_paragraphs(page.text());
                if fallback.is_empty() {
                    vec![Paragraph::body(vec![Run::plain(NO_TEXT_PLACEHOLDER)], Align::Left)]
                } else {
                    fallback
                }
            }
            _ => document
                .page_lines(page)?
                .iter()
                .filter(|line| !line.text().trim().is_empty())
                .map(line_paragraph)
                .collect(),
        };
        content += page_paragraphs.iter().filter(|p| !p.text().trim().is_empty()).count();
        paragraphs.extend(page_paragraphs);
    }
    if content == 0 {
        warn!("No text content found; adding notice");
        paragraphs.extend(
            NO_CONTENT_NOTICE
                .iter()
                .map(|line| Paragraph::body(vec![Run::plain(*line)], Align::Left)),
        );
    }
    Ok(write_docx(&paragraphs)?)
}

/// One heading per page and one paragraph per text line.
pub fn pdf_to_docx_simple(document: &Document) -> Result<Vec<u8>> {
    let mut paragraphs = Vec::new();
    let mut found = false;
    for page in document.pages() {
        paragraphs.push(Paragraph::heading(format!("Page {}", page.number), 1));
        let lines: Vec<&str> = page.text().lines().map(str::trim).filter(|l| !l.is_empty()).collect();
        if lines.is_empty() {
            paragraphs.push(Paragraph::body(
                vec![Run::plain("[This page contains no extractable text or contains images only]")],
                Align::Left,
            ));
            continue;
        }
        found = true;
        paragraphs.extend(lines.into_iter().map(|line| Paragraph::body(vec![Run::plain(line)], Align::Left)));
    }
    if !found {
        paragraphs.push(Paragraph::body(
            vec![Run::plain("No text content could be extracted from this PDF.")],
            Align::Left,
        ));
    }
    Ok(write_docx(&paragraphs)?)
}

// -- DOCX -> PDF --------------------------------------------------------------

fn styled(paragraph: &Paragraph) -> StyledLine {
    let text = paragraph.text().trim().to_string();
    let chars = text.chars().count();
    if let Some(level) = paragraph.heading {
        let size = if level == 1 { 18.0 } else { 14.0 };
        return StyledLine::new(text, FontFamily::Serif, size)
            .bold()
            .aligned(paragraph.align)
            .spaced(10.0);
    }
    match paragraph.runs.iter().find(|run| !run.text.trim().is_empty()) {
        Some(run) if run.bold || run.italic || run.size.is_some() || run.font.is_some() => {
            let family = run.font.as_deref().map(FontFamily::from_name).unwrap_or_default();
            let size = run.size.unwrap_or(11.0).clamp(8.0, 24.0).trunc();
            let mut line = StyledLine::new(text, family, size).italic(run.italic).aligned(paragraph.align);
            if run.bold {
                line = line.bold();
            }
            line.spaced(6.0)
        }
        _ if chars < 100 && is_upper(&text) => StyledLine::new(text, FontFamily::Serif, 18.0)
            .bold()
            .aligned(Align::Center)
            .spaced(12.0),
        _ if chars < 150 && (text.starts_with("Chapter") || text.starts_with("Section") || NUMBERED.is_match(&text)) => {
            StyledLine::new(text, FontFamily::Serif, 14.0).bold().spaced(10.0)
        }
        _ if chars < 50 => StyledLine::new(text, FontFamily::Serif, 9.0).aligned(paragraph.align).spaced(4.0),
        _ => StyledLine::new(text, FontFamily::Serif, 11.0).aligned(paragraph.align).spaced(6.0),
    }
}

pub fn docx_to_pdf_rich(package: &Package) -> Result<Vec<u8>> {
    let blocks = read_docx(package)?;
    let mut writer = LayoutWriter::portrait("Converted document");
    for block in &blocks {
        match block {
            Block::Paragraph(paragraph) if paragraph.text().trim().is_empty() => {
                writer.push(StyledLine::new("", FontFamily::Serif, 6.0));
            }
            Block::Paragraph(paragraph) => writer.push(styled(paragraph)),
            Block::Table(rows) => {
                for row in rows {
                    let text = row.join(" | ");
                    if !text.trim().is_empty() {
                        writer.push(StyledLine::new(text, FontFamily::Serif, 11.0).spaced(2.0));
                    }
                }
            }
        }
    }
    debug!(blocks = blocks.len(), "DOCX laid out");
    writer.finish()
}

pub fn docx_to_pdf_simple(package: &Package) -> Result<Vec<u8>> {
    let xml = package.text(DOCUMENT_PART)?;
    let doc = ooxml::parse(DOCUMENT_PART, xml)?;
    let text: Vec<String> = doc
        .descendants()
        .filter(|n| is(n, "p"))
        .map(|p| ooxml::text_of(&p, "t"))
        .collect();
    plain_text_pdf("Converted document", &text.join("\n"), FontFamily::Serif, 11.0)
}

/// Paragraph texts of a DOCX, for inspection.
pub fn paragraph_texts(package: &Package) -> OoxmlResult<BTreeMap<usize, String>> {
    Ok(read_docx(package)?
        .into_iter()
        .filter_map(|block| match block {
            Block::Paragraph(p) => Some(p.text()),
            Block::Table(_) => None,
        })
        .enumerate()
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, PageSpec};
    use crate::ocr::NoOcr;
    use crate::ocr::testing::ScriptedOcr;
    use crate::ops::testing::default_backends;
    use seitenwerk_core::PipelineConfig;

    fn texts(bytes: &[u8]) -> Vec<String> {
        let package = Package::from_bytes(bytes).unwrap();
        paragraph_texts(&package).unwrap().into_values().collect()
    }

    #[test]
    fn heading_detection() {
        assert!(looks_like_heading("INTRODUCTION"));
        assert!(looks_like_heading("3. Results"));
        assert!(looks_like_heading("The chapter ends"));
        assert!(!looks_like_heading("an ordinary sentence"));
    }

    #[test]
    fn rich_conversion_keeps_lines_and_page_headings() {
        let source = fixtures::text_pdf(&[&fixtures::prose(120, 'a'), &fixtures::prose(120, 'b')]);
        let document = Document::from_bytes(&source).unwrap();
        let config = PipelineConfig::default();
        let (renderers, workspace) = default_backends();
        let ocr = ScriptedOcr::returning(&[("unused", 0.9)]);
        let ctx = OpContext::new(&config, &renderers, &ocr, &workspace);

        let bytes = pdf_to_docx_rich(&ctx, &document).unwrap();
        let paragraphs = texts(&bytes);
        assert_eq!(paragraphs[0], "Page 1");
        assert!(paragraphs.contains(&"Page 2".to_string()));
        assert!(paragraphs.iter().any(|p| p.starts_with("aorem")));
        assert_eq!(ocr.calls(), 0);
    }

    #[test]
    fn scanned_pages_use_confident_ocr_regions() {
        let source = fixtures::pdf(&[PageSpec::image(60, 40, 1)]);
        let document = Document::from_bytes(&source).unwrap();
        let config = PipelineConfig::default();
        let (renderers, workspace) = default_backends();
        let ocr = ScriptedOcr::returning(&[("SUMMARY", 0.9), ("faint", 0.4), ("body text here", 0.7)]);
        let ctx = OpContext::new(&config, &renderers, &ocr, &workspace);

        let paragraphs = texts(&pdf_to_docx_rich(&ctx, &document).unwrap());
        assert_eq!(paragraphs, vec!["Page 1", "SUMMARY", "body text here"]);
    }

    #[test]
    fn empty_documents_get_a_notice() {
        let source = fixtures::pdf(&[PageSpec::blank()]);
        let document = Document::from_bytes(&source).unwrap();
        let config = PipelineConfig::default();
        let (renderers, workspace) = default_backends();
        let ctx = OpContext::new(&config, &renderers, &NoOcr, &workspace);
        let paragraphs = texts(&pdf_to_docx_rich(&ctx, &document).unwrap());
        assert_eq!(paragraphs[1], NO_CONTENT_NOTICE[0]);
    }

    #[test]
    fn simple_conversion_writes_one_paragraph_per_line() {
        let document = Document::from_bytes(&fixtures::text_pdf(&["alpha\nbeta"])).unwrap();
        let paragraphs = texts(&pdf_to_docx_simple(&document).unwrap());
        assert_eq!(paragraphs[0], "Page 1");
        assert!(paragraphs.iter().any(|p| p == "alpha"));
        assert!(paragraphs.iter().any(|p| p == "beta"));
    }

    #[test]
    fn docx_reads_back_formatting() {
        let paragraphs = vec![
            Paragraph::heading("Title", 1),
            Paragraph::body(
                vec![Run {
                    text: "bold <&> text".to_string(),
                    bold: true,
                    italic: true,
                    size: Some(13.0),
                    font: Some("Arial".to_string()),
                }],
                Align::Center,
            ),
        ];
        let package = Package::from_bytes(&write_docx(&paragraphs).unwrap()).unwrap();
        let blocks = read_docx(&package).unwrap();
        assert_eq!(blocks, paragraphs.into_iter().map(Block::Paragraph).collect::<Vec<_>>());
    }

    #[test]
    fn docx_to_pdf_lays_out_paragraphs_and_tables() {
        let paragraphs = vec![
            Paragraph::heading("Report", 1),
            Paragraph::body(vec![Run::plain("first paragraph")], Align::Left),
        ];
        let package = Package::from_bytes(&write_docx(&paragraphs).unwrap()).unwrap();
        for bytes in [docx_to_pdf_rich(&package).unwrap(), docx_to_pdf_simple(&package).unwrap()] {
            let document = Document::from_bytes(&bytes).unwrap();
            let text = document.full_text();
            assert!(text.contains("Report"), "{text}");
            assert!(text.contains("first paragraph"), "{text}");
        }
    }
}
