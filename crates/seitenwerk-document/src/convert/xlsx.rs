// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF <-> XLSX (SpreadsheetML).

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use seitenwerk_core::error::Result;
use tracing::debug;

use super::fonts::FontFamily;
use super::ooxml::{
    self, DOC_RELS_NS, OFFICE_DOC_REL, OoxmlResult, Package, PackageWriter, XmlPart, attr, child, is,
    resolve_target,
};
use super::{NO_TEXT_PLACEHOLDER, ocr_lines};
use crate::ops::OpContext;
use crate::pdf::Document;
use crate::pdf::writer::{LayoutWriter, StyledLine};

const S_NS: &str = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
const WORKBOOK_PART: &str = "xl/workbook.xml";
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const NO_DATA: &str = "No data in this sheet";

/// Runs of two or more spaces, or any tabs, separate cells.
static CELL_GAP: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" {2,}|\t+").expect("static pattern"));

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<String>>,
}

pub fn split_cells(line: &str) -> Vec<String> {
    CELL_GAP
        .split(line.trim())
        .map(str::trim)
        .filter(|cell| !cell.is_empty())
        .map(str::to_string)
        .collect()
}

/// `0 -> A`, `25 -> Z`, `26 -> AA`.
fn column_name(mut index: usize) -> String {
    let mut name = Vec::new();
    loop {
        name.push(b'A' + (index % 26) as u8);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    name.reverse();
    String::from_utf8_lossy(&name).into_owned()
}

/// Inverse of [`column_name`] on the letter prefix of a cell reference.
fn column_index(reference: &str) -> Option<usize> {
    let letters: Vec<u8> = reference.bytes().take_while(u8::is_ascii_alphabetic).collect();
    if letters.is_empty() {
        return None;
    }
    let mut index = 0usize;
    for letter in letters {
        index = index * 26 + (letter.to_ascii_uppercase() - b'A' + 1) as usize;
    }
    Some(index - 1)
}

/// Sheet names are at most 31 characters, without `[]:*?/\`, and unique.
fn sheet_names(sheets: &[Sheet]) -> Vec<String> {
    let mut used = Vec::<String>::new();
    for (index, sheet) in sheets.iter().enumerate() {
        let cleaned: String = sheet
            .name
            .chars()
            .filter(|c| !matches!(c, '[' | ']' | ':' | '*' | '?' | '/' | '\\'))
            .take(31)
            .collect();
        let mut name = if cleaned.trim().is_empty() {
            format!("Sheet{}", index + 1)
        } else {
            cleaned
        };
        if used.iter().any(|u| u.eq_ignore_ascii_case(&name)) {
            let suffix = format!("_{}", index + 1);
            name = name.chars().take(31 - suffix.len()).collect::<String>() + &suffix;
        }
        used.push(name);
    }
    used
}

// -- Writing ------------------------------------------------------------------

fn sheet_part(sheet: &Sheet) -> OoxmlResult<Vec<u8>> {
    let mut xml = XmlPart::new()?;
    xml.open("worksheet", &[("xmlns", S_NS), ("xmlns:r", DOC_RELS_NS)])?;
    xml.open("sheetData", &[])?;
    for (row_index, row) in sheet.rows.iter().enumerate() {
        let row_number = (row_index + 1).to_string();
        xml.open("row", &[("r", &row_number)])?;
        for (column, value) in row.iter().enumerate() {
            let reference = format!("{}{}", column_name(column), row_number);
            xml.open("c", &[("r", &reference), ("t", "inlineStr")])?;
            xml.open("is", &[])?;
            xml.leaf("t", &[("xml:space", "preserve")], value)?;
            xml.close("is")?;
            xml.close("c")?;
        }
        xml.close("row")?;
    }
    xml.close("sheetData")?;
    xml.close("worksheet")?;
    Ok(xml.finish())
}

fn styles_part() -> OoxmlResult<Vec<u8>> {
    let mut xml = XmlPart::new()?;
    xml.open("styleSheet", &[("xmlns", S_NS)])?;
    xml.open("fonts", &[("count", "1")])?.open("font", &[])?;
    xml.empty("sz", &[("val", "11")])?.empty("name", &[("val", "Calibri")])?;
    xml.close("font")?.close("fonts")?;
    xml.open("fills", &[("count", "1")])?.open("fill", &[])?;
    xml.empty("patternFill", &[("patternType", "none")])?;
    xml.close("fill")?.close("fills")?;
    xml.open("borders", &[("count", "1")])?.open("border", &[])?;
    for side in ["left", "right", "top", "bottom", "diagonal"] {
        xml.empty(side, &[])?;
    }
    xml.close("border")?.close("borders")?;
    xml.open("cellStyleXfs", &[("count", "1")])?;
    xml.empty("xf", &[("numFmtId", "0"), ("fontId", "0"), ("fillId", "0"), ("borderId", "0")])?;
    xml.close("cellStyleXfs")?;
    xml.open("cellXfs", &[("count", "1")])?;
    xml.empty(
        "xf",
        &[("numFmtId", "0"), ("fontId", "0"), ("fillId", "0"), ("borderId", "0"), ("xfId", "0")],
    )?;
    xml.close("cellXfs")?;
    xml.close("styleSheet")?;
    Ok(xml.finish())
}

/// Serialize sheets into an XLSX package using inline strings.
pub fn write_xlsx(sheets: &[Sheet]) -> OoxmlResult<Vec<u8>> {
    let names = sheet_names(sheets);
    let sheet_type = "application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml";
    let worksheet_rel = format!("{REL_BASE}/worksheet");
    let styles_rel = format!("{REL_BASE}/styles");

    let mut package = PackageWriter::new();
    let mut overrides = vec![
        (
            format!("/{WORKBOOK_PART}"),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml",
        ),
        (
            "/xl/styles.xml".to_string(),
            "application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml",
        ),
    ];
    let mut workbook_rels = Vec::new();

    let mut workbook = XmlPart::new()?;
    workbook.open("workbook", &[("xmlns", S_NS), ("xmlns:r", DOC_RELS_NS)])?;
    workbook.open("sheets", &[])?;
    for (index, (sheet, name)) in sheets.iter().zip(&names).enumerate() {
        let number = index + 1;
        let rel_id = format!("rId{number}");
        let sheet_id = number.to_string();
        workbook.empty("sheet", &[("name", name.as_str()), ("sheetId", &sheet_id), ("r:id", &rel_id)])?;
        overrides.push((format!("/xl/worksheets/sheet{number}.xml"), sheet_type));
        workbook_rels.push((rel_id, worksheet_rel.as_str(), format!("worksheets/sheet{number}.xml")));
        package.add(format!("xl/worksheets/sheet{number}.xml"), sheet_part(sheet)?);
    }
    workbook.close("sheets")?.close("workbook")?;
    workbook_rels.push((format!("rId{}", sheets.len() + 1), styles_rel.as_str(), "styles.xml".to_string()));

    package.add("[Content_Types].xml", ooxml::content_types(&overrides)?);
    package.add(
        "_rels/.rels",
        ooxml::relationships(&[("rId1".to_string(), OFFICE_DOC_REL, WORKBOOK_PART.to_string())])?,
    );
    package.add(WORKBOOK_PART, workbook.finish());
    package.add("xl/_rels/workbook.xml.rels", ooxml::relationships(&workbook_rels)?);
    package.add("xl/styles.xml", styles_part()?);
    package.finish()
}

// -- Reading ------------------------------------------------------------------

fn shared_strings(package: &Package) -> OoxmlResult<Vec<String>> {
    let part = "xl/sharedStrings.xml";
    if !package.has(part) {
        return Ok(Vec::new());
    }
    let doc = ooxml::parse(part, package.text(part)?)?;
    Ok(doc
        .descendants()
        .filter(|n| is(n, "si"))
        .map(|si| ooxml::text_of(&si, "t"))
        .collect())
}

fn cell_value(cell: &roxmltree::Node<'_, '_>, strings: &[String]) -> String {
    let raw = child(cell, "v").and_then(|v| v.text()).unwrap_or_default();
    match attr(cell, "t") {
        Some("s") => raw
            .trim()
            .parse::<usize>()
            .ok()
            .and_then(|index| strings.get(index))
            .cloned()
            .unwrap_or_default(),
        Some("inlineStr") => child(cell, "is")
            .map(|is_node| ooxml::text_of(&is_node, "t"))
            .unwrap_or_default(),
        Some("b") => if raw.trim() == "1" { "TRUE" } else { "FALSE" }.to_string(),
        _ => raw.to_string(),
    }
}

fn read_sheet(part: &str, xml: &str, strings: &[String]) -> OoxmlResult<Vec<Vec<String>>> {
    let doc = ooxml::parse(part, xml)?;
    let mut rows: BTreeMap<usize, BTreeMap<usize, String>> = BTreeMap::new();
    let mut next_row = 1usize;
    for row in doc.descendants().filter(|n| is(n, "row")) {
        let row_number = attr(&row, "r").and_then(|r| r.parse().ok()).unwrap_or(next_row);
        next_row = row_number + 1;
        let cells = rows.entry(row_number).or_default();
        let mut next_column = 0usize;
        for cell in row.children().filter(|n| is(n, "c")) {
            let column = attr(&cell, "r").and_then(column_index).unwrap_or(next_column);
            next_column = column + 1;
            let value = cell_value(&cell, strings);
            if !value.is_empty() {
                cells.insert(column, value);
            }
        }
    }
    Ok(rows
        .into_values()
        .filter(|cells| !cells.is_empty())
        .map(|cells| {
            let width = cells.keys().next_back().map_or(0, |last| last + 1);
            let mut row = vec![String::new(); width];
            for (column, value) in cells {
                row[column] = value;
            }
            row
        })
        .collect())
}

/// Every sheet in workbook order.
pub fn read_xlsx(package: &Package) -> OoxmlResult<Vec<Sheet>> {
    let rels = package.rels("xl/_rels/workbook.xml.rels")?;
    let doc = ooxml::parse(WORKBOOK_PART, package.text(WORKBOOK_PART)?)?;
    let strings = shared_strings(package)?;
    let mut sheets = Vec::new();
    for sheet in doc.descendants().filter(|n| is(n, "sheet")) {
        let name = attr(&sheet, "name").unwrap_or_default().to_string();
        let Some(target) = sheet.attribute((DOC_RELS_NS, "id")).and_then(|id| rels.get(id)) else {
            debug!(%name, "Sheet without a relationship target");
            continue;
        };
        let part = resolve_target(WORKBOOK_PART, target);
        let rows = if package.has(&part) {
            read_sheet(&part, package.text(&part)?, &strings)?
        } else {
            Vec::new()
        };
        sheets.push(Sheet { name, rows });
    }
    Ok(sheets)
}

// -- PDF -> XLSX --------------------------------------------------------------

fn page_sheets(ctx: &OpContext<'_>, document: &Document, split: bool) -> Vec<Sheet> {
    let ocr = ocr_lines(ctx, document, ctx.config.slide_ocr_min_chars);
    document
        .pages()
        .iter()
        .map(|page| {
            let lines: Vec<String> = match ocr.get(&page.number) {
                Some(lines) if !lines.is_empty() => lines.clone(),
                _ => page
                    .text()
                    .lines()
                    .filter(|line| !line.trim().is_empty())
                    .map(str::to_string)
                    .collect(),
            };
            let rows: Vec<Vec<String>> = if lines.is_empty() {
                vec![vec![NO_TEXT_PLACEHOLDER.to_string()]]
            } else if split {
                lines.iter().map(|line| split_cells(line)).filter(|row| !row.is_empty()).collect()
            } else {
                lines.iter().map(|line| vec![line.trim().to_string()]).collect()
            };
            Sheet {
                name: format!("Page_{}", page.number),
                rows,
            }
        })
        .collect()
}

/// One sheet per page with lines split into cells on wide gaps.
pub fn pdf_to_xlsx_rich(ctx: &OpContext<'_>, document: &Document) -> Result<Vec<u8>> {
    Ok(write_xlsx(&page_sheets(ctx, document, true))?)
}

/// One sheet per page, one line per row.
pub fn pdf_to_xlsx_simple(ctx: &OpContext<'_>, document: &Document) -> Result<Vec<u8>> {
    Ok(write_xlsx(&page_sheets(ctx, document, false))?)
}

// -- XLSX -> PDF --------------------------------------------------------------

fn sheets_to_pdf(package: &Package, bold_header: bool) -> Result<Vec<u8>> {
    let sheets = read_xlsx(package)?;
    let mut writer = LayoutWriter::landscape("Converted spreadsheet");
    for sheet in &sheets {
        writer.push(
            StyledLine::new(format!("Sheet: {}", sheet.name), FontFamily::Sans, 14.0)
                .bold()
                .spaced(14.0),
        );
        if sheet.rows.is_empty() {
            writer.push(StyledLine::new(NO_DATA, FontFamily::Sans, 10.0).italic(true));
            continue;
        }
        for (index, row) in sheet.rows.iter().enumerate() {
            let mut line = StyledLine::new(row.join(" | "), FontFamily::Monospace, 9.0).spaced(1.0);
            if bold_header && index == 0 {
                line = line.bold();
            }
            writer.push(line);
        }
    }
    if sheets.is_empty() {
        writer.push(StyledLine::new(NO_DATA, FontFamily::Sans, 10.0));
    }
    debug!(sheets = sheets.len(), "Workbook laid out");
    writer.finish()
}

pub fn xlsx_to_pdf_rich(package: &Package) -> Result<Vec<u8>> {
    sheets_to_pdf(package, true)
}

pub fn xlsx_to_pdf_simple(package: &Package) -> Result<Vec<u8>> {
    sheets_to_pdf(package, false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, PageSpec};
    use crate::ocr::NoOcr;
    use crate::ops::testing::default_backends;
    use seitenwerk_core::PipelineConfig;

    #[test]
    fn cells_split_on_wide_gaps() {
        assert_eq!(split_cells("Name  Qty\tPrice"), vec!["Name", "Qty", "Price"]);
        assert_eq!(split_cells("one cell only"), vec!["one cell only"]);
        assert!(split_cells("   ").is_empty());
    }

    #[test]
    fn column_names_round_trip() {
        for (index, name) in [(0, "A"), (25, "Z"), (26, "AA"), (701, "ZZ"), (702, "AAA")] {
            assert_eq!(column_name(index), name);
            assert_eq!(column_index(&format!("{name}12")), Some(index));
        }
    }

    #[test]
    fn sheet_names_are_cleaned_and_unique() {
        let sheets: Vec<Sheet> = ["a/b", "A/B", "", &"x".repeat(40)]
            .iter()
            .map(|name| Sheet {
                name: name.to_string(),
                rows: Vec::new(),
            })
            .collect();
        let names = sheet_names(&sheets);
        assert_eq!(names[0], "ab");
        assert_eq!(names[1], "AB_2");
        assert_eq!(names[2], "Sheet3");
        assert_eq!(names[3].chars().count(), 31);
    }

    #[test]
    fn pages_become_sheets() {
        let document = Document::from_bytes(&fixtures::pdf(&[
            PageSpec::text(format!("Item  Qty  Price\n{}", fixtures::prose(60, 'w'))),
            PageSpec::blank(),
        ]))
        .unwrap();
        let config = PipelineConfig::default();
        let (renderers, workspace) = default_backends();
        let ctx = OpContext::new(&config, &renderers, &NoOcr, &workspace);

        let package = Package::from_bytes(&pdf_to_xlsx_rich(&ctx, &document).unwrap()).unwrap();
        let sheets = read_xlsx(&package).unwrap();
        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[0].name, "Page_1");
        assert_eq!(sheets[1].name, "Page_2");
        assert_eq!(sheets[1].rows, vec![vec![NO_TEXT_PLACEHOLDER.to_string()]]);

        let package = Package::from_bytes(&pdf_to_xlsx_simple(&ctx, &document).unwrap()).unwrap();
        let simple = read_xlsx(&package).unwrap();
        assert!(simple[0].rows.iter().all(|row| row.len() == 1));
    }

    #[test]
    fn shared_strings_and_sparse_cells_are_read() {
        let mut package = PackageWriter::new();
        package.add(
            WORKBOOK_PART,
            format!(
                r#"<workbook xmlns="{S_NS}" xmlns:r="{DOC_RELS_NS}"><sheets><sheet name="Data" sheetId="1" r:id="rId1"/><sheet name="Empty" sheetId="2" r:id="rId2"/></sheets></workbook>"#
            )
            .into_bytes(),
        );
        package.add(
            "xl/_rels/workbook.xml.rels",
            ooxml::relationships(&[
                ("rId1".to_string(), "worksheet", "worksheets/sheet1.xml".to_string()),
                ("rId2".to_string(), "worksheet", "/xl/worksheets/sheet2.xml".to_string()),
            ])
            .unwrap(),
        );
        package.add(
            "xl/sharedStrings.xml",
            format!(r#"<sst xmlns="{S_NS}"><si><t>Name</t></si><si><r><t>Ri</t></r><r><t>ch</t></r></si></sst>"#)
                .into_bytes(),
        );
        package.add(
            "xl/worksheets/sheet1.xml",
            format!(
                r#"<worksheet xmlns="{S_NS}"><sheetData><row r="1"><c r="A1" t="s"><v>0</v></c><c r="C1" t="s"><v>1</v></c></row><row r="3"><c r="B3"><v>42</v></c><c r="C3" t="b"><v>1</v></c></row></sheetData></worksheet>"#
            )
            .into_bytes(),
        );
        package.add(
            "xl/worksheets/sheet2.xml",
            format!(r#"<worksheet xmlns="{S_NS}"><sheetData/></worksheet>"#).into_bytes(),
        );
        let package = Package::from_bytes(&package.finish().unwrap()).unwrap();

        let sheets = read_xlsx(&package).unwrap();
        assert_eq!(sheets[0].rows, vec![vec!["Name", "", "Rich"], vec!["", "42", "TRUE"]]);
        assert!(sheets[1].rows.is_empty());

        let document = Document::from_bytes(&xlsx_to_pdf_rich(&package).unwrap()).unwrap();
        let text = document.full_text();
        assert!(text.contains("Sheet: Data"), "{text}");
        assert!(text.contains("Name | | Rich"), "{text}");
        assert!(text.contains(NO_DATA), "{text}");
    }
}
