// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Format conversion between PDF and the three OOXML formats. Every
// direction has a rich converter that keeps styling and a simple one that
// only moves text; the simple one runs when the rich one fails.

pub mod docx;
pub mod fonts;
pub mod ooxml;
pub mod pptx;
pub mod xlsx;

use std::collections::BTreeMap;

use seitenwerk_core::error::{Result, SeitenwerkError};
use seitenwerk_core::{ConversionDirection, NamedOutput};
use tracing::{info, instrument, warn};

use crate::ocr::ocr_pages;
use crate::ops::{OpContext, require_pages, require_unlocked};
use crate::pdf::Document;
use crate::strategy::StrategyChain;
use ooxml::Package;

pub use fonts::FontFamily;
pub use ooxml::OoxmlError;

/// Written in place of a page that yielded no text at all.
pub const NO_TEXT_PLACEHOLDER: &str = "[No text content on this page]";

/// OCR zoom for slide and sheet conversions.
const OCR_ZOOM: f32 = 2.0;

/// OCR lines for pages with fewer than `min_chars` characters. Pages whose
/// OCR failed or was skipped are absent and fall back to their text layer.
pub(crate) fn ocr_lines(ctx: &OpContext<'_>, document: &Document, min_chars: usize) -> BTreeMap<u32, Vec<String>> {
    let sparse: Vec<u32> = document
        .pages()
        .iter()
        .filter(|page| page.text_chars < min_chars)
        .map(|page| page.number)
        .collect();
    ocr_pages(ctx, document, &sparse, OCR_ZOOM, ctx.config.ocr_confidence_plain)
        .into_iter()
        .filter_map(|(number, outcome)| match outcome {
            Ok(regions) => Some((number, regions.into_iter().map(|region| region.text.trim().to_string()).collect())),
            Err(reason) => {
                warn!(page = number, %reason, "Using text layer after OCR failure");
                None
            }
        })
        .collect()
}

fn open_package(source: &[u8], direction: ConversionDirection, main_part: &str) -> Result<Package> {
    let package = Package::from_bytes(source)
        .map_err(|err| SeitenwerkError::invalid(format!("{}: input is not an Office document: {err}", direction.name())))?;
    if !package.has(main_part) {
        return Err(SeitenwerkError::invalid(format!(
            "{}: input has no {main_part} part",
            direction.name()
        )));
    }
    Ok(package)
}

fn open_pdf(source: &[u8], direction: ConversionDirection) -> Result<Document> {
    let document = Document::from_bytes(source)?;
    require_unlocked(&document, direction.name())?;
    require_pages(&document, direction.name())?;
    Ok(document)
}

/// Convert `source` in `direction`, naming the output after it.
#[instrument(skip(ctx, source), fields(direction = direction.name(), source_bytes = source.len()))]
pub fn convert(ctx: &OpContext<'_>, source: &[u8], direction: ConversionDirection) -> Result<NamedOutput> {
    let operation = direction.name();
    let bytes = match direction {
        ConversionDirection::PdfToDocx => {
            let document = open_pdf(source, direction)?;
            StrategyChain::new(operation)
                .strategy("styled-docx", || docx::pdf_to_docx_rich(ctx, &document))
                .strategy("plain-docx", || docx::pdf_to_docx_simple(&document))
                .run()?
        }
        ConversionDirection::PdfToPptx => {
            let document = open_pdf(source, direction)?;
            StrategyChain::new(operation)
                .strategy("styled-pptx", || pptx::pdf_to_pptx_rich(ctx, &document))
                .strategy("plain-pptx", || pptx::pdf_to_pptx_simple(ctx, &document))
                .run()?
        }
        ConversionDirection::PdfToXlsx => {
            let document = open_pdf(source, direction)?;
            StrategyChain::new(operation)
                .strategy("cell-split-xlsx", || xlsx::pdf_to_xlsx_rich(ctx, &document))
                .strategy("line-xlsx", || xlsx::pdf_to_xlsx_simple(ctx, &document))
                .run()?
        }
        ConversionDirection::DocxToPdf => {
            let package = open_package(source, direction, "word/document.xml")?;
            StrategyChain::new(operation)
                .strategy("styled-layout", || docx::docx_to_pdf_rich(&package))
                .strategy("plain-layout", || docx::docx_to_pdf_simple(&package))
                .run()?
        }
        ConversionDirection::PptxToPdf => {
            let package = open_package(source, direction, "ppt/presentation.xml")?;
            StrategyChain::new(operation)
                .strategy("styled-slides", || pptx::pptx_to_pdf_rich(&package))
                .strategy("plain-slides", || pptx::pptx_to_pdf_simple(&package))
                .run()?
        }
        ConversionDirection::XlsxToPdf => {
            let package = open_package(source, direction, "xl/workbook.xml")?;
            StrategyChain::new(operation)
                .strategy("styled-sheets", || xlsx::xlsx_to_pdf_rich(&package))
                .strategy("plain-sheets", || xlsx::xlsx_to_pdf_simple(&package))
                .run()?
        }
    };
    let (name, content_type) = direction.output();
    info!(output = name, bytes = bytes.len(), "Conversion complete");
    Ok(NamedOutput::new(name, content_type, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use crate::ocr::NoOcr;
    use crate::ops::testing::default_backends;
    use seitenwerk_core::{DOCX_MIME, PDF_MIME, PipelineConfig, XLSX_MIME};

    fn run(source: &[u8], direction: ConversionDirection) -> Result<NamedOutput> {
        let config = PipelineConfig::default();
        let (renderers, workspace) = default_backends();
        let ctx = OpContext::new(&config, &renderers, &NoOcr, &workspace);
        convert(&ctx, source, direction)
    }

    #[test]
    fn pdf_round_trips_through_docx() {
        let source = fixtures::text_pdf(&["QUARTERLY REPORT\nrevenue grew in every region"]);
        let docx = run(&source, ConversionDirection::PdfToDocx).unwrap();
        assert_eq!(docx.name, "converted.docx");
        assert_eq!(docx.content_type, DOCX_MIME);

        let pdf = run(&docx.bytes, ConversionDirection::DocxToPdf).unwrap();
        assert_eq!(pdf.name, "converted.pdf");
        assert_eq!(pdf.content_type, PDF_MIME);
        let text = Document::from_bytes(&pdf.bytes).unwrap().full_text();
        assert!(text.contains("QUARTERLY REPORT"), "{text}");
        assert!(text.contains("revenue grew in every region"), "{text}");
    }

    #[test]
    fn pdf_round_trips_through_xlsx() {
        let source = fixtures::text_pdf(&["Region  Sales\nNorth  120\nSouth  95"]);
        let xlsx = run(&source, ConversionDirection::PdfToXlsx).unwrap();
        assert_eq!(xlsx.name, "converted.xlsx");
        assert_eq!(xlsx.content_type, XLSX_MIME);
        let pdf = run(&xlsx.bytes, ConversionDirection::XlsxToPdf).unwrap();
        let text = Document::from_bytes(&pdf.bytes).unwrap().full_text();
        assert!(text.contains("Sheet: Page_1"), "{text}");
    }

    #[test]
    fn pptx_output_opens_as_presentation() {
        let source = fixtures::text_pdf(&["a", "b", "c"]);
        let pptx = run(&source, ConversionDirection::PdfToPptx).unwrap();
        let package = Package::from_bytes(&pptx.bytes).unwrap();
        assert_eq!(pptx::read_pptx(&package).unwrap().len(), 3);
        let pdf = run(&pptx.bytes, ConversionDirection::PptxToPdf).unwrap();
        assert_eq!(Document::from_bytes(&pdf.bytes).unwrap().page_count(), 3);
    }

    #[test]
    fn wrong_container_is_a_client_error() {
        let err = run(b"not a zip", ConversionDirection::DocxToPdf).unwrap_err();
        assert!(matches!(err, SeitenwerkError::InvalidInput(_)));

        let xlsx = run(&fixtures::text_pdf(&["cell"]), ConversionDirection::PdfToXlsx).unwrap();
        let err = run(&xlsx.bytes, ConversionDirection::PptxToPdf).unwrap_err();
        assert!(matches!(err, SeitenwerkError::InvalidInput(_)));
    }

    #[test]
    fn garbage_pdf_input_is_rejected() {
        let err = run(b"%PDF-1.7 truncated", ConversionDirection::PdfToDocx).unwrap_err();
        assert!(matches!(err, SeitenwerkError::CodecFailure(_)), "{err}");
    }
}
