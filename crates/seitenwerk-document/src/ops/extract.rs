// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Extract text, falling back to OCR when the text layer is nearly empty.

use seitenwerk_core::error::Result;
use seitenwerk_core::{NamedOutput, TEXT_MIME};
use tracing::{info, instrument};

use super::{OpContext, require_pages, require_unlocked};
use crate::ocr::ocr_pages;
use crate::pdf::Document;
use crate::render::all_pages;

pub const OUTPUT_NAME: &str = "extracted_text.txt";
pub const NOTHING_EXTRACTED: &str = "No text could be extracted from this PDF.";

/// OCR renders at 300 dpi.
const OCR_ZOOM: f32 = 300.0 / 72.0;

fn direct_text(document: &Document) -> String {
    let mut out = String::new();
    for page in document.pages() {
        let text = page.text().trim();
        if !text.is_empty() {
            out.push_str(&format!("--- Page {} ---\n{}\n\n", page.number, text));
        }
    }
    out
}

#[instrument(skip(ctx, document), fields(pages = document.page_count()))]
pub fn extract_text(ctx: &OpContext<'_>, document: &Document) -> Result<NamedOutput> {
    require_unlocked(document, "extract-text")?;
    require_pages(document, "extract-text")?;

    let direct = direct_text(document);
    let direct_chars = direct.trim().chars().count();
    let text = if direct_chars > ctx.config.extract_ocr_min_chars {
        direct
    } else {
        info!(direct_chars, "Text layer is sparse; running OCR");
        let results = ocr_pages(
            ctx,
            document,
            &all_pages(document),
            OCR_ZOOM,
            ctx.config.ocr_confidence_plain,
        );
        let mut out = String::new();
        for (number, outcome) in results {
            let own_text = document
                .page(number)
                .map(|page| page.text().trim())
                .filter(|text| !text.is_empty());
            match outcome {
                Ok(regions) if !regions.is_empty() => {
                    let joined: Vec<&str> = regions.iter().map(|region| region.text.trim()).collect();
                    out.push_str(&format!("--- Page {} (OCR) ---\n{}\n\n", number, joined.join(" ")));
                }
                Ok(_) => {
                    if let Some(text) = own_text {
                        out.push_str(&format!("--- Page {} ---\n{}\n\n", number, text));
                    }
                }
                Err(_) => {
                    let fallback = own_text.unwrap_or("Error processing this page");
                    out.push_str(&format!("--- Page {} (OCR Failed) ---\n{}\n\n", number, fallback));
                }
            }
        }
        out
    };

    let text = if text.trim().is_empty() {
        NOTHING_EXTRACTED.to_string()
    } else {
        text
    };
    info!(chars = text.chars().count(), "Text extracted");
    Ok(NamedOutput::new(OUTPUT_NAME, TEXT_MIME, text.into_bytes()))
}
