// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Content classification heuristics. These are best-effort judgements from
// extracted text length and embedded images, not a semantic analysis.

use seitenwerk_core::{ClassificationVerdict, PipelineConfig};
use sha2::{Digest, Sha256};
use tracing::debug;

use crate::pdf::images::page_image_digests;
use crate::pdf::{Document, Page};

/// What a page is made of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    TextOnly,
    ImageOnly,
    Mixed,
}

/// Sample the leading pages; a document is scanned when the average
/// extracted text per sampled page is below the configured threshold.
pub fn is_scanned(document: &Document, config: &PipelineConfig) -> ClassificationVerdict {
    let sampled: Vec<&Page> = document
        .pages()
        .iter()
        .take(config.scan_sample_pages.max(1))
        .collect();
    if sampled.is_empty() {
        return ClassificationVerdict {
            scanned: false,
            avg_chars_per_page: 0.0,
            sampled_pages: 0,
        };
    }
    let total: usize = sampled.iter().map(|page| page.text_chars).sum();
    let avg = total as f64 / sampled.len() as f64;
    let verdict = ClassificationVerdict {
        scanned: avg < config.scanned_chars_per_page,
        avg_chars_per_page: avg,
        sampled_pages: sampled.len(),
    };
    debug!(?verdict, "Document classified");
    verdict
}

pub fn is_blank(page: &Page, config: &PipelineConfig) -> bool {
    page.text_chars < config.blank_text_chars && !page.has_images
}

/// Pages with neither text nor images count as text-only.
pub fn content_kind(page: &Page) -> ContentKind {
    match (page.text_chars > 0, page.has_images) {
        (true, true) => ContentKind::Mixed,
        (false, true) => ContentKind::ImageOnly,
        _ => ContentKind::TextOnly,
    }
}

/// Hex SHA-256 of the trimmed page text, or of the concatenated image
/// stream digests when the page has no text.
pub fn content_fingerprint(document: &Document, page: &Page) -> String {
    let text = page.text().trim();
    let mut hasher = Sha256::new();
    if text.is_empty() {
        hasher.update(b"images:");
        for digest in page_image_digests(document.inner(), page.handle.0) {
            hasher.update(digest);
        }
    } else {
        hasher.update(b"text:");
        hasher.update(text.as_bytes());
    }
    hex::encode(hasher.finalize())
}
