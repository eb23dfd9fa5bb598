// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// seitenwerk-document: the PDF transformation pipeline.
//
// Provides the parsed document model, the content classifier, the strategy
// executor, page renderers, the OCR adapter, every operation engine (merge,
// split, compress, rasterize, watermark, rotate, encrypt, organize, extract,
// preview), the PDF/OOXML format converters and scoped temp files.

pub mod classify;
pub mod convert;
pub mod image;
pub mod ocr;
pub mod ops;
pub mod pdf;
pub mod pipeline;
pub mod render;
pub mod strategy;
pub mod temp;

#[cfg(test)]
pub(crate) mod fixtures;

// Re-export the primary types so callers can use `seitenwerk_document::Pipeline` etc.
pub use classify::{ContentKind, content_fingerprint, content_kind, is_blank, is_scanned};
pub use convert::FontFamily;
pub use ocr::{BoundingBox, NoOcr, OcrAdapter, OcrRegion};
pub use ops::OpContext;
pub use ops::preview::PageThumbnail;
pub use pdf::{Document, Page, PageHandle};
pub use pipeline::Pipeline;
pub use render::{ImageLayerRenderer, PageRenderer};
pub use strategy::StrategyChain;
pub use temp::{SweepReport, TempWorkspace};

#[cfg(feature = "ocr")]
pub use ocr::{OcrConfig, OcrsAdapter};
#[cfg(feature = "pdfium")]
pub use render::PdfiumRenderer;
