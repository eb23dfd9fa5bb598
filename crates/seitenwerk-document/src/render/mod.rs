// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page rendering. Renderers are tried in order through the strategy
// executor; each hands rasters to a sink one page at a time so callers can
// encode and drop a page before the next is produced.

pub mod layers;
#[cfg(feature = "pdfium")]
pub mod pdfium;

use std::sync::Arc;

use image::DynamicImage;
use seitenwerk_core::error::Result;

use crate::pdf::Document;
use crate::strategy::try_each;

pub use layers::ImageLayerRenderer;
#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumRenderer;

/// Receives `(1-based page number, raster)` pairs.
pub type PageSink<'a> = dyn FnMut(u32, DynamicImage) -> Result<()> + 'a;

/// Something that can turn pages into pixels.
pub trait PageRenderer: Send + Sync {
    fn name(&self) -> &str;

    /// Whether text drawn by content-stream operators reaches the raster.
    fn draws_text(&self) -> bool {
        true
    }

    /// Render the given 1-based `pages` at `zoom` (1.0 = one pixel per point),
    /// calling `sink` once per page in order.
    fn render_pages(
        &self,
        document: &Document,
        pages: &[u32],
        zoom: f32,
        sink: &mut PageSink<'_>,
    ) -> Result<()>;
}

/// Render `pages` through the first renderer that succeeds, mapping each
/// raster with `per_page` as it arrives. Partial output of a failed renderer
/// is discarded before the next one runs.
pub fn render_each<T>(
    renderers: &[Arc<dyn PageRenderer>],
    operation: &str,
    document: &Document,
    pages: &[u32],
    zoom: f32,
    mut per_page: impl FnMut(u32, DynamicImage) -> Result<T>,
) -> Result<Vec<T>> {
    try_each(
        operation,
        renderers.iter(),
        |renderer| renderer.name().to_string(),
        |renderer| {
            let mut produced = Vec::with_capacity(pages.len());
            renderer.render_pages(document, pages, zoom, &mut |number, raster| {
                produced.push(per_page(number, raster)?);
                Ok(())
            })?;
            Ok(produced)
        },
    )
}

/// Every page number of `document`.
pub(crate) fn all_pages(document: &Document) -> Vec<u32> {
    document.pages().iter().map(|page| page.number).collect()
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, PageSpec};

    #[test]
    fn falls_back_and_discards_partial_output() {
        let document = Document::from_bytes(&fixtures::pdf(&[
            PageSpec::image(20, 10, 1),
            PageSpec::image(20, 10, 2),
        ]))
        .unwrap();
        let renderers: Vec<Arc<dyn PageRenderer>> =
            vec![Arc::new(testing::FailingRenderer), Arc::new(ImageLayerRenderer)];

        let sizes = render_each(&renderers, "rasterize", &document, &all_pages(&document), 2.0, |n, img| {
            Ok((n, img.width(), img.height()))
        })
        .unwrap();
        assert_eq!(sizes, vec![(1, 40, 20), (2, 40, 20)]);
    }

    #[test]
    fn no_renderers_is_invalid_input() {
        let document = Document::from_bytes(&fixtures::text_pdf(&["x"])).unwrap();
        let err = render_each(&[], "rasterize", &document, &[1], 1.0, |_, _| Ok(())).unwrap_err();
        assert!(matches!(err, seitenwerk_core::SeitenwerkError::InvalidInput(_)));
    }
}
