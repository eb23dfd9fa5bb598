// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR fallback. Engines sit behind `OcrAdapter`; `ocr_pages` renders pages,
// prepares the rasters, recognises them within a page and time budget and
// reports each page's outcome separately so one bad page never aborts a
// document.

#[cfg(feature = "ocr")]
pub mod ocrs_engine;

use std::collections::{BTreeMap, BTreeSet};
use std::time::{Duration, Instant};

use image::DynamicImage;
use seitenwerk_core::PipelineConfig;
use seitenwerk_core::error::Result;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::image::ImageProcessor;
use crate::ops::OpContext;
use crate::pdf::Document;
use crate::render::render_each;

#[cfg(feature = "ocr")]
pub use ocrs_engine::{OcrConfig, OcrsAdapter};

/// Axis-aligned box in image pixels, origin top-left.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoundingBox {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

/// One recognised text region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrRegion {
    pub text: String,
    /// Engine confidence in `[0, 1]`.
    pub confidence: f32,
    pub bbox: BoundingBox,
}

pub trait OcrAdapter: Send + Sync {
    fn name(&self) -> &str;

    /// Recognise text regions in `image`. Zero regions is a valid answer.
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<OcrRegion>>;
}

/// Adapter for deployments without an OCR engine: never finds anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoOcr;

impl OcrAdapter for NoOcr {
    fn name(&self) -> &str {
        "none"
    }

    fn recognize(&self, _image: &DynamicImage) -> Result<Vec<OcrRegion>> {
        Ok(Vec::new())
    }
}

/// Outcome of OCR for one page: regions, or the reason the page was skipped.
pub type PageOcr = std::result::Result<Vec<OcrRegion>, String>;

/// Page ceiling plus wall-clock budget for one operation.
#[derive(Debug)]
pub struct OcrBudget {
    max_pages: usize,
    budget: Duration,
    started: Instant,
    claimed: BTreeSet<u32>,
}

impl OcrBudget {
    pub fn new(max_pages: usize, budget: Duration) -> Self {
        Self {
            max_pages,
            budget,
            started: Instant::now(),
            claimed: BTreeSet::new(),
        }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.ocr_max_pages, config.ocr_time_budget())
    }

    /// Claim budget for `page`, or say why none is left. A page already
    /// claimed, say by a renderer that later failed, costs nothing again.
    pub fn claim(&mut self, page: u32) -> std::result::Result<(), String> {
        if self.claimed.contains(&page) {
            return Ok(());
        }
        if self.claimed.len() >= self.max_pages {
            return Err(format!("OCR page limit of {} reached", self.max_pages));
        }
        if self.started.elapsed() >= self.budget {
            return Err(format!("OCR time budget of {}s exhausted", self.budget.as_secs()));
        }
        self.claimed.insert(page);
        Ok(())
    }
}

/// Keep regions at or above `min_confidence`, ordered top to bottom then
/// left to right.
pub fn filter_and_sort(mut regions: Vec<OcrRegion>, min_confidence: f32) -> Vec<OcrRegion> {
    regions.retain(|region| region.confidence >= min_confidence && !region.text.trim().is_empty());
    regions.sort_by(|a, b| {
        a.bbox
            .top
            .total_cmp(&b.bbox.top)
            .then(a.bbox.left.total_cmp(&b.bbox.left))
    });
    regions
}

/// Region texts, one per line.
pub fn regions_text(regions: &[OcrRegion]) -> String {
    regions
        .iter()
        .map(|region| region.text.trim())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render and recognise `pages` (1-based) at `zoom`.
///
/// Every requested page gets an entry. Pages beyond the budget, pages the
/// engine fails on, and all pages when no renderer works are reported as
/// `Err` with a reason.
pub fn ocr_pages(
    ctx: &OpContext<'_>,
    document: &Document,
    pages: &[u32],
    zoom: f32,
    min_confidence: f32,
) -> BTreeMap<u32, PageOcr> {
    let mut results: BTreeMap<u32, PageOcr> = BTreeMap::new();
    if pages.is_empty() {
        return results;
    }

    let mut budget = OcrBudget::from_config(ctx.config);
    let outcomes = render_each(ctx.renderers, "ocr-render", document, pages, zoom, |number, raster| {
        if let Err(reason) = budget.claim(number) {
            warn!(page = number, %reason, "Skipping OCR for page");
            return Ok((number, Err(reason)));
        }
        let prepared = ImageProcessor::from_dynamic(raster).prepare_for_ocr().into_dynamic();
        let outcome = match ctx.ocr.recognize(&prepared) {
            Ok(regions) => Ok(filter_and_sort(regions, min_confidence)),
            Err(err) => {
                warn!(page = number, engine = ctx.ocr.name(), %err, "OCR failed for page");
                Err(err.to_string())
            }
        };
        Ok((number, outcome))
    });

    match outcomes {
        Ok(outcomes) => {
            results.extend(outcomes);
            info!(
                pages = pages.len(),
                recognised = results.values().filter(|r| r.is_ok()).count(),
                engine = ctx.ocr.name(),
                "OCR pass complete"
            );
        }
        Err(err) => {
            warn!(%err, "No renderer could prepare pages for OCR");
            for &number in pages {
                results.insert(number, Err(err.to_string()));
            }
        }
    }
    debug!(entries = results.len(), "OCR results collected");
    results
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedOcr;
    use super::*;
    use crate::fixtures::{self, PageSpec};
    use crate::ops::testing::default_backends;
    use crate::render::testing::FailingRenderer;
    use crate::render::{ImageLayerRenderer, PageRenderer};
    use std::sync::Arc;

    fn region(text: &str, confidence: f32, left: f32, top: f32) -> OcrRegion {
        OcrRegion {
            text: text.into(),
            confidence,
            bbox: BoundingBox { left, top, width: 10.0, height: 10.0 },
        }
    }

    #[test]
    fn regions_are_filtered_and_ordered() {
        let regions = vec![
            region("second", 0.9, 5.0, 40.0),
            region("noise", 0.1, 0.0, 0.0),
            region("first-right", 0.8, 50.0, 10.0),
            region("first-left", 0.6, 5.0, 10.0),
        ];
        let kept = filter_and_sort(regions, 0.5);
        assert_eq!(regions_text(&kept), "first-left\nfirst-right\nsecond");
    }

    #[test]
    fn budget_limits_pages() {
        let mut budget = OcrBudget::new(2, Duration::from_secs(60));
        assert!(budget.claim(1).is_ok());
        assert!(budget.claim(2).is_ok());
        assert!(budget.claim(1).is_ok());
        assert!(budget.claim(3).unwrap_err().contains("page limit"));
        let mut expired = OcrBudget::new(5, Duration::ZERO);
        assert!(expired.claim(1).unwrap_err().contains("time budget"));
    }

    #[test]
    fn every_page_gets_an_outcome() {
        let document = Document::from_bytes(&fixtures::pdf(&[
            PageSpec::image(10, 10, 1),
            PageSpec::image(10, 10, 2),
            PageSpec::image(10, 10, 3),
        ]))
        .unwrap();
        let ocr = ScriptedOcr::returning(&[("hello", 0.9)]);
        let mut config = PipelineConfig::default();
        config.ocr_max_pages = 2;
        let (renderers, workspace) = default_backends();
        let ctx = OpContext::new(&config, &renderers, &ocr, &workspace);

        let results = ocr_pages(&ctx, &document, &[1, 2, 3], 1.0, 0.3);
        assert_eq!(results.len(), 3);
        assert_eq!(regions_text(results[&1].as_ref().unwrap()), "hello");
        assert!(results[&2].is_ok());
        assert!(results[&3].is_err());
        assert_eq!(ocr.calls(), 2);
    }

    #[test]
    fn pages_from_a_failed_renderer_do_not_spend_budget() {
        let document = Document::from_bytes(&fixtures::pdf(&[
            PageSpec::image(10, 10, 1),
            PageSpec::image(10, 10, 2),
        ]))
        .unwrap();
        let ocr = ScriptedOcr::returning(&[("hello", 0.9)]);
        let mut config = PipelineConfig::default();
        config.ocr_max_pages = 2;
        let (_, workspace) = default_backends();
        let renderers: Vec<Arc<dyn PageRenderer>> = vec![Arc::new(FailingRenderer), Arc::new(ImageLayerRenderer)];
        let ctx = OpContext::new(&config, &renderers, &ocr, &workspace);

        let results = ocr_pages(&ctx, &document, &[1, 2], 1.0, 0.3);
        assert!(results.values().all(|outcome| outcome.is_ok()), "{results:?}");
        // One recognition of the discarded page, then both real pages.
        assert_eq!(ocr.calls(), 3);
    }

    #[test]
    fn engine_errors_stay_per_page() {
        let document = Document::from_bytes(&fixtures::pdf(&[PageSpec::image(10, 10, 1)])).unwrap();
        let ocr = ScriptedOcr::failing();
        let config = PipelineConfig::default();
        let (renderers, workspace) = default_backends();
        let ctx = OpContext::new(&config, &renderers, &ocr, &workspace);

        let results = ocr_pages(&ctx, &document, &[1], 1.0, 0.3);
        assert!(results[&1].as_ref().unwrap_err().contains("engine crashed"));
    }

    #[test]
    fn no_ocr_finds_nothing() {
        assert!(NoOcr.recognize(&DynamicImage::new_rgb8(2, 2)).unwrap().is_empty());
    }
}
