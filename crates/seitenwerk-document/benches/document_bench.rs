// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Criterion benchmarks for the seitenwerk-document crate: the scanned-page
// classifier and the built-in image-layer renderer, both on a synthetic
// four-page image PDF built through the pipeline itself.

use std::io::Cursor;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};

use seitenwerk_core::{OperationRequest, PipelineConfig};
use seitenwerk_document::{Document, ImageLayerRenderer, PageRenderer, Pipeline, is_scanned};

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

/// A 400x300 gradient, PNG-encoded.
fn gradient_png(shift: u8) -> Vec<u8> {
    let img = RgbImage::from_fn(400, 300, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, shift]));
    let mut buffer = Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut buffer, ImageFormat::Png)
        .expect("bench image must encode");
    buffer.into_inner()
}

/// Four image-only pages, as a scanner would produce.
fn scanned_pdf(pipeline: &Pipeline) -> Vec<u8> {
    let images = (0..4).map(|i| gradient_png(i * 60)).collect();
    let result = pipeline
        .execute(OperationRequest::Derasterize {
            images,
            rotations: Vec::new(),
        })
        .expect("bench PDF must build");
    result.into_outputs().remove(0).bytes
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

/// Parse plus classification, the work every content-adaptive operation
/// does before choosing a strategy.
fn bench_classify(c: &mut Criterion) {
    let config = PipelineConfig::default();
    let bytes = scanned_pdf(&Pipeline::new(config.clone()));

    c.bench_function("parse + is_scanned (4 image pages)", |b| {
        b.iter(|| {
            let document = Document::from_bytes(black_box(&bytes)).expect("bench PDF parses");
            black_box(is_scanned(&document, &config));
        });
    });
}

/// Composite every page at 150 dpi on the built-in renderer.
fn bench_layer_renderer(c: &mut Criterion) {
    let bytes = scanned_pdf(&Pipeline::new(PipelineConfig::default()));
    let document = Document::from_bytes(&bytes).expect("bench PDF parses");
    let pages: Vec<u32> = (1..=document.page_count() as u32).collect();
    let renderer = ImageLayerRenderer;

    c.bench_function("image-layer render (4 pages @150dpi)", |b| {
        b.iter(|| {
            let mut pixels = 0u64;
            renderer
                .render_pages(&document, &pages, 150.0 / 72.0, &mut |_, raster| {
                    pixels += u64::from(raster.width()) * u64::from(raster.height());
                    Ok(())
                })
                .expect("render succeeds");
            black_box(pixels);
        });
    });
}

criterion_group!(benches, bench_classify, bench_layer_renderer);
criterion_main!(benches);
