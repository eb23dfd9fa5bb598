// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Compress: raster recompression for large sources, stream-level
// compression for everything else.

use std::collections::HashMap;
use std::sync::Arc;

use lopdf::{Dictionary, Object, ObjectId};
use seitenwerk_core::error::{Result, SeitenwerkError};
use seitenwerk_core::{NamedOutput, Quality};
use sha2::{Digest, Sha256};
use tracing::{debug, info, instrument};

use super::{OpContext, require_pages, require_unlocked};
use crate::image::ImageProcessor;
use crate::pdf::Document;
use crate::pdf::images::jpeg_xobject;
use crate::pdf::objects::{add_page, name, new_document, save};
use crate::render::{PageRenderer, all_pages, render_each};
use crate::strategy::StrategyChain;

pub const OUTPUT_NAME: &str = "compressed.pdf";

/// One recompressed page, kept encoded until the whole chain succeeds.
struct RasterPage {
    jpeg: Vec<u8>,
    pixel_width: u32,
    pixel_height: u32,
    /// Displayed size in points.
    width: f32,
    height: f32,
}

/// Compress `document` at `quality`.
///
/// Sources above `raster_compress_threshold_bytes` are re-rendered into
/// JPEG pages first; that result is returned whenever it completes, even
/// when it is not smaller. Pages with text are only re-rendered by
/// renderers that draw text. Otherwise, or when it fails, streams are
/// compressed and deduplicated in place.
#[instrument(skip(ctx, document), fields(pages = document.page_count(), bytes_len = document.source_len()))]
pub fn compress(ctx: &OpContext<'_>, document: &Document, quality: Quality) -> Result<NamedOutput> {
    require_unlocked(document, "compress")?;
    require_pages(document, "compress")?;

    let mut chain = StrategyChain::new("compress");
    if document.source_len() as u64 > ctx.config.raster_compress_threshold_bytes {
        chain = chain.strategy("raster-recompression", || raster_recompress(ctx, document, quality));
    }
    let bytes = chain
        .strategy("stream-compression", || stream_compress(document, quality))
        .run()?;

    info!(
        before = document.source_len(),
        after = bytes.len(),
        "Compression complete"
    );
    Ok(NamedOutput::pdf(OUTPUT_NAME, bytes))
}

fn raster_recompress(ctx: &OpContext<'_>, document: &Document, quality: Quality) -> Result<Vec<u8>> {
    let carries_text = document.pages().iter().any(|page| page.text_chars > 0);
    let renderers: Vec<Arc<dyn PageRenderer>> = ctx
        .renderers
        .iter()
        .filter(|renderer| !carries_text || renderer.draws_text())
        .cloned()
        .collect();
    if renderers.is_empty() {
        return Err(SeitenwerkError::codec("no configured renderer draws page text"));
    }

    let profile = ctx.config.quality_profiles.profile(quality);
    let pages = render_each(
        &renderers,
        "compress-raster",
        document,
        &all_pages(document),
        profile.scale,
        |number, raster| {
            let (width, height) = match document.page(number) {
                Some(page) if page.rotation.is_sideways() => (page.height, page.width),
                Some(page) => (page.width, page.height),
                None => (raster.width() as f32, raster.height() as f32),
            };
            let flattened = ImageProcessor::from_dynamic(raster).flatten_onto_white();
            let (pixel_width, pixel_height) = (flattened.width(), flattened.height());
            let jpeg = flattened.to_jpeg_bytes(profile.jpeg_quality)?;
            debug!(page = number, pixel_width, pixel_height, jpeg_bytes = jpeg.len(), "Page recompressed");
            Ok(RasterPage {
                jpeg,
                pixel_width,
                pixel_height,
                width,
                height,
            })
        },
    )?;

    let (mut target, pages_id) = new_document();
    for page in pages {
        let image_id = target.add_object(jpeg_xobject(page.jpeg, page.pixel_width, page.pixel_height, false));
        let mut xobjects = Dictionary::new();
        xobjects.set("Im0", Object::Reference(image_id));
        let mut resources = Dictionary::new();
        resources.set("XObject", Object::Dictionary(xobjects));
        let content = format!("q {} 0 0 {} 0 0 cm /Im0 Do Q", page.width, page.height);
        add_page(&mut target, pages_id, page.width, page.height, resources, content.into_bytes());
    }
    target.compress();
    save(&mut target)
}

fn stream_compress(document: &Document, quality: Quality) -> Result<Vec<u8>> {
    let mut inner = document.inner().clone();
    if quality == Quality::Low {
        strip_interactive(&mut inner);
    }
    inner.compress();
    let merged = deduplicate_streams(&mut inner);
    let pruned = inner.prune_objects();
    debug!(merged, pruned = pruned.len(), "Streams compressed");
    save(&mut inner)
}

/// Drop page annotations and the interactive form.
fn strip_interactive(document: &mut lopdf::Document) {
    let page_ids: Vec<ObjectId> = document.get_pages().into_values().collect();
    for page_id in page_ids {
        if let Ok(Object::Dictionary(page)) = document.get_object_mut(page_id) {
            page.remove(b"Annots");
        }
    }
    if let Ok(catalog_id) = document.trailer.get(b"Root").and_then(Object::as_reference)
        && let Ok(Object::Dictionary(catalog)) = document.get_object_mut(catalog_id)
    {
        catalog.remove(b"AcroForm");
    }
}

/// Digest of a stream's dictionary (keys sorted) and content.
fn stream_digest(dict: &Dictionary, content: &[u8]) -> [u8; 32] {
    let mut entries: Vec<(&Vec<u8>, &Object)> = dict.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));
    let mut hasher = Sha256::new();
    for (key, value) in entries {
        hasher.update(key);
        hasher.update(format!("{:?}", value).as_bytes());
    }
    hasher.update(b"\0stream\0");
    hasher.update(content);
    hasher.finalize().into()
}

/// Point every reference at the first of a set of identical streams and
/// remove the rest. Returns how many streams were merged away.
fn deduplicate_streams(document: &mut lopdf::Document) -> usize {
    let mut first_seen: HashMap<[u8; 32], ObjectId> = HashMap::new();
    let mut replaced: HashMap<ObjectId, ObjectId> = HashMap::new();
    for (&id, object) in document.objects.iter() {
        if let Object::Stream(stream) = object {
            let digest = stream_digest(&stream.dict, &stream.content);
            match first_seen.get(&digest) {
                Some(&original) => {
                    replaced.insert(id, original);
                }
                None => {
                    first_seen.insert(digest, id);
                }
            }
        }
    }
    if replaced.is_empty() {
        return 0;
    }
    for object in document.objects.values_mut() {
        rewrite_references(object, &replaced);
    }
    for (_, value) in document.trailer.iter_mut() {
        rewrite_references(value, &replaced);
    }
    for id in replaced.keys() {
        document.objects.remove(id);
    }
    replaced.len()
}

fn rewrite_references(object: &mut Object, replaced: &HashMap<ObjectId, ObjectId>) {
    match object {
        Object::Reference(id) => {
            if let Some(&target) = replaced.get(id) {
                *id = target;
            }
        }
        Object::Array(items) => {
            for item in items {
                rewrite_references(item, replaced);
            }
        }
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter_mut() {
                rewrite_references(value, replaced);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter_mut() {
                rewrite_references(value, replaced);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, PageSpec};
    use crate::ocr::NoOcr;
    use crate::ops::testing::default_backends;
    use crate::pdf::images::page_images;
    use seitenwerk_core::PipelineConfig;

    fn embedded_widths(bytes: &[u8]) -> Vec<i64> {
        let document = Document::from_bytes(bytes).unwrap();
        document
            .page_ids()
            .into_iter()
            .flat_map(|page_id| page_images(document.inner(), page_id))
            .map(|image_id| {
                document
                    .inner()
                    .get_object(image_id)
                    .and_then(Object::as_stream)
                    .and_then(|stream| stream.dict.get(b"Width"))
                    .and_then(Object::as_i64)
                    .unwrap()
            })
            .collect()
    }

    fn compress_with(bytes: &[u8], quality: Quality) -> NamedOutput {
        let document = Document::from_bytes(bytes).unwrap();
        let config = PipelineConfig::default();
        let (renderers, workspace) = default_backends();
        let ctx = OpContext::new(&config, &renderers, &NoOcr, &workspace);
        compress(&ctx, &document, quality).unwrap()
    }

    #[test]
    fn large_scans_are_rescaled_per_quality() {
        let scan = fixtures::pdf(&[PageSpec::image(1000, 800, 3)]);
        assert!(scan.len() > 1024 * 1024);

        let low = compress_with(&scan, Quality::Low);
        let high = compress_with(&scan, Quality::High);
        assert_eq!(low.name, "compressed.pdf");
        assert_eq!(embedded_widths(&low.bytes), vec![400]);
        assert_eq!(embedded_widths(&high.bytes), vec![900]);

        let page = Document::from_bytes(&low.bytes).unwrap();
        let first = page.page(1).unwrap();
        assert_eq!((first.width, first.height), (1000.0, 800.0));
    }

    #[test]
    fn large_mixed_pages_keep_their_text() {
        let body = fixtures::prose(300, 'l');
        let source = fixtures::pdf(&[PageSpec::image(1000, 800, 3).with_text(body)]);
        assert!(source.len() > 1024 * 1024);
        let before = Document::from_bytes(&source).unwrap().page(1).unwrap().text_chars;
        assert!(before > 0);

        let output = compress_with(&source, Quality::High);
        let after = Document::from_bytes(&output.bytes).unwrap();
        assert_eq!(after.page(1).unwrap().text_chars, before);
        assert_eq!(embedded_widths(&output.bytes), vec![1000]);
    }

    #[test]
    fn small_documents_keep_their_text() {
        let source = fixtures::text_pdf(&["keep me", "and me"]);
        let output = compress_with(&source, Quality::Medium);
        let document = Document::from_bytes(&output.bytes).unwrap();
        assert_eq!(document.page(2).unwrap().text().trim(), "and me");
    }

    #[test]
    fn identical_streams_are_merged() {
        let source = fixtures::pdf(&[PageSpec::image(30, 30, 4), PageSpec::image(30, 30, 4)]);
        let document = Document::from_bytes(&source).unwrap();
        let before = document.page_ids().into_iter().flat_map(|id| page_images(document.inner(), id));
        assert_eq!(before.collect::<std::collections::HashSet<_>>().len(), 2);

        let output = compress_with(&source, Quality::High);
        let compressed = Document::from_bytes(&output.bytes).unwrap();
        let after: std::collections::HashSet<_> = compressed
            .page_ids()
            .into_iter()
            .flat_map(|id| page_images(compressed.inner(), id))
            .collect();
        assert_eq!(after.len(), 1);
        assert_eq!(compressed.page_count(), 2);
    }

    #[test]
    fn low_quality_strips_annotations() {
        let mut inner = crate::pdf::objects::load(&fixtures::text_pdf(&["annotated"])).unwrap();
        let page_id = *inner.get_pages().get(&1).unwrap();
        let mut annotation = Dictionary::new();
        annotation.set("Type", name("Annot"));
        annotation.set("Subtype", name("Text"));
        let annotation_id = inner.add_object(annotation);
        if let Ok(Object::Dictionary(page)) = inner.get_object_mut(page_id) {
            page.set("Annots", Object::Array(vec![Object::Reference(annotation_id)]));
        }
        let source = save(&mut inner).unwrap();

        let has_annots = |bytes: &[u8]| {
            let document = Document::from_bytes(bytes).unwrap();
            let page_id = document.page_ids()[0];
            document.inner().get_dictionary(page_id).unwrap().has(b"Annots")
        };
        assert!(has_annots(&compress_with(&source, Quality::High).bytes));
        assert!(!has_annots(&compress_with(&source, Quality::Low).bytes));
    }
}
