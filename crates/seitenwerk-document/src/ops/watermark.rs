// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text and image watermarks, stamped above the existing page content.

use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Object, ObjectId, StringFormat};
use seitenwerk_core::error::{Result, SeitenwerkError};
use seitenwerk_core::{Anchor, ImageWatermark, NamedOutput, PipelineConfig, TextWatermark};
use tracing::{debug, info, instrument};

use super::{require_pages, require_unlocked};
use crate::image::ImageProcessor;
use crate::pdf::Document;
use crate::pdf::images::add_rgba_xobject;
use crate::pdf::objects::{add_resource, copy_pages, media_box, name, overlay_content, own_resources, real, save};
use crate::strategy::StrategyChain;

pub const OUTPUT_NAME: &str = "watermarked.pdf";

/// Below this opacity a translucent white box is laid over the text.
const VEIL_OPACITY: f32 = 0.7;

/// Where the text baseline starts on a `width x height` page.
pub fn text_anchor(anchor: Anchor, width: f32, height: f32, margin: f32, dx: f32, dy: f32) -> (f32, f32) {
    let (x, y) = match anchor {
        Anchor::TopLeft => (margin, height - margin),
        Anchor::TopCenter => (width / 2.0, height - margin),
        Anchor::TopRight => (width - margin, height - margin),
        Anchor::MiddleLeft => (margin, height / 2.0),
        Anchor::Center => (width / 2.0, height / 2.0),
        Anchor::MiddleRight => (width - margin, height / 2.0),
        Anchor::BottomLeft => (margin, margin),
        Anchor::BottomCenter => (width / 2.0, margin),
        Anchor::BottomRight => (width - margin, margin),
    };
    (x + dx, y + dy)
}

/// Lower-left corner of an `image_width x image_height` box kept inside the
/// margins.
pub fn image_origin(
    anchor: Anchor,
    (width, height): (f32, f32),
    (image_width, image_height): (f32, f32),
    margin: f32,
    dx: f32,
    dy: f32,
) -> (f32, f32) {
    let center_x = (width - image_width) / 2.0;
    let center_y = (height - image_height) / 2.0;
    let right = width - image_width - margin;
    let top = height - image_height - margin;
    let (x, y) = match anchor {
        Anchor::TopLeft => (margin, top),
        Anchor::TopCenter => (center_x, top),
        Anchor::TopRight => (right, top),
        Anchor::MiddleLeft => (margin, center_y),
        Anchor::Center => (center_x, center_y),
        Anchor::MiddleRight => (right, center_y),
        Anchor::BottomLeft => (margin, margin),
        Anchor::BottomCenter => (center_x, margin),
        Anchor::BottomRight => (right, margin),
    };
    (x + dx, y + dy)
}

fn check_opacity(opacity: f32) -> Result<()> {
    if !(opacity > 0.0 && opacity <= 1.0) {
        return Err(SeitenwerkError::invalid(format!("opacity {opacity} is outside (0, 1]")));
    }
    Ok(())
}

/// Helvetica only covers WinAnsi; anything outside Latin-1 becomes `?`.
fn win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
        .collect()
}

/// Stamp every page of `document` with `stamp`, trying an in-place overlay
/// first and a rebuilt page set second.
fn stamp_pages<F>(document: &Document, operation: &str, stamp: F) -> Result<Vec<u8>>
where
    F: Fn(&mut lopdf::Document, &[ObjectId]) -> Result<()>,
{
    let source = document.inner();
    let ids = document.page_ids();
    StrategyChain::new(operation)
        .strategy("content-overlay", || {
            let mut working = source.clone();
            stamp(&mut working, &ids)?;
            save(&mut working)
        })
        .strategy("rebuilt-pages", || {
            let mut working = copy_pages(source, &ids)?;
            let copied: Vec<ObjectId> = working.get_pages().into_values().collect();
            stamp(&mut working, &copied)?;
            save(&mut working)
        })
        .run()
}

fn encode(operations: Vec<Operation>) -> Result<Vec<u8>> {
    Content { operations }
        .encode()
        .map_err(|err| SeitenwerkError::codec(format!("watermark content: {err}")))
}

/// Draw `watermark` as Helvetica text on every page.
#[instrument(skip(document, config), fields(pages = document.page_count(), position = ?watermark.position))]
pub fn text_watermark(document: &Document, watermark: &TextWatermark, config: &PipelineConfig) -> Result<NamedOutput> {
    require_unlocked(document, "text-watermark")?;
    require_pages(document, "text-watermark")?;
    check_opacity(watermark.opacity)?;
    if watermark.font_size <= 0.0 {
        return Err(SeitenwerkError::invalid(format!(
            "font size {} must be positive",
            watermark.font_size
        )));
    }
    if watermark.text.trim().is_empty() {
        return Err(SeitenwerkError::invalid("watermark text is empty"));
    }

    let opacity = watermark.opacity;
    let color = watermark.color.rgb().map(|c| c * opacity + (1.0 - opacity));
    let text = win_ansi(&watermark.text);
    let size = watermark.font_size;
    let (sin, cos) = watermark.rotation.to_radians().sin_cos();
    let veil = (opacity < VEIL_OPACITY).then(|| 0.3 * (1.0 - opacity));

    let bytes = stamp_pages(document, "text-watermark", |working, page_ids| {
        let mut font = Dictionary::new();
        font.set("Type", name("Font"));
        font.set("Subtype", name("Type1"));
        font.set("BaseFont", name("Helvetica"));
        font.set("Encoding", name("WinAnsiEncoding"));
        let font_id = working.add_object(font);
        let veil_state = veil.map(|alpha| {
            let mut state = Dictionary::new();
            state.set("Type", name("ExtGState"));
            state.set("ca", real(alpha));
            working.add_object(state)
        });

        for &page_id in page_ids {
            let [x0, y0, x1, y1] = media_box(working, page_id);
            let (x, y) = text_anchor(
                watermark.position,
                x1 - x0,
                y1 - y0,
                config.watermark_margin,
                watermark.x_offset,
                watermark.y_offset,
            );
            let (x, y) = (x + x0, y + y0);

            own_resources(working, page_id, &[b"Font", b"ExtGState"])?;
            let font_name = add_resource(working, page_id, b"Font", "WmF", Object::Reference(font_id))?;
            let mut operations = vec![
                Operation::new("q", vec![]),
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec![Object::Name(font_name), real(size)]),
                Operation::new("rg", color.iter().map(|&c| real(c)).collect()),
                Operation::new("Tm", vec![real(cos), real(sin), real(-sin), real(cos), real(x), real(y)]),
                Operation::new("Tj", vec![Object::String(text.clone(), StringFormat::Literal)]),
                Operation::new("ET", vec![]),
            ];
            if let Some(state_id) = veil_state {
                let state_name = add_resource(working, page_id, b"ExtGState", "WmGS", Object::Reference(state_id))?;
                let box_width = watermark.text.chars().count() as f32 * size * 0.6;
                let box_height = size * 1.2;
                operations.extend([
                    Operation::new("gs", vec![Object::Name(state_name)]),
                    Operation::new("rg", vec![real(1.0), real(1.0), real(1.0)]),
                    Operation::new(
                        "re",
                        vec![
                            real(x - box_width / 2.0),
                            real(y - box_height / 2.0),
                            real(box_width),
                            real(box_height),
                        ],
                    ),
                    Operation::new("f", vec![]),
                ]);
            }
            operations.push(Operation::new("Q", vec![]));
            overlay_content(working, page_id, encode(operations)?)?;
            debug!(page_id = ?page_id, x, y, "Text watermark placed");
        }
        Ok(())
    })?;
    info!(output_bytes = bytes.len(), "Text watermark applied");
    Ok(NamedOutput::pdf(OUTPUT_NAME, bytes))
}

/// Draw `watermark.image` on every page, scaled and faded.
#[instrument(skip(document, watermark, config), fields(pages = document.page_count(), position = ?watermark.position))]
pub fn image_watermark(document: &Document, watermark: &ImageWatermark, config: &PipelineConfig) -> Result<NamedOutput> {
    require_unlocked(document, "image-watermark")?;
    require_pages(document, "image-watermark")?;
    check_opacity(watermark.opacity)?;
    if watermark.scale <= 0.0 {
        return Err(SeitenwerkError::invalid(format!("scale {} must be positive", watermark.scale)));
    }
    let mut stamp = ImageProcessor::from_bytes(&watermark.image)
        .map_err(|err| SeitenwerkError::invalid(format!("watermark image cannot be decoded: {err}")))?
        .scale(watermark.scale);
    if watermark.opacity < 1.0 {
        stamp = stamp.multiply_alpha(watermark.opacity);
    }
    let rgba = stamp.into_dynamic().to_rgba8();
    let (image_width, image_height) = (rgba.width() as f32, rgba.height() as f32);

    let bytes = stamp_pages(document, "image-watermark", |working, page_ids| {
        let image_id = add_rgba_xobject(working, &rgba)?;
        for &page_id in page_ids {
            let [x0, y0, x1, y1] = media_box(working, page_id);
            let (x, y) = image_origin(
                watermark.position,
                (x1 - x0, y1 - y0),
                (image_width, image_height),
                config.watermark_margin,
                watermark.x_offset,
                watermark.y_offset,
            );
            own_resources(working, page_id, &[b"XObject"])?;
            let image_name = add_resource(working, page_id, b"XObject", "WmIm", Object::Reference(image_id))?;
            let operations = vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        real(image_width),
                        real(0.0),
                        real(0.0),
                        real(image_height),
                        real(x + x0),
                        real(y + y0),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(image_name)]),
                Operation::new("Q", vec![]),
            ];
            overlay_content(working, page_id, encode(operations)?)?;
        }
        Ok(())
    })?;
    info!(image_width, image_height, output_bytes = bytes.len(), "Image watermark applied");
    Ok(NamedOutput::pdf(OUTPUT_NAME, bytes))
}
