// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Rasterize pages into images, and build documents back out of images.

use lopdf::{Dictionary, Object};
use seitenwerk_core::error::{Result, SeitenwerkError};
use seitenwerk_core::{ImageFormat, NamedOutput, OperationResult, Rotation};
use tracing::{debug, info, instrument, warn};

use super::{OpContext, require_pages, require_unlocked};
use crate::image::ImageProcessor;
use crate::image::processor::is_jpeg;
use crate::pdf::Document;
use crate::pdf::images::{jpeg_xobject, rgb_xobject};
use crate::pdf::objects::{add_page, new_document, save};
use crate::render::{all_pages, render_each};
use crate::strategy::StrategyChain;

pub const IMAGES_OUTPUT_NAME: &str = "images_to_pdf.pdf";

/// JPEG quality for rasterized pages.
const RASTER_JPEG_QUALITY: u8 = 90;

/// Render every page at `dpi` (default from config) into `page_{n}.{ext}`.
#[instrument(skip(ctx, document), fields(pages = document.page_count()))]
pub fn rasterize(
    ctx: &OpContext<'_>,
    document: &Document,
    format: ImageFormat,
    dpi: Option<u32>,
) -> Result<OperationResult> {
    require_unlocked(document, "rasterize")?;
    require_pages(document, "rasterize")?;
    let dpi = dpi.unwrap_or(ctx.config.default_dpi);
    if !(1..=ctx.config.max_dpi).contains(&dpi) {
        return Err(SeitenwerkError::invalid(format!(
            "dpi {dpi} is outside 1..={}",
            ctx.config.max_dpi
        )));
    }
    let zoom = dpi as f32 / 72.0;

    let outputs = render_each(
        ctx.renderers,
        "rasterize",
        document,
        &all_pages(document),
        zoom,
        |number, raster| {
            let bytes = ImageProcessor::from_dynamic(raster)
                .flatten_onto_white()
                .encode(format, RASTER_JPEG_QUALITY)?;
            debug!(page = number, bytes_len = bytes.len(), "Page encoded");
            Ok(NamedOutput::new(
                format!("page_{number}.{}", format.extension()),
                format.mime_type(),
                bytes,
            ))
        },
    )?;
    info!(pages = outputs.len(), dpi, "Rasterization complete");
    Ok(OperationResult::Multiple(outputs))
}

/// Build one page per image. `rotations[i]` applies to `images[i]`; missing
/// entries mean no rotation.
#[instrument(skip_all, fields(images = images.len()))]
pub fn derasterize(images: &[Vec<u8>], rotations: &[i64]) -> Result<NamedOutput> {
    let sources: Vec<(usize, &[u8], Rotation)> = images
        .iter()
        .enumerate()
        .filter_map(|(index, bytes)| {
            if bytes.is_empty() {
                warn!(image = index + 1, "Skipping empty image");
                return None;
            }
            let rotation = Rotation::normalize(rotations.get(index).copied().unwrap_or(0));
            Some((index, bytes.as_slice(), rotation))
        })
        .collect();
    if sources.is_empty() {
        return Err(SeitenwerkError::invalid("no valid images were provided"));
    }

    let unrotated = sources.iter().all(|(_, _, rotation)| *rotation == Rotation::Deg0);
    let mut chain = StrategyChain::new("derasterize");
    if unrotated {
        chain = chain.strategy("native-resolution", || native_pages(&sources));
    }
    let bytes = chain.strategy("rotated-pages", || rotated_pages(&sources)).run()?;
    info!(pages = sources.len(), output_bytes = bytes.len(), "Images converted to PDF");
    Ok(NamedOutput::pdf(IMAGES_OUTPUT_NAME, bytes))
}

/// Image placement for a clockwise `rotation`, mapping the unit square onto
/// the rotated page whose box is `width x height` before rotation.
fn placement(rotation: Rotation, width: f32, height: f32) -> [f32; 6] {
    match rotation {
        Rotation::Deg0 => [width, 0.0, 0.0, height, 0.0, 0.0],
        Rotation::Deg90 => [0.0, -width, height, 0.0, 0.0, width],
        Rotation::Deg180 => [-width, 0.0, 0.0, -height, width, height],
        Rotation::Deg270 => [0.0, width, -height, 0.0, height, 0.0],
    }
}

fn image_page(document: &mut lopdf::Document, pages_id: lopdf::ObjectId, image: lopdf::Stream, size: (f32, f32), matrix: [f32; 6]) {
    let image_id = document.add_object(image);
    let mut xobjects = Dictionary::new();
    xobjects.set("Im0", Object::Reference(image_id));
    let mut resources = Dictionary::new();
    resources.set("XObject", Object::Dictionary(xobjects));
    let [a, b, c, d, e, f] = matrix;
    let content = format!("q {a} {b} {c} {d} {e} {f} cm /Im0 Do Q");
    add_page(document, pages_id, size.0, size.1, resources, content.into_bytes());
}

/// Pages sized to the image in points; JPEGs are embedded without
/// re-encoding. Any undecodable image fails the strategy.
fn native_pages(sources: &[(usize, &[u8], Rotation)]) -> Result<Vec<u8>> {
    let (mut document, pages_id) = new_document();
    for &(index, bytes, _) in sources {
        let decoded = ImageProcessor::from_bytes(bytes)
            .map_err(|err| SeitenwerkError::invalid(format!("image #{} cannot be decoded: {}", index + 1, err)))?;
        let (width, height) = (decoded.width(), decoded.height());
        let stream = if is_jpeg(bytes) {
            let gray = !decoded.as_dynamic().color().has_color();
            jpeg_xobject(bytes.to_vec(), width, height, gray)
        } else {
            rgb_xobject(&decoded.flatten_onto_white().into_dynamic().to_rgb8())?
        };
        let size = (width as f32, height as f32);
        image_page(&mut document, pages_id, stream, size, placement(Rotation::Deg0, size.0, size.1));
    }
    save(&mut document)
}

/// Pages sized to the rotated image box. Undecodable images are skipped.
fn rotated_pages(sources: &[(usize, &[u8], Rotation)]) -> Result<Vec<u8>> {
    let (mut document, pages_id) = new_document();
    let mut added = 0usize;
    for &(index, bytes, rotation) in sources {
        let decoded = match ImageProcessor::from_bytes(bytes) {
            Ok(decoded) => decoded.flatten_onto_white(),
            Err(err) => {
                warn!(image = index + 1, %err, "Skipping undecodable image");
                continue;
            }
        };
        let (width, height) = (decoded.width() as f32, decoded.height() as f32);
        let size = if rotation.is_sideways() { (height, width) } else { (width, height) };
        let stream = rgb_xobject(&decoded.into_dynamic().to_rgb8())?;
        image_page(&mut document, pages_id, stream, size, placement(rotation, width, height));
        added += 1;
    }
    if added == 0 {
        return Err(SeitenwerkError::invalid("no valid images could be processed"));
    }
    save(&mut document)
}
