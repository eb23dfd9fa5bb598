// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Built-in renderer that composites a page's image XObjects onto a white
// canvas. Vector graphics and text are not drawn, which is exactly what
// scanned pages need and a usable fallback for everything else.

use std::collections::HashMap;

use image::{DynamicImage, Rgb, RgbImage, RgbaImage};
use lopdf::content::Content;
use lopdf::{Dictionary, Object, ObjectId};
use seitenwerk_core::error::{Result, SeitenwerkError};
use tracing::{debug, instrument, warn};

use super::{PageRenderer, PageSink};
use crate::image::ImageProcessor;
use crate::pdf::Document;
use crate::pdf::images::decode_image;
use crate::pdf::objects::{media_box, name_of, number, page_resources, resolve_dict};

const MAX_FORM_DEPTH: usize = 8;
/// Longest canvas side; larger requests are clamped to keep memory bounded.
const MAX_CANVAS_SIDE: f32 = 20_000.0;

/// Affine matrix `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f32; 6]);

impl Matrix {
    fn from_operands(operands: &[Object]) -> Option<Self> {
        let values: Vec<f32> = operands.iter().filter_map(number).collect();
        (values.len() == 6).then(|| Self([values[0], values[1], values[2], values[3], values[4], values[5]]))
    }

    /// `self` applied first, then `other`.
    fn then(&self, other: &Matrix) -> Matrix {
        let [a, b, c, d, e, f] = self.0;
        let [na, nb, nc, nd, ne, nf] = other.0;
        Matrix([
            a * na + b * nc,
            a * nb + b * nd,
            c * na + d * nc,
            c * nb + d * nd,
            e * na + f * nc + ne,
            e * nb + f * nd + nf,
        ])
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    fn invert(&self) -> Option<Matrix> {
        let [a, b, c, d, e, f] = self.0;
        let det = a * d - b * c;
        if det.abs() < 1e-9 {
            return None;
        }
        Some(Matrix([
            d / det,
            -b / det,
            -c / det,
            a / det,
            (c * f - d * e) / det,
            (b * e - a * f) / det,
        ]))
    }
}

/// Composites embedded images at their placed position and scale.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageLayerRenderer;

struct Compositor<'a> {
    document: &'a lopdf::Document,
    canvas: RgbImage,
    decoded: HashMap<ObjectId, Option<DynamicImage>>,
    drawn: usize,
}

impl<'a> Compositor<'a> {
    fn run(&mut self, content: &[u8], resources: Option<&'a Dictionary>, base: Matrix, depth: usize) {
        let operations = match Content::decode(content) {
            Ok(content) => content.operations,
            Err(err) => {
                warn!(%err, "Cannot decode content stream, skipping it");
                return;
            }
        };
        let mut ctm = base;
        let mut stack: Vec<Matrix> = Vec::new();
        for operation in operations {
            match operation.operator.as_str() {
                "q" => stack.push(ctm),
                "Q" => ctm = stack.pop().unwrap_or(base),
                "cm" => {
                    if let Some(matrix) = Matrix::from_operands(&operation.operands) {
                        ctm = matrix.then(&ctm);
                    }
                }
                "Do" => {
                    if let Some(name) = operation.operands.first().and_then(name_of) {
                        self.draw_xobject(name, resources, ctm, depth);
                    }
                }
                _ => {}
            }
        }
    }

    fn draw_xobject(&mut self, name: &[u8], resources: Option<&'a Dictionary>, ctm: Matrix, depth: usize) {
        let document = self.document;
        let Some(Object::Reference(id)) = resources
            .and_then(|res| res.get(b"XObject").ok())
            .and_then(|xobjects| resolve_dict(document, xobjects))
            .and_then(|xobjects| xobjects.get(name).ok())
        else {
            return;
        };
        let Ok(Object::Stream(stream)) = document.get_object(*id) else {
            return;
        };
        match stream.dict.get(b"Subtype").ok().and_then(name_of) {
            Some(b"Image") => {
                let decoded = self.decoded.entry(*id).or_insert_with(|| {
                    decode_image(document, stream)
                        .map_err(|err| warn!(?id, %err, "Skipping undecodable image"))
                        .ok()
                });
                if let Some(image) = decoded.clone() {
                    self.composite(&image, ctm);
                }
            }
            Some(b"Form") if depth < MAX_FORM_DEPTH => {
                let matrix = stream
                    .dict
                    .get(b"Matrix")
                    .ok()
                    .and_then(|m| match m {
                        Object::Array(items) => Matrix::from_operands(items),
                        _ => None,
                    })
                    .unwrap_or(Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]));
                let form_resources = stream
                    .dict
                    .get(b"Resources")
                    .ok()
                    .and_then(|r| resolve_dict(document, r))
                    .or(resources);
                let content = stream
                    .decompressed_content()
                    .unwrap_or_else(|_| stream.content.clone());
                self.run(&content, form_resources, matrix.then(&ctm), depth + 1);
            }
            _ => {}
        }
    }

    /// Map the image's unit square through `ctm` and sample it with nearest
    /// neighbour into the canvas.
    fn composite(&mut self, image: &DynamicImage, ctm: Matrix) {
        let Some(inverse) = ctm.invert() else {
            return;
        };
        let corners = [ctm.apply(0.0, 0.0), ctm.apply(1.0, 0.0), ctm.apply(0.0, 1.0), ctm.apply(1.0, 1.0)];
        let (cw, ch) = (self.canvas.width() as f32, self.canvas.height() as f32);
        let min_x = corners.iter().map(|p| p.0).fold(f32::INFINITY, f32::min).floor().max(0.0);
        let max_x = corners.iter().map(|p| p.0).fold(f32::NEG_INFINITY, f32::max).ceil().min(cw);
        let min_y = corners.iter().map(|p| p.1).fold(f32::INFINITY, f32::min).floor().max(0.0);
        let max_y = corners.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max).ceil().min(ch);
        if min_x >= max_x || min_y >= max_y {
            return;
        }

        let rgba: RgbaImage = image.to_rgba8();
        let (iw, ih) = (rgba.width() as f32, rgba.height() as f32);
        for py in min_y as u32..max_y as u32 {
            for px in min_x as u32..max_x as u32 {
                let (ux, uy) = inverse.apply(px as f32 + 0.5, py as f32 + 0.5);
                if !(0.0..1.0).contains(&ux) || !(0.0..1.0).contains(&uy) {
                    continue;
                }
                // Image row 0 is the top of the unit square.
                let sx = ((ux * iw) as u32).min(rgba.width() - 1);
                let sy = (((1.0 - uy) * ih) as u32).min(rgba.height() - 1);
                let [r, g, b, a] = rgba.get_pixel(sx, sy).0;
                let target = self.canvas.get_pixel_mut(px, py);
                if a == 255 {
                    *target = Rgb([r, g, b]);
                } else if a > 0 {
                    let alpha = a as f32 / 255.0;
                    for (dst, src) in target.0.iter_mut().zip([r, g, b]) {
                        *dst = (src as f32 * alpha + *dst as f32 * (1.0 - alpha)).round() as u8;
                    }
                }
            }
        }
        self.drawn += 1;
    }
}

impl ImageLayerRenderer {
    fn render_page(&self, document: &Document, number: u32, zoom: f32) -> Result<DynamicImage> {
        let page = document
            .page(number)
            .ok_or_else(|| SeitenwerkError::invalid(format!("page {number} does not exist")))?;
        let inner = document.inner();
        let page_id = page.handle.0;
        let [x0, _, _, y1] = media_box(inner, page_id);

        let width = (page.width * zoom).round().clamp(1.0, MAX_CANVAS_SIDE) as u32;
        let height = (page.height * zoom).round().clamp(1.0, MAX_CANVAS_SIDE) as u32;
        // User space (y up, origin at the media box corner) to canvas pixels.
        let base = Matrix([zoom, 0.0, 0.0, -zoom, -x0 * zoom, y1 * zoom]);

        let content = inner
            .get_page_content(page_id)
            .map_err(|err| SeitenwerkError::codec(format!("cannot read page {number} content: {}", err)))?;
        let mut compositor = Compositor {
            document: inner,
            canvas: RgbImage::from_pixel(width, height, Rgb([255, 255, 255])),
            decoded: HashMap::new(),
            drawn: 0,
        };
        compositor.run(&content, page_resources(inner, page_id), base, 0);
        debug!(page = number, width, height, images = compositor.drawn, "Page layers composited");

        Ok(ImageProcessor::from_dynamic(DynamicImage::ImageRgb8(compositor.canvas))
            .rotate_quarter(page.rotation)
            .into_dynamic())
    }
}

impl PageRenderer for ImageLayerRenderer {
    fn name(&self) -> &str {
        "image-layers"
    }

    fn draws_text(&self) -> bool {
        false
    }

    #[instrument(skip(self, document, sink), fields(pages = pages.len()))]
    fn render_pages(&self, document: &Document, pages: &[u32], zoom: f32, sink: &mut PageSink<'_>) -> Result<()> {
        if !(zoom.is_finite() && zoom > 0.0) {
            return Err(SeitenwerkError::invalid(format!("zoom {zoom} must be positive")));
        }
        if document.is_locked() {
            return Err(SeitenwerkError::invalid("document is encrypted; decrypt it first"));
        }
        for &number in pages {
            let raster = self.render_page(document, number, zoom)?;
            sink(number, raster)?;
        }
        Ok(())
    }
}
