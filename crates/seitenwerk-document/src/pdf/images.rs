// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Embedded image XObjects: discovery through page and form resources,
// decoding into `image::DynamicImage`, and building new image XObjects.

use std::collections::HashSet;

use image::{DynamicImage, GenericImageView, GrayImage, ImageFormat, RgbImage, RgbaImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use seitenwerk_core::error::{Result, SeitenwerkError};
use sha2::{Digest, Sha256};

use super::objects::{name, name_of, number, page_resources, resolve, resolve_dict};

const MAX_FORM_DEPTH: usize = 12;

// -- Discovery ----------------------------------------------------------------

fn is_subtype(dict: &Dictionary, subtype: &[u8]) -> bool {
    dict.get(b"Subtype").ok().and_then(name_of) == Some(subtype)
}

fn collect_images(
    document: &Document,
    resources: &Dictionary,
    depth: usize,
    seen: &mut HashSet<ObjectId>,
    found: &mut Vec<ObjectId>,
) {
    if depth > MAX_FORM_DEPTH {
        return;
    }
    let Some(xobjects) = resources
        .get(b"XObject")
        .ok()
        .and_then(|object| resolve_dict(document, object))
    else {
        return;
    };
    for (_, value) in xobjects.iter() {
        let Object::Reference(id) = value else {
            continue;
        };
        if !seen.insert(*id) {
            continue;
        }
        let Ok(Object::Stream(stream)) = document.get_object(*id) else {
            continue;
        };
        if is_subtype(&stream.dict, b"Image") {
            found.push(*id);
        } else if is_subtype(&stream.dict, b"Form")
            && let Some(form_resources) = stream
                .dict
                .get(b"Resources")
                .ok()
                .and_then(|object| resolve_dict(document, object))
        {
            collect_images(document, form_resources, depth + 1, seen, found);
        }
    }
}

/// Image XObjects reachable from the page, including through form XObjects.
pub(crate) fn page_images(document: &Document, page_id: ObjectId) -> Vec<ObjectId> {
    let mut found = Vec::new();
    if let Some(resources) = page_resources(document, page_id) {
        collect_images(document, resources, 0, &mut HashSet::new(), &mut found);
    }
    found
}

pub(crate) fn page_has_images(document: &Document, page_id: ObjectId) -> bool {
    !page_images(document, page_id).is_empty()
}

/// SHA-256 of each embedded image stream's raw bytes, in discovery order.
pub(crate) fn page_image_digests(document: &Document, page_id: ObjectId) -> Vec<[u8; 32]> {
    page_images(document, page_id)
        .into_iter()
        .filter_map(|id| match document.get_object(id) {
            Ok(Object::Stream(stream)) => Some(Sha256::digest(&stream.content).into()),
            _ => None,
        })
        .collect()
}

// -- Decoding -----------------------------------------------------------------

fn filters(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(filter)) => vec![filter.clone()],
        Ok(Object::Array(items)) => items.iter().filter_map(name_of).map(<[u8]>::to_vec).collect(),
        _ => Vec::new(),
    }
}

fn dimension(document: &Document, dict: &Dictionary, key: &[u8]) -> Result<u32> {
    dict.get(key)
        .ok()
        .and_then(|object| resolve(document, object))
        .and_then(number)
        .filter(|value| *value >= 1.0)
        .map(|value| value as u32)
        .ok_or_else(|| {
            SeitenwerkError::ImageError(format!(
                "image has no valid /{}",
                String::from_utf8_lossy(key)
            ))
        })
}

/// How samples map to RGB.
enum ColorModel {
    Gray,
    Rgb,
    Cmyk,
    Indexed { base: Box<ColorModel>, palette: Vec<u8> },
}

impl ColorModel {
    fn components(&self) -> usize {
        match self {
            Self::Gray | Self::Indexed { .. } => 1,
            Self::Rgb => 3,
            Self::Cmyk => 4,
        }
    }

    fn to_rgb(&self, samples: &[u8]) -> [u8; 3] {
        match self {
            Self::Gray => [samples[0]; 3],
            Self::Rgb => [samples[0], samples[1], samples[2]],
            Self::Cmyk => {
                let k = 1.0 - samples[3] as f32 / 255.0;
                let channel = |c: u8| ((1.0 - c as f32 / 255.0) * k * 255.0).round() as u8;
                [channel(samples[0]), channel(samples[1]), channel(samples[2])]
            }
            Self::Indexed { base, palette } => {
                let width = base.components();
                let start = samples[0] as usize * width;
                match palette.get(start..start + width) {
                    Some(entry) => base.to_rgb(entry),
                    None => [0, 0, 0],
                }
            }
        }
    }
}

fn color_model(document: &Document, object: Option<&Object>) -> Result<ColorModel> {
    let Some(object) = object.and_then(|o| resolve(document, o)) else {
        return Ok(ColorModel::Gray);
    };
    match object {
        Object::Name(space) => match space.as_slice() {
            b"DeviceGray" | b"CalGray" | b"G" => Ok(ColorModel::Gray),
            b"DeviceRGB" | b"CalRGB" | b"RGB" => Ok(ColorModel::Rgb),
            b"DeviceCMYK" | b"CMYK" => Ok(ColorModel::Cmyk),
            other => Err(SeitenwerkError::ImageError(format!(
                "unsupported colour space {}",
                String::from_utf8_lossy(other)
            ))),
        },
        Object::Array(items) => {
            let family = items.first().and_then(name_of).unwrap_or_default();
            match family {
                b"ICCBased" => {
                    let n = items
                        .get(1)
                        .and_then(|o| resolve_dict(document, o))
                        .and_then(|dict| dict.get(b"N").ok())
                        .and_then(number)
                        .unwrap_or(3.0) as usize;
                    Ok(match n {
                        1 => ColorModel::Gray,
                        4 => ColorModel::Cmyk,
                        _ => ColorModel::Rgb,
                    })
                }
                b"CalRGB" | b"Lab" => Ok(ColorModel::Rgb),
                b"CalGray" => Ok(ColorModel::Gray),
                b"Indexed" | b"I" => {
                    let base = color_model(document, items.get(1))?;
                    let palette = match items.get(3).and_then(|o| resolve(document, o)) {
                        Some(Object::String(bytes, _)) => bytes.clone(),
                        Some(Object::Stream(stream)) => stream
                            .decompressed_content()
                            .unwrap_or_else(|_| stream.content.clone()),
                        _ => Vec::new(),
                    };
                    Ok(ColorModel::Indexed {
                        base: Box::new(base),
                        palette,
                    })
                }
                // Separation and DeviceN fall back to their alternate space.
                b"Separation" | b"DeviceN" => color_model(document, items.get(2)),
                other => Err(SeitenwerkError::ImageError(format!(
                    "unsupported colour space family {}",
                    String::from_utf8_lossy(other)
                ))),
            }
        }
        _ => Ok(ColorModel::Gray),
    }
}

/// Expand packed samples of `bits` each to one byte per sample.
fn unpack_samples(data: &[u8], width: usize, height: usize, components: usize, bits: u8) -> Result<Vec<u8>> {
    let per_row = width * components;
    match bits {
        8 => {
            let needed = per_row * height;
            if data.len() < needed {
                return Err(SeitenwerkError::ImageError(format!(
                    "image data too short: {} bytes, expected {}",
                    data.len(),
                    needed
                )));
            }
            Ok(data[..needed].to_vec())
        }
        16 => Ok(data.chunks_exact(2).take(per_row * height).map(|pair| pair[0]).collect()),
        1 | 2 | 4 => {
            let row_bytes = (per_row * bits as usize).div_ceil(8);
            let max = (1u16 << bits) - 1;
            let mut samples = Vec::with_capacity(per_row * height);
            for row in data.chunks(row_bytes).take(height) {
                for index in 0..per_row {
                    let bit = index * bits as usize;
                    let byte = row.get(bit / 8).copied().unwrap_or(0);
                    let shift = 8 - bits as usize - bit % 8;
                    let value = (byte >> shift) as u16 & max;
                    samples.push((value * 255 / max) as u8);
                }
            }
            Ok(samples)
        }
        other => Err(SeitenwerkError::ImageError(format!(
            "unsupported bits per component: {other}"
        ))),
    }
}

fn decode_raw(document: &Document, stream: &Stream) -> Result<DynamicImage> {
    let dict = &stream.dict;
    let width = dimension(document, dict, b"Width")?;
    let height = dimension(document, dict, b"Height")?;
    let chain = filters(dict);

    if chain.iter().any(|f| f == b"JPXDecode") {
        return Err(SeitenwerkError::ImageError(
            "JPEG 2000 images are not supported".into(),
        ));
    }
    if chain.iter().any(|f| f == b"DCTDecode" || f == b"DCT") {
        return image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
            .map_err(|err| SeitenwerkError::ImageError(format!("failed to decode JPEG image: {}", err)));
    }

    let data = if chain.is_empty() {
        stream.content.clone()
    } else {
        stream
            .decompressed_content()
            .map_err(|err| SeitenwerkError::ImageError(format!("failed to decompress image: {}", err)))?
    };

    let is_mask = matches!(dict.get(b"ImageMask"), Ok(Object::Boolean(true)));
    let model = if is_mask {
        ColorModel::Gray
    } else {
        color_model(document, dict.get(b"ColorSpace").ok())?
    };
    let bits = if is_mask {
        1
    } else {
        dict.get(b"BitsPerComponent").ok().and_then(number).unwrap_or(8.0) as u8
    };

    let components = model.components();
    let samples = if let ColorModel::Indexed { .. } = model {
        // Palette indices must stay raw, not rescaled to 0..=255.
        raw_indices(&data, width as usize, height as usize, bits)?
    } else {
        unpack_samples(&data, width as usize, height as usize, components, bits)?
    };

    let mut rgb = RgbImage::new(width, height);
    for (pixel, chunk) in rgb.pixels_mut().zip(samples.chunks_exact(components)) {
        pixel.0 = model.to_rgb(chunk);
    }
    Ok(DynamicImage::ImageRgb8(rgb))
}

fn raw_indices(data: &[u8], width: usize, height: usize, bits: u8) -> Result<Vec<u8>> {
    if bits == 8 {
        return unpack_samples(data, width, height, 1, 8);
    }
    if !matches!(bits, 1 | 2 | 4) {
        return Err(SeitenwerkError::ImageError(format!(
            "unsupported palette depth: {bits}"
        )));
    }
    let row_bytes = (width * bits as usize).div_ceil(8);
    let mask = (1u8 << bits) - 1;
    let mut indices = Vec::with_capacity(width * height);
    for row in data.chunks(row_bytes).take(height) {
        for index in 0..width {
            let bit = index * bits as usize;
            let byte = row.get(bit / 8).copied().unwrap_or(0);
            indices.push((byte >> (8 - bits as usize - bit % 8)) & mask);
        }
    }
    Ok(indices)
}

/// Decode an image XObject, applying its `/SMask` as alpha when present.
pub(crate) fn decode_image(document: &Document, stream: &Stream) -> Result<DynamicImage> {
    let base = decode_raw(document, stream)?;
    let smask = stream
        .dict
        .get(b"SMask")
        .ok()
        .and_then(|object| resolve(document, object))
        .and_then(|object| match object {
            Object::Stream(mask) => Some(mask),
            _ => None,
        });
    let Some(mask) = smask else {
        return Ok(base);
    };

    let mut alpha: GrayImage = decode_raw(document, mask)?.to_luma8();
    if alpha.dimensions() != base.dimensions() {
        alpha = image::imageops::resize(
            &alpha,
            base.width(),
            base.height(),
            image::imageops::FilterType::Triangle,
        );
    }
    let mut rgba: RgbaImage = base.to_rgba8();
    for (pixel, a) in rgba.pixels_mut().zip(alpha.pixels()) {
        pixel.0[3] = a.0[0];
    }
    Ok(DynamicImage::ImageRgba8(rgba))
}

pub(crate) fn decode_image_object(document: &Document, id: ObjectId) -> Result<DynamicImage> {
    match document.get_object(id) {
        Ok(Object::Stream(stream)) => decode_image(document, stream),
        _ => Err(SeitenwerkError::ImageError(format!(
            "object {:?} is not an image stream",
            id
        ))),
    }
}

// -- Building -----------------------------------------------------------------

fn image_dict(width: u32, height: u32, color_space: &str) -> Dictionary {
    let mut dict = Dictionary::new();
    dict.set("Type", name("XObject"));
    dict.set("Subtype", name("Image"));
    dict.set("Width", Object::Integer(width as i64));
    dict.set("Height", Object::Integer(height as i64));
    dict.set("ColorSpace", name(color_space));
    dict.set("BitsPerComponent", Object::Integer(8));
    dict
}

/// Embed encoded JPEG bytes verbatim as a DCTDecode image.
pub(crate) fn jpeg_xobject(jpeg: Vec<u8>, width: u32, height: u32, gray: bool) -> Stream {
    let mut dict = image_dict(width, height, if gray { "DeviceGray" } else { "DeviceRGB" });
    dict.set("Filter", name("DCTDecode"));
    let mut stream = Stream::new(dict, jpeg);
    stream.allows_compression = false;
    stream
}

fn flate_stream(dict: Dictionary, data: Vec<u8>) -> Result<Stream> {
    let mut stream = Stream::new(dict, data);
    stream
        .compress()
        .map_err(|err| SeitenwerkError::codec(format!("failed to compress image stream: {}", err)))?;
    Ok(stream)
}

/// Flate-compressed DeviceRGB image.
pub(crate) fn rgb_xobject(image: &RgbImage) -> Result<Stream> {
    let (width, height) = image.dimensions();
    flate_stream(image_dict(width, height, "DeviceRGB"), image.as_raw().clone())
}

/// Add an RGB image with its alpha channel as a separate `/SMask`, returning
/// the id of the colour image.
pub(crate) fn add_rgba_xobject(document: &mut Document, image: &RgbaImage) -> Result<ObjectId> {
    let (width, height) = image.dimensions();
    let mut colour = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for pixel in image.pixels() {
        let [r, g, b, a] = pixel.0;
        colour.extend_from_slice(&[r, g, b]);
        alpha.push(a);
    }

    let mask_id = document.add_object(flate_stream(image_dict(width, height, "DeviceGray"), alpha)?);
    let mut dict = image_dict(width, height, "DeviceRGB");
    dict.set("SMask", Object::Reference(mask_id));
    Ok(document.add_object(flate_stream(dict, colour)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, PageSpec};
    use crate::pdf::objects::load;
    use image::Rgba;

    #[test]
    fn finds_images_and_decodes_raw_rgb() {
        let bytes = fixtures::pdf(&[PageSpec::image(8, 6, 3), PageSpec::text("no images")]);
        let document = load(&bytes).unwrap();
        let pages = document.get_pages();
        let image_page = pages[&1];
        let text_page = pages[&2];

        assert!(page_has_images(&document, image_page));
        assert!(!page_has_images(&document, text_page));

        let ids = page_images(&document, image_page);
        assert_eq!(ids.len(), 1);
        let decoded = decode_image_object(&document, ids[0]).unwrap();
        assert_eq!(decoded.to_rgb8(), fixtures::noise_image(8, 6, 3));
    }

    #[test]
    fn digests_differ_between_distinct_images() {
        let bytes = fixtures::pdf(&[PageSpec::image(4, 4, 1), PageSpec::image(4, 4, 2)]);
        let document = load(&bytes).unwrap();
        let pages = document.get_pages();
        let a = page_image_digests(&document, pages[&1]);
        let b = page_image_digests(&document, pages[&2]);
        assert_eq!(a.len(), 1);
        assert_ne!(a, b);
    }

    #[test]
    fn rgba_xobject_round_trips_alpha() {
        let mut document = Document::with_version("1.7");
        let image = RgbaImage::from_pixel(3, 2, Rgba([10, 20, 30, 77]));
        let id = add_rgba_xobject(&mut document, &image).unwrap();
        let decoded = decode_image_object(&document, id).unwrap().to_rgba8();
        assert_eq!(decoded.get_pixel(1, 1).0, [10, 20, 30, 77]);
    }

    #[test]
    fn smaller_soft_mask_is_stretched_to_the_image() {
        let mut document = Document::with_version("1.7");
        let mask = flate_stream(image_dict(2, 1, "DeviceGray"), vec![200, 200]).unwrap();
        let mask_id = document.add_object(mask);
        let mut dict = image_dict(4, 2, "DeviceRGB");
        dict.set("SMask", Object::Reference(mask_id));
        let id = document.add_object(flate_stream(dict, vec![90; 4 * 2 * 3]).unwrap());

        let decoded = decode_image_object(&document, id).unwrap();
        assert_eq!(decoded.dimensions(), (4, 2));
        assert!(decoded.to_rgba8().pixels().all(|p| p.0 == [90, 90, 90, 200]));
    }

    #[test]
    fn one_bit_gray_and_cmyk_samples() {
        assert_eq!(unpack_samples(&[0b1010_0000], 3, 1, 1, 1).unwrap(), vec![255, 0, 255]);
        let white = ColorModel::Cmyk.to_rgb(&[0, 0, 0, 0]);
        let black = ColorModel::Cmyk.to_rgb(&[0, 0, 0, 255]);
        assert_eq!(white, [255, 255, 255]);
        assert_eq!(black, [0, 0, 0]);
    }

    #[test]
    fn indexed_palette_lookup() {
        let model = ColorModel::Indexed {
            base: Box::new(ColorModel::Rgb),
            palette: vec![0, 0, 0, 200, 100, 50],
        };
        assert_eq!(model.to_rgb(&[1]), [200, 100, 50]);
        assert_eq!(model.to_rgb(&[9]), [0, 0, 0]);
    }
}
