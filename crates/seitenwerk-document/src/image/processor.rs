// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor: scale, quarter-turn rotation, alpha flattening and
// fading, OCR preparation and PNG/JPEG encoding. Operates on in-memory images
// using the `image` and `imageproc` crates.

use image::{DynamicImage, GrayImage, ImageFormat as Codec, Rgba, RgbaImage};
use imageproc::contrast::equalize_histogram;
use imageproc::filter::gaussian_blur_f32;
use seitenwerk_core::error::{Result, SeitenwerkError};
use seitenwerk_core::{ImageFormat, Rotation};
use tracing::{debug, instrument};

/// Image pipeline operating on a single in-memory image.
///
/// Each transformation consumes `self` and returns a new processor, so calls
/// chain:
///
/// ```ignore
/// let jpeg = ImageProcessor::from_dynamic(page)
///     .flatten_onto_white()
///     .to_jpeg_bytes(50)?;
/// ```
pub struct ImageProcessor {
    image: DynamicImage,
}

impl ImageProcessor {
    // -- Construction ---------------------------------------------------------

    /// Decode raw encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.is_empty() {
            return Err(SeitenwerkError::invalid("image is empty"));
        }
        let image = image::load_from_memory(data)
            .map_err(|err| SeitenwerkError::ImageError(format!("failed to decode image: {}", err)))?;
        debug!(width = image.width(), height = image.height(), "Image decoded from bytes");
        Ok(Self { image })
    }

    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    // -- Accessors ------------------------------------------------------------

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    pub fn has_alpha(&self) -> bool {
        self.image.color().has_alpha()
    }

    // -- Transformations ------------------------------------------------------

    /// Resize by `factor`, never below one pixel per side.
    pub fn scale(self, factor: f32) -> Self {
        if (factor - 1.0).abs() < f32::EPSILON {
            return self;
        }
        let width = ((self.image.width() as f32 * factor).round() as u32).max(1);
        let height = ((self.image.height() as f32 * factor).round() as u32).max(1);
        debug!(factor, width, height, "Scaling image");
        Self {
            image: self
                .image
                .resize_exact(width, height, image::imageops::FilterType::Triangle),
        }
    }

    /// Rotate clockwise by a quarter-turn multiple. Lossless.
    pub fn rotate_quarter(self, rotation: Rotation) -> Self {
        let image = match rotation {
            Rotation::Deg0 => self.image,
            Rotation::Deg90 => self.image.rotate90(),
            Rotation::Deg180 => self.image.rotate180(),
            Rotation::Deg270 => self.image.rotate270(),
        };
        Self { image }
    }

    /// Composite any alpha channel onto a white background.
    pub fn flatten_onto_white(self) -> Self {
        if !self.has_alpha() {
            return self;
        }
        let rgba = self.image.to_rgba8();
        let mut canvas = RgbaImage::from_pixel(rgba.width(), rgba.height(), Rgba([255, 255, 255, 255]));
        image::imageops::overlay(&mut canvas, &rgba, 0, 0);
        Self {
            image: DynamicImage::ImageRgb8(DynamicImage::ImageRgba8(canvas).to_rgb8()),
        }
    }

    /// Multiply every alpha value by `opacity` (clamped to `[0, 1]`).
    pub fn multiply_alpha(self, opacity: f32) -> Self {
        let opacity = opacity.clamp(0.0, 1.0);
        let mut rgba = self.image.to_rgba8();
        if opacity < 1.0 {
            for pixel in rgba.pixels_mut() {
                pixel.0[3] = (pixel.0[3] as f32 * opacity).round() as u8;
            }
        }
        Self {
            image: DynamicImage::ImageRgba8(rgba),
        }
    }

    /// Grayscale, histogram-equalise, then a light blur to suppress scan
    /// noise before recognition.
    #[instrument(skip(self), fields(width = self.width(), height = self.height()))]
    pub fn prepare_for_ocr(self) -> Self {
        let gray: GrayImage = self.flatten_onto_white().image.to_luma8();
        let equalized = equalize_histogram(&gray);
        let smoothed = gaussian_blur_f32(&equalized, 0.6);
        Self {
            image: DynamicImage::ImageLuma8(smoothed),
        }
    }

    // -- Output ---------------------------------------------------------------

    pub fn to_png_bytes(&self) -> Result<Vec<u8>> {
        let mut buffer = std::io::Cursor::new(Vec::new());
        self.image
            .write_to(&mut buffer, Codec::Png)
            .map_err(|err| SeitenwerkError::ImageError(format!("PNG encoding failed: {}", err)))?;
        Ok(buffer.into_inner())
    }

    /// Encode as baseline JPEG with quality 1-100. Alpha is dropped.
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let rgb = self.image.to_rgb8();
        let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        rgb.write_with_encoder(encoder)
            .map_err(|err| SeitenwerkError::ImageError(format!("JPEG encoding failed: {}", err)))?;
        Ok(buffer)
    }

    pub fn encode(&self, format: ImageFormat, jpeg_quality: u8) -> Result<Vec<u8>> {
        match format {
            ImageFormat::Png => self.to_png_bytes(),
            ImageFormat::Jpeg => self.to_jpeg_bytes(jpeg_quality),
        }
    }
}

/// True when `data` starts like a JPEG stream.
pub fn is_jpeg(data: &[u8]) -> bool {
    matches!(image::guess_format(data), Ok(Codec::Jpeg))
}
