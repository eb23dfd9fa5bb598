// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Test fixtures: small PDFs and images built directly with lopdf and image.

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};

use crate::pdf::objects::{name, new_document, real, save};

/// Description of one fixture page.
#[derive(Debug, Clone)]
pub(crate) struct PageSpec {
    pub text: Option<String>,
    /// Full-page image `(pixel width, pixel height, seed)`.
    pub image: Option<(u32, u32, u32)>,
    pub rotate: Option<i64>,
    pub width: f32,
    pub height: f32,
}

impl PageSpec {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            image: None,
            rotate: None,
            width: 612.0,
            height: 792.0,
        }
    }

    pub fn image(width: u32, height: u32, seed: u32) -> Self {
        Self {
            text: None,
            image: Some((width, height, seed)),
            rotate: None,
            width: width as f32,
            height: height as f32,
        }
    }

    pub fn blank() -> Self {
        Self {
            text: None,
            image: None,
            rotate: None,
            width: 612.0,
            height: 792.0,
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn rotated(mut self, degrees: i64) -> Self {
        self.rotate = Some(degrees);
        self
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('(', "\\(").replace(')', "\\)")
}

/// Deterministic pseudo-random RGB noise, incompressible enough to keep the
/// byte size predictable.
pub(crate) fn noise_image(width: u32, height: u32, seed: u32) -> RgbImage {
    let mut state = seed.wrapping_mul(2_654_435_761).wrapping_add(1);
    RgbImage::from_fn(width, height, |_, _| {
        state = state.wrapping_mul(1_103_515_245).wrapping_add(12_345);
        let bytes = state.to_be_bytes();
        Rgb([bytes[0], bytes[1], bytes[2]])
    })
}

fn build(specs: &[PageSpec]) -> (Document, Vec<ObjectId>) {
    let (mut document, pages_id) = new_document();

    let mut font = Dictionary::new();
    font.set("Type", name("Font"));
    font.set("Subtype", name("Type1"));
    font.set("BaseFont", name("Helvetica"));
    let font_id = document.add_object(font);

    let mut page_ids = Vec::new();
    for spec in specs {
        let mut fonts = Dictionary::new();
        fonts.set("F1", Object::Reference(font_id));
        let mut resources = Dictionary::new();
        resources.set("Font", Object::Dictionary(fonts));

        let mut content = String::new();
        if let Some((w, h, seed)) = spec.image {
            let pixels = noise_image(w, h, seed).into_raw();
            let mut dict = Dictionary::new();
            dict.set("Type", name("XObject"));
            dict.set("Subtype", name("Image"));
            dict.set("Width", Object::Integer(w as i64));
            dict.set("Height", Object::Integer(h as i64));
            dict.set("ColorSpace", name("DeviceRGB"));
            dict.set("BitsPerComponent", Object::Integer(8));
            let mut stream = Stream::new(dict, pixels);
            stream.allows_compression = false;
            let image_id = document.add_object(stream);
            let mut xobjects = Dictionary::new();
            xobjects.set("Im1", Object::Reference(image_id));
            resources.set("XObject", Object::Dictionary(xobjects));
            content.push_str(&format!(
                "q {} 0 0 {} 0 0 cm /Im1 Do Q\n",
                spec.width, spec.height
            ));
        }
        if let Some(text) = &spec.text {
            content.push_str("BT /F1 12 Tf 14 TL 72 720 Td\n");
            for line in text.lines() {
                content.push_str(&format!("({}) Tj T*\n", escape(line)));
            }
            content.push_str("ET\n");
        }

        let content_id = document.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
        let mut page = Dictionary::new();
        page.set("Type", name("Page"));
        page.set(
            "MediaBox",
            Object::Array(vec![real(0.0), real(0.0), real(spec.width), real(spec.height)]),
        );
        page.set("Resources", Object::Dictionary(resources));
        page.set("Contents", Object::Reference(content_id));
        if let Some(degrees) = spec.rotate {
            page.set("Rotate", Object::Integer(degrees));
        }
        let page_id = document.add_object(page);
        crate::pdf::objects::append_page(&mut document, pages_id, page_id);
        page_ids.push(page_id);
    }
    (document, page_ids)
}

pub(crate) fn pdf(specs: &[PageSpec]) -> Vec<u8> {
    let (mut document, _) = build(specs);
    save(&mut document).expect("fixture PDF must serialise")
}

/// One text page per entry.
pub(crate) fn text_pdf(pages: &[&str]) -> Vec<u8> {
    let specs: Vec<PageSpec> = pages.iter().map(|text| PageSpec::text(*text)).collect();
    pdf(&specs)
}

/// Roughly `chars` characters of prose, split over lines of 50.
pub(crate) fn prose(chars: usize, seed: char) -> String {
    let word = format!("{seed}orem ipsum ");
    let mut text = String::new();
    while text.len() < chars {
        text.push_str(&word);
        if text.len() % 50 < word.len() {
            text.push('\n');
        }
    }
    text.truncate(chars);
    text
}

/// A single page whose MediaBox, Rotate and Resources live on `/Pages`.
pub(crate) fn inherited_attributes_pdf() -> Vec<u8> {
    let (mut document, pages_id) = new_document();
    let mut font = Dictionary::new();
    font.set("Type", name("Font"));
    font.set("Subtype", name("Type1"));
    font.set("BaseFont", name("Helvetica"));
    let font_id = document.add_object(font);
    let mut fonts = Dictionary::new();
    fonts.set("F1", Object::Reference(font_id));
    let mut resources = Dictionary::new();
    resources.set("Font", Object::Dictionary(fonts));

    if let Ok(Object::Dictionary(pages)) = document.get_object_mut(pages_id) {
        pages.set(
            "MediaBox",
            Object::Array(vec![real(0.0), real(0.0), real(300.0), real(400.0)]),
        );
        pages.set("Rotate", Object::Integer(90));
        pages.set("Resources", Object::Dictionary(resources));
    }

    let content_id = document.add_object(Stream::new(
        Dictionary::new(),
        b"BT /F1 12 Tf 20 300 Td (inherited) Tj ET".to_vec(),
    ));
    let mut page = Dictionary::new();
    page.set("Type", name("Page"));
    page.set("Contents", Object::Reference(content_id));
    let page_id = document.add_object(page);
    crate::pdf::objects::append_page(&mut document, pages_id, page_id);
    save(&mut document).expect("fixture PDF must serialise")
}

/// Text pages plus a flat outline of `(title, 0-based page index)` entries.
pub(crate) fn outline_pdf(pages: &[&str], outline: &[(&str, usize)]) -> Vec<u8> {
    let specs: Vec<PageSpec> = pages.iter().map(|text| PageSpec::text(*text)).collect();
    let (mut document, page_ids) = build(&specs);

    let outlines_id = document.new_object_id();
    let item_ids: Vec<ObjectId> = outline.iter().map(|_| document.new_object_id()).collect();
    for (index, (title, page_index)) in outline.iter().enumerate() {
        let mut item = Dictionary::new();
        item.set("Title", Object::string_literal(*title));
        item.set("Parent", Object::Reference(outlines_id));
        item.set(
            "Dest",
            Object::Array(vec![Object::Reference(page_ids[*page_index]), name("Fit")]),
        );
        if index > 0 {
            item.set("Prev", Object::Reference(item_ids[index - 1]));
        }
        if index + 1 < item_ids.len() {
            item.set("Next", Object::Reference(item_ids[index + 1]));
        }
        document.objects.insert(item_ids[index], Object::Dictionary(item));
    }
    let mut outlines = Dictionary::new();
    outlines.set("Type", name("Outlines"));
    if let (Some(first), Some(last)) = (item_ids.first(), item_ids.last()) {
        outlines.set("First", Object::Reference(*first));
        outlines.set("Last", Object::Reference(*last));
    }
    outlines.set("Count", Object::Integer(item_ids.len() as i64));
    document.objects.insert(outlines_id, Object::Dictionary(outlines));

    let root_id = document
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .expect("fixture has a catalog");
    if let Ok(Object::Dictionary(catalog)) = document.get_object_mut(root_id) {
        catalog.set("Outlines", Object::Reference(outlines_id));
    }
    save(&mut document).expect("fixture PDF must serialise")
}

pub(crate) fn png_bytes(width: u32, height: u32, seed: u32) -> Vec<u8> {
    encode(DynamicImage::ImageRgb8(noise_image(width, height, seed)), ImageFormat::Png)
}

pub(crate) fn jpeg_bytes(width: u32, height: u32, seed: u32) -> Vec<u8> {
    encode(DynamicImage::ImageRgb8(noise_image(width, height, seed)), ImageFormat::Jpeg)
}

fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, format).expect("fixture image must encode");
    buffer.into_inner()
}
