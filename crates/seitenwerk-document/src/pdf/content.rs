// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Text extraction from page content streams.
//
// The scanner walks the decoded operator list, tracks the text matrix and the
// selected font, and emits positioned spans. Spans are grouped into lines for
// the layout-aware converters; plain text is the lines joined by newlines.

use std::collections::HashMap;

use lopdf::content::Content;
use lopdf::{Document, Object, ObjectId};
use seitenwerk_core::error::{Result, SeitenwerkError};
use tracing::debug;

use super::objects::{decode_text_string, name_of, number, page_resources, resolve, resolve_dict};

/// A run of text drawn with one font at one position (PDF user space).
#[derive(Debug, Clone, PartialEq)]
pub struct TextSpan {
    pub text: String,
    /// Base font name with any subset prefix removed.
    pub font: String,
    pub size: f32,
    pub x: f32,
    pub y: f32,
}

impl TextSpan {
    pub fn is_bold(&self) -> bool {
        let lower = self.font.to_ascii_lowercase();
        lower.contains("bold") || lower.contains("black") || lower.contains("heavy")
    }

    pub fn is_italic(&self) -> bool {
        let lower = self.font.to_ascii_lowercase();
        lower.contains("italic") || lower.contains("oblique")
    }

    /// Estimated advance width in user space.
    fn width(&self) -> f32 {
        self.text.chars().count() as f32 * self.size * 0.5
    }
}

/// Spans sharing a baseline, left to right.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub spans: Vec<TextSpan>,
}

impl TextLine {
    pub fn x(&self) -> f32 {
        self.spans.first().map(|s| s.x).unwrap_or_default()
    }

    pub fn y(&self) -> f32 {
        self.spans.first().map(|s| s.y).unwrap_or_default()
    }

    pub fn text(&self) -> String {
        let mut text = String::new();
        let mut previous_end: Option<f32> = None;
        for span in &self.spans {
            if let Some(end) = previous_end {
                let gap = span.x - end;
                let needs_space = gap > span.size * 0.25
                    && !text.ends_with(char::is_whitespace)
                    && !span.text.starts_with(char::is_whitespace);
                if needs_space {
                    text.push(' ');
                }
            }
            text.push_str(&span.text);
            previous_end = Some(span.x + span.width());
        }
        text.trim_end().to_string()
    }

    /// Mean font size weighted by character count.
    pub fn average_size(&self) -> f32 {
        let (weighted, chars) = self.spans.iter().fold((0.0, 0usize), |(sum, count), span| {
            let n = span.text.chars().count();
            (sum + span.size * n as f32, count + n)
        });
        if chars == 0 { 0.0 } else { weighted / chars as f32 }
    }

    /// The font covering the most characters on this line.
    pub fn dominant_font(&self) -> &str {
        let mut counts: HashMap<&str, usize> = HashMap::new();
        for span in &self.spans {
            *counts.entry(span.font.as_str()).or_default() += span.text.chars().count();
        }
        counts
            .into_iter()
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))
            .map(|(font, _)| font)
            .unwrap_or("")
    }

    pub fn any_bold(&self) -> bool {
        self.spans.iter().any(TextSpan::is_bold)
    }

    pub fn any_italic(&self) -> bool {
        self.spans.iter().any(TextSpan::is_italic)
    }
}

// -- Fonts --------------------------------------------------------------------

#[derive(Debug, Default, Clone)]
struct FontInfo {
    base_font: String,
    two_byte: bool,
    to_unicode: Option<HashMap<u32, String>>,
}

impl FontInfo {
    fn decode(&self, bytes: &[u8]) -> String {
        let width = if self.two_byte { 2 } else { 1 };
        match &self.to_unicode {
            Some(map) => bytes
                .chunks(width)
                .filter_map(|chunk| {
                    let code = chunk.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32);
                    map.get(&code).cloned().or_else(|| {
                        (!self.two_byte).then(|| (code as u8 as char).to_string())
                    })
                })
                .collect(),
            // Without a ToUnicode map, CIDs cannot be mapped back to text.
            None if self.two_byte => String::new(),
            None => decode_text_string(bytes),
        }
    }
}

fn page_fonts(document: &Document, page_id: ObjectId) -> HashMap<Vec<u8>, FontInfo> {
    let mut fonts = HashMap::new();
    let Some(font_dict) = page_resources(document, page_id)
        .and_then(|resources| resources.get(b"Font").ok())
        .and_then(|object| resolve_dict(document, object))
    else {
        return fonts;
    };

    for (key, value) in font_dict.iter() {
        let Some(font) = resolve_dict(document, value) else {
            continue;
        };
        let base_font = font
            .get(b"BaseFont")
            .ok()
            .and_then(name_of)
            .map(|raw| strip_subset_prefix(&String::from_utf8_lossy(raw)))
            .unwrap_or_default();
        let two_byte = font.get(b"Subtype").ok().and_then(name_of) == Some(b"Type0".as_slice());
        let to_unicode = font
            .get(b"ToUnicode")
            .ok()
            .and_then(|object| resolve(document, object))
            .and_then(|object| match object {
                Object::Stream(stream) => stream
                    .decompressed_content()
                    .ok()
                    .or_else(|| Some(stream.content.clone())),
                _ => None,
            })
            .map(|cmap| parse_to_unicode(&cmap));
        fonts.insert(
            key.clone(),
            FontInfo {
                base_font,
                two_byte,
                to_unicode,
            },
        );
    }
    fonts
}

/// `ABCDEF+Helvetica-Bold` → `Helvetica-Bold`.
fn strip_subset_prefix(name: &str) -> String {
    match name.split_once('+') {
        Some((prefix, rest)) if prefix.len() == 6 && prefix.chars().all(|c| c.is_ascii_uppercase()) => {
            rest.to_string()
        }
        _ => name.to_string(),
    }
}

// -- ToUnicode CMaps ----------------------------------------------------------

#[derive(Debug, PartialEq)]
enum CmapToken {
    Hex(Vec<u8>),
    Open,
    Close,
    Word(String),
}

fn cmap_tokens(data: &[u8]) -> Vec<CmapToken> {
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < data.len() {
        match data[i] {
            b'<' => {
                let end = data[i + 1..]
                    .iter()
                    .position(|&b| b == b'>')
                    .map(|p| i + 1 + p)
                    .unwrap_or(data.len());
                let digits: Vec<u8> = data[i + 1..end]
                    .iter()
                    .copied()
                    .filter(u8::is_ascii_hexdigit)
                    .collect();
                let bytes = digits
                    .chunks(2)
                    .filter_map(|pair| {
                        let s = std::str::from_utf8(pair).ok()?;
                        let padded = if s.len() == 1 { format!("{s}0") } else { s.to_string() };
                        u8::from_str_radix(&padded, 16).ok()
                    })
                    .collect();
                tokens.push(CmapToken::Hex(bytes));
                i = end + 1;
            }
            b'[' => {
                tokens.push(CmapToken::Open);
                i += 1;
            }
            b']' => {
                tokens.push(CmapToken::Close);
                i += 1;
            }
            b if b.is_ascii_whitespace() => i += 1,
            _ => {
                let end = data[i..]
                    .iter()
                    .position(|b| b.is_ascii_whitespace() || matches!(b, b'<' | b'[' | b']'))
                    .map(|p| i + p)
                    .unwrap_or(data.len());
                tokens.push(CmapToken::Word(String::from_utf8_lossy(&data[i..end]).into_owned()));
                i = end.max(i + 1);
            }
        }
    }
    tokens
}

fn code_of(bytes: &[u8]) -> u32 {
    bytes.iter().fold(0u32, |acc, b| (acc << 8) | *b as u32)
}

fn utf16_of(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => u16::from_be_bytes([*hi, *lo]),
            [single] => *single as u16,
            _ => 0,
        })
        .collect();
    String::from_utf16_lossy(&units)
}

/// Parse the `bfchar` and `bfrange` sections of a ToUnicode CMap.
pub(crate) fn parse_to_unicode(data: &[u8]) -> HashMap<u32, String> {
    let tokens = cmap_tokens(data);
    let mut map = HashMap::new();
    let mut i = 0;
    let mut section: Option<&str> = None;

    while i < tokens.len() {
        match &tokens[i] {
            CmapToken::Word(word) if word == "beginbfchar" => section = Some("char"),
            CmapToken::Word(word) if word == "beginbfrange" => section = Some("range"),
            CmapToken::Word(word) if word == "endbfchar" || word == "endbfrange" => section = None,
            CmapToken::Hex(src) if section == Some("char") => {
                if let Some(CmapToken::Hex(dst)) = tokens.get(i + 1) {
                    map.insert(code_of(src), utf16_of(dst));
                    i += 1;
                }
            }
            CmapToken::Hex(low) if section == Some("range") => {
                let Some(CmapToken::Hex(high)) = tokens.get(i + 1) else {
                    i += 1;
                    continue;
                };
                let (low, high) = (code_of(low), code_of(high));
                match tokens.get(i + 2) {
                    Some(CmapToken::Hex(dst)) => {
                        let base = utf16_of(dst);
                        let mut chars: Vec<char> = base.chars().collect();
                        for code in low..=high.min(low.saturating_add(0xFFFF)) {
                            map.insert(code, chars.iter().collect());
                            if let Some(last) = chars.last_mut() {
                                *last = char::from_u32(*last as u32 + 1).unwrap_or(*last);
                            }
                        }
                        i += 2;
                    }
                    Some(CmapToken::Open) => {
                        let mut j = i + 3;
                        let mut code = low;
                        while let Some(CmapToken::Hex(dst)) = tokens.get(j) {
                            if code <= high {
                                map.insert(code, utf16_of(dst));
                            }
                            code += 1;
                            j += 1;
                        }
                        i = j;
                    }
                    _ => i += 1,
                }
            }
            _ => {}
        }
        i += 1;
    }
    map
}

// -- Content scanning ---------------------------------------------------------

type Matrix = [f32; 6];

const IDENTITY: Matrix = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

fn translate(matrix: &Matrix, tx: f32, ty: f32) -> Matrix {
    let [a, b, c, d, e, f] = *matrix;
    [a, b, c, d, tx * a + ty * c + e, tx * b + ty * d + f]
}

fn operand(operands: &[Object], index: usize) -> f32 {
    operands.get(index).and_then(number).unwrap_or_default()
}

struct TextState<'f> {
    fonts: &'f HashMap<Vec<u8>, FontInfo>,
    font: Option<&'f FontInfo>,
    size: f32,
    leading: f32,
    line_matrix: Matrix,
    text_matrix: Matrix,
    spans: Vec<TextSpan>,
}

impl<'f> TextState<'f> {
    fn new(fonts: &'f HashMap<Vec<u8>, FontInfo>) -> Self {
        Self {
            fonts,
            font: None,
            size: 12.0,
            leading: 0.0,
            line_matrix: IDENTITY,
            text_matrix: IDENTITY,
            spans: Vec::new(),
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.line_matrix = translate(&self.line_matrix, tx, ty);
        self.text_matrix = self.line_matrix;
    }

    fn next_line(&mut self) {
        self.move_line(0.0, -self.leading);
    }

    fn decode(&self, object: &Object) -> String {
        match object {
            Object::String(bytes, _) => match self.font {
                Some(font) => font.decode(bytes),
                None => decode_text_string(bytes),
            },
            _ => String::new(),
        }
    }

    fn show(&mut self, text: String) {
        let scale = self.text_matrix[3].abs().max(self.text_matrix[0].abs());
        let size = (self.size * if scale > 0.0 { scale } else { 1.0 }).abs();
        let advance = text.chars().count() as f32 * self.size * 0.5;
        let [.., e, f] = self.text_matrix;
        if !text.trim().is_empty() {
            self.spans.push(TextSpan {
                text,
                font: self.font.map(|f| f.base_font.clone()).unwrap_or_default(),
                size,
                x: e,
                y: f,
            });
        }
        self.text_matrix = translate(&self.text_matrix, advance, 0.0);
    }

    fn apply(&mut self, operator: &str, operands: &[Object]) {
        match operator {
            "BT" => {
                self.line_matrix = IDENTITY;
                self.text_matrix = IDENTITY;
            }
            "Tf" => {
                self.font = operands
                    .first()
                    .and_then(name_of)
                    .and_then(|key| self.fonts.get(key));
                self.size = operand(operands, 1);
            }
            "TL" => self.leading = operand(operands, 0),
            "Td" => self.move_line(operand(operands, 0), operand(operands, 1)),
            "TD" => {
                self.leading = -operand(operands, 1);
                self.move_line(operand(operands, 0), operand(operands, 1));
            }
            "Tm" => {
                let mut matrix = IDENTITY;
                for (slot, value) in matrix.iter_mut().zip(operands.iter().filter_map(number)) {
                    *slot = value;
                }
                self.line_matrix = matrix;
                self.text_matrix = matrix;
            }
            "T*" => self.next_line(),
            "Tj" => {
                let text = operands.first().map(|o| self.decode(o)).unwrap_or_default();
                self.show(text);
            }
            "'" => {
                self.next_line();
                let text = operands.first().map(|o| self.decode(o)).unwrap_or_default();
                self.show(text);
            }
            "\"" => {
                self.next_line();
                let text = operands.get(2).map(|o| self.decode(o)).unwrap_or_default();
                self.show(text);
            }
            "TJ" => {
                let mut text = String::new();
                if let Some(Object::Array(items)) = operands.first() {
                    for item in items {
                        match item {
                            Object::String(..) => text.push_str(&self.decode(item)),
                            // Large negative kerning is how many producers encode a space.
                            other => {
                                if number(other).is_some_and(|n| n < -200.0) && !text.ends_with(' ') {
                                    text.push(' ');
                                }
                            }
                        }
                    }
                }
                self.show(text);
            }
            _ => {}
        }
    }
}

/// Positioned text spans of one page, in content-stream order.
pub(crate) fn page_spans(document: &Document, page_id: ObjectId) -> Result<Vec<TextSpan>> {
    let raw = document
        .get_page_content(page_id)
        .map_err(|err| SeitenwerkError::codec(format!("cannot read page content: {}", err)))?;
    let content = Content::decode(&raw)
        .map_err(|err| SeitenwerkError::codec(format!("cannot decode page content: {}", err)))?;

    let fonts = page_fonts(document, page_id);
    let mut state = TextState::new(&fonts);
    for operation in &content.operations {
        state.apply(&operation.operator, &operation.operands);
    }
    debug!(spans = state.spans.len(), "Page text scanned");
    Ok(state.spans)
}

/// Group spans into lines, top to bottom, each left to right.
pub(crate) fn group_lines(mut spans: Vec<TextSpan>) -> Vec<TextLine> {
    spans.sort_by(|a, b| b.y.total_cmp(&a.y).then(a.x.total_cmp(&b.x)));
    let mut lines: Vec<TextLine> = Vec::new();
    for span in spans {
        let tolerance = (span.size * 0.3).max(2.0);
        match lines.last_mut() {
            Some(line) if (line.y() - span.y).abs() <= tolerance => line.spans.push(span),
            _ => lines.push(TextLine { spans: vec![span] }),
        }
    }
    for line in &mut lines {
        line.spans.sort_by(|a, b| a.x.total_cmp(&b.x));
    }
    lines
}

pub(crate) fn page_lines(document: &Document, page_id: ObjectId) -> Result<Vec<TextLine>> {
    Ok(group_lines(page_spans(document, page_id)?))
}

/// Plain text of one page. Falls back to lopdf's own extractor when the
/// content stream cannot be scanned.
pub(crate) fn page_text(document: &Document, page_id: ObjectId, page_number: u32) -> Result<String> {
    match page_lines(document, page_id) {
        Ok(lines) => Ok(lines.iter().map(TextLine::text).collect::<Vec<_>>().join("\n")),
        Err(scan_err) => document.extract_text(&[page_number]).map_err(|err| {
            SeitenwerkError::codec(format!(
                "text extraction failed ({scan_err}); lopdf extractor: {err}"
            ))
        }),
    }
}
