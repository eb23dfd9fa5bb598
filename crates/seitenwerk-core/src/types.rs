// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Core domain types for the Seitenwerk pipeline: operation requests and their
// typed parameters, and the named byte streams every operation returns.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SeitenwerkError};

// -- Parameters ---------------------------------------------------------------

/// Compression quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Low,
    #[default]
    Medium,
    High,
}

impl Quality {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            _ => None,
        }
    }
}

/// Raster output format for page images.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Png => "png",
            Self::Jpeg => "jpg",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Png => "image/png",
            Self::Jpeg => "image/jpeg",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            _ => None,
        }
    }
}

/// Page rotation, always one of the four quarter turns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "i64")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Map any angle to the nearest quarter turn in `[0, 360)`.
    ///
    /// Ties round up, so 45 becomes 90 and 315 wraps to 0.
    pub fn normalize(degrees: i64) -> Self {
        let wrapped = degrees.rem_euclid(360);
        let snapped = ((wrapped + 45) / 90 * 90) % 360;
        Self::from_quarter_turns(snapped / 90)
    }

    /// Same as [`Rotation::normalize`] for fractional angles.
    pub fn normalize_f64(degrees: f64) -> Self {
        if !degrees.is_finite() {
            return Self::Deg0;
        }
        let wrapped = degrees.rem_euclid(360.0);
        let turns = ((wrapped + 45.0) / 90.0).floor() as i64;
        Self::from_quarter_turns(turns)
    }

    pub fn from_quarter_turns(turns: i64) -> Self {
        match turns.rem_euclid(4) {
            0 => Self::Deg0,
            1 => Self::Deg90,
            2 => Self::Deg180,
            _ => Self::Deg270,
        }
    }

    pub fn degrees(&self) -> u16 {
        match self {
            Self::Deg0 => 0,
            Self::Deg90 => 90,
            Self::Deg180 => 180,
            Self::Deg270 => 270,
        }
    }

    pub fn quarter_turns(&self) -> u8 {
        (self.degrees() / 90) as u8
    }

    /// One clockwise quarter turn further.
    pub fn turned(&self) -> Self {
        Self::from_quarter_turns(self.quarter_turns() as i64 + 1)
    }

    /// True for 90 and 270, where width and height swap.
    pub fn is_sideways(&self) -> bool {
        matches!(self, Self::Deg90 | Self::Deg270)
    }
}

impl From<Rotation> for u16 {
    fn from(value: Rotation) -> Self {
        value.degrees()
    }
}

impl From<i64> for Rotation {
    fn from(value: i64) -> Self {
        Self::normalize(value)
    }
}

/// Placement of a watermark on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    TopLeft,
    TopCenter,
    TopRight,
    MiddleLeft,
    #[default]
    Center,
    MiddleRight,
    BottomLeft,
    BottomCenter,
    BottomRight,
}

impl Anchor {
    pub fn from_name(name: &str) -> Option<Self> {
        let normalized = name.trim().to_ascii_lowercase().replace('_', "-");
        let anchor = match normalized.as_str() {
            "top-left" => Self::TopLeft,
            "top-center" | "top" => Self::TopCenter,
            "top-right" => Self::TopRight,
            "middle-left" | "left" => Self::MiddleLeft,
            "center" | "middle" => Self::Center,
            "middle-right" | "right" => Self::MiddleRight,
            "bottom-left" => Self::BottomLeft,
            "bottom-center" | "bottom" => Self::BottomCenter,
            "bottom-right" => Self::BottomRight,
            _ => return None,
        };
        Some(anchor)
    }
}

/// Watermark text colours. Unknown names fall back to gray.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NamedColor {
    Red,
    Blue,
    Green,
    Black,
    #[default]
    Gray,
    White,
    Yellow,
    Orange,
    Purple,
}

impl NamedColor {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "red" => Self::Red,
            "blue" => Self::Blue,
            "green" => Self::Green,
            "black" => Self::Black,
            "white" => Self::White,
            "yellow" => Self::Yellow,
            "orange" => Self::Orange,
            "purple" => Self::Purple,
            _ => Self::Gray,
        }
    }

    /// RGB components in `[0, 1]`.
    pub fn rgb(&self) -> [f32; 3] {
        match self {
            Self::Red => [1.0, 0.0, 0.0],
            Self::Blue => [0.0, 0.0, 1.0],
            Self::Green => [0.0, 1.0, 0.0],
            Self::Black => [0.0, 0.0, 0.0],
            Self::Gray => [0.5, 0.5, 0.5],
            Self::White => [1.0, 1.0, 1.0],
            Self::Yellow => [1.0, 1.0, 0.0],
            Self::Orange => [1.0, 0.5, 0.0],
            Self::Purple => [0.5, 0.0, 1.0],
        }
    }
}

/// Text watermark parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextWatermark {
    pub text: String,
    #[serde(default)]
    pub position: Anchor,
    /// Visual strength in `(0, 1]`.
    pub opacity: f32,
    pub font_size: f32,
    #[serde(default)]
    pub color: NamedColor,
    /// Counter-clockwise text rotation in degrees.
    #[serde(default)]
    pub rotation: f32,
    #[serde(default)]
    pub x_offset: f32,
    #[serde(default)]
    pub y_offset: f32,
}

impl TextWatermark {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            position: Anchor::Center,
            opacity: 0.3,
            font_size: 36.0,
            color: NamedColor::Gray,
            rotation: 0.0,
            x_offset: 0.0,
            y_offset: 0.0,
        }
    }
}

/// Image watermark parameters. `image` holds the encoded image bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageWatermark {
    #[serde(skip)]
    pub image: Vec<u8>,
    #[serde(default)]
    pub position: Anchor,
    pub opacity: f32,
    /// Multiplier on the image's native size (one pixel per point).
    pub scale: f32,
    #[serde(default)]
    pub x_offset: f32,
    #[serde(default)]
    pub y_offset: f32,
}

impl ImageWatermark {
    pub fn new(image: Vec<u8>) -> Self {
        Self {
            image,
            position: Anchor::Center,
            opacity: 0.3,
            scale: 1.0,
            x_offset: 0.0,
            y_offset: 0.0,
        }
    }
}

/// How to divide a document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "value")]
pub enum SplitMode {
    /// One output per page.
    Each,
    /// One output holding the listed 1-based pages.
    Pages(Vec<u32>),
    /// One output per inclusive 1-based range.
    Ranges(Vec<(u32, u32)>),
}

/// Page reorganisation modes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode", content = "order")]
pub enum OrganizeMode {
    /// Explicit 0-based page permutation; out-of-range indices are skipped.
    Manual(Vec<usize>),
    /// Text-only pages, then mixed, then image-only.
    Auto,
    /// Outline targets first, then unreferenced pages.
    Bookmark,
    BlankRemove,
    DuplicateRemove,
}

/// Format conversion directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConversionDirection {
    PdfToDocx,
    DocxToPdf,
    PdfToPptx,
    PptxToPdf,
    PdfToXlsx,
    XlsxToPdf,
}

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const PPTX_MIME: &str = "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
pub const TEXT_MIME: &str = "text/plain; charset=utf-8";

impl ConversionDirection {
    /// Stable identifier used in logs and operation names.
    pub fn name(&self) -> &'static str {
        match self {
            Self::PdfToDocx => "pdf-to-docx",
            Self::DocxToPdf => "docx-to-pdf",
            Self::PdfToPptx => "pdf-to-pptx",
            Self::PptxToPdf => "pptx-to-pdf",
            Self::PdfToXlsx => "pdf-to-xlsx",
            Self::XlsxToPdf => "xlsx-to-pdf",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        [
            Self::PdfToDocx,
            Self::DocxToPdf,
            Self::PdfToPptx,
            Self::PptxToPdf,
            Self::PdfToXlsx,
            Self::XlsxToPdf,
        ]
        .into_iter()
        .find(|direction| direction.name() == name.trim().to_ascii_lowercase())
    }

    /// File name and content type of the converted artifact.
    pub fn output(&self) -> (&'static str, &'static str) {
        match self {
            Self::PdfToDocx => ("converted.docx", DOCX_MIME),
            Self::PdfToPptx => ("converted.pptx", PPTX_MIME),
            Self::PdfToXlsx => ("converted.xlsx", XLSX_MIME),
            Self::DocxToPdf | Self::PptxToPdf | Self::XlsxToPdf => ("converted.pdf", PDF_MIME),
        }
    }
}

// -- Requests and results -----------------------------------------------------

/// A typed request for one pipeline operation, carrying its source bytes.
#[derive(Debug, Clone)]
pub enum OperationRequest {
    Merge { documents: Vec<Vec<u8>> },
    Split { document: Vec<u8>, mode: SplitMode },
    Compress { document: Vec<u8>, quality: Quality },
    Rasterize { document: Vec<u8>, format: ImageFormat, dpi: Option<u32> },
    Derasterize { images: Vec<Vec<u8>>, rotations: Vec<i64> },
    TextWatermark { document: Vec<u8>, watermark: TextWatermark },
    ImageWatermark { document: Vec<u8>, watermark: ImageWatermark },
    Rotate { document: Vec<u8>, rotations: BTreeMap<u32, i64> },
    Encrypt {
        document: Vec<u8>,
        user_password: Option<String>,
        owner_password: Option<String>,
    },
    Decrypt { document: Vec<u8>, password: String },
    Convert { source: Vec<u8>, direction: ConversionDirection },
    Organize { document: Vec<u8>, mode: OrganizeMode },
    ExtractText { document: Vec<u8> },
    Preview { document: Vec<u8> },
}

impl OperationRequest {
    /// Short operation name for logging and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Merge { .. } => "merge",
            Self::Split { .. } => "split",
            Self::Compress { .. } => "compress",
            Self::Rasterize { .. } => "rasterize",
            Self::Derasterize { .. } => "derasterize",
            Self::TextWatermark { .. } => "text-watermark",
            Self::ImageWatermark { .. } => "image-watermark",
            Self::Rotate { .. } => "rotate",
            Self::Encrypt { .. } => "encrypt",
            Self::Decrypt { .. } => "decrypt",
            Self::Convert { direction, .. } => direction.name(),
            Self::Organize { .. } => "organize",
            Self::ExtractText { .. } => "extract-text",
            Self::Preview { .. } => "preview",
        }
    }
}

/// One named output byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedOutput {
    pub name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl NamedOutput {
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            bytes,
        }
    }

    pub fn pdf(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self::new(name, PDF_MIME, bytes)
    }
}

/// What an operation hands back: one artifact or an ordered set of them.
/// Archiving a multi-output result is the caller's job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    Single(NamedOutput),
    Multiple(Vec<NamedOutput>),
}

impl OperationResult {
    pub fn outputs(&self) -> &[NamedOutput] {
        match self {
            Self::Single(output) => std::slice::from_ref(output),
            Self::Multiple(outputs) => outputs,
        }
    }

    pub fn into_outputs(self) -> Vec<NamedOutput> {
        match self {
            Self::Single(output) => vec![output],
            Self::Multiple(outputs) => outputs,
        }
    }

    /// The single output, or `None` for a multi-output result.
    pub fn single(&self) -> Option<&NamedOutput> {
        match self {
            Self::Single(output) => Some(output),
            Self::Multiple(_) => None,
        }
    }
}

/// Scanned-vs-text judgement for a whole document.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationVerdict {
    pub scanned: bool,
    pub avg_chars_per_page: f64,
    pub sampled_pages: usize,
}

// -- Parameter parsing --------------------------------------------------------

/// Parse a JSON rotation map such as `{"1": 90, "3": -90}`.
pub fn parse_rotation_map(json: &str) -> Result<BTreeMap<u32, i64>> {
    let raw: BTreeMap<String, serde_json::Value> = serde_json::from_str(json)
        .map_err(|err| SeitenwerkError::invalid(format!("rotation map is not valid JSON: {err}")))?;

    let mut rotations = BTreeMap::new();
    for (key, value) in raw {
        let page: u32 = key
            .trim()
            .parse()
            .map_err(|_| SeitenwerkError::invalid(format!("page key {key:?} is not a number")))?;
        let angle = value
            .as_i64()
            .or_else(|| value.as_f64().map(|f| f.round() as i64))
            .or_else(|| value.as_str().and_then(|s| s.trim().parse().ok()))
            .ok_or_else(|| {
                SeitenwerkError::invalid(format!("angle for page {page} is not a number"))
            })?;
        rotations.insert(page, angle);
    }
    Ok(rotations)
}

/// Parse a JSON page order such as `[2, 0, 1]` (0-based).
pub fn parse_page_order(json: &str) -> Result<Vec<usize>> {
    serde_json::from_str(json)
        .map_err(|err| SeitenwerkError::invalid(format!("page order is not a JSON index list: {err}")))
}

/// Parse a JSON angle list such as `[0, 90, 180]`.
pub fn parse_angle_list(json: &str) -> Result<Vec<i64>> {
    if json.trim().is_empty() {
        return Ok(Vec::new());
    }
    serde_json::from_str(json)
        .map_err(|err| SeitenwerkError::invalid(format!("rotation list is not valid JSON: {err}")))
}

/// Parse a page selection such as `1,3,5-7` into 1-based page numbers.
pub fn parse_page_selection(selection: &str) -> Result<Vec<u32>> {
    let mut pages = Vec::new();
    for (start, end) in parse_page_ranges(selection)? {
        pages.extend(start..=end);
    }
    Ok(pages)
}

/// Parse `1-3,5` into inclusive ranges; a lone number is a one-page range.
pub fn parse_page_ranges(selection: &str) -> Result<Vec<(u32, u32)>> {
    let mut ranges = Vec::new();
    for part in selection.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let parse = |s: &str| -> Result<u32> {
            s.trim()
                .parse()
                .map_err(|_| SeitenwerkError::invalid(format!("{s:?} is not a page number")))
        };
        let range = match part.split_once('-') {
            Some((start, end)) => (parse(start)?, parse(end)?),
            None => {
                let page = parse(part)?;
                (page, page)
            }
        };
        if range.0 == 0 || range.1 < range.0 {
            return Err(SeitenwerkError::invalid(format!("page range {part:?} is empty")));
        }
        ranges.push(range);
    }
    if ranges.is_empty() {
        return Err(SeitenwerkError::invalid("no pages selected"));
    }
    Ok(ranges)
}

/// Build a rotation map applying `angle` to the selected pages, or to every
/// page when the selection is `all`.
pub fn rotation_map_for_selection(
    selection: &str,
    angle: i64,
    page_count: u32,
) -> Result<BTreeMap<u32, i64>> {
    let pages = if selection.trim().eq_ignore_ascii_case("all") {
        (1..=page_count).collect()
    } else {
        parse_page_selection(selection)?
    };
    Ok(pages
        .into_iter()
        .filter(|page| (1..=page_count).contains(page))
        .map(|page| (page, angle))
        .collect())
}
