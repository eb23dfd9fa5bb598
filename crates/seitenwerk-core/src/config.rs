// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline configuration. Every heuristic threshold the engines use lives here
// so deployments can tune them without touching code.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::Quality;
use crate::error::{Result, SeitenwerkError};

/// Raster recompression parameters for one quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityProfile {
    /// Render scale relative to 72 dpi (1.0 = one pixel per point).
    pub scale: f32,
    /// JPEG quality, 1-100.
    pub jpeg_quality: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QualityProfiles {
    pub low: QualityProfile,
    pub medium: QualityProfile,
    pub high: QualityProfile,
}

impl QualityProfiles {
    pub fn profile(&self, quality: Quality) -> QualityProfile {
        match quality {
            Quality::Low => self.low,
            Quality::Medium => self.medium,
            Quality::High => self.high,
        }
    }
}

impl Default for QualityProfiles {
    fn default() -> Self {
        Self {
            low: QualityProfile { scale: 0.4, jpeg_quality: 20 },
            medium: QualityProfile { scale: 0.6, jpeg_quality: 50 },
            high: QualityProfile { scale: 0.9, jpeg_quality: 90 },
        }
    }
}

/// Tunables for the document pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    // -- Classification --
    /// Average characters per sampled page below which a document is "scanned".
    pub scanned_chars_per_page: f64,
    /// How many leading pages the scanned check samples.
    pub scan_sample_pages: usize,
    /// A page with fewer characters than this and no images is blank.
    pub blank_text_chars: usize,

    // -- OCR --
    /// Confidence floor for plain-text consumers (slides, sheets, extraction).
    pub ocr_confidence_plain: f32,
    /// Confidence floor for structured document output.
    pub ocr_confidence_structured: f32,
    /// Pages with fewer characters are OCR'd during word-processor conversion.
    pub docx_ocr_min_chars: usize,
    /// Pages with fewer characters are OCR'd during slide/sheet conversion.
    pub slide_ocr_min_chars: usize,
    /// If the whole document yields this many characters or fewer, text
    /// extraction falls back to OCR.
    pub extract_ocr_min_chars: usize,
    /// Upper bound on OCR'd pages per operation.
    pub ocr_max_pages: usize,
    /// Wall-clock budget for all OCR work in one operation, in seconds.
    pub ocr_time_budget_secs: u64,

    // -- Compression --
    /// Sources larger than this are recompressed via the raster path first.
    pub raster_compress_threshold_bytes: u64,
    pub quality_profiles: QualityProfiles,

    // -- Rendering --
    pub default_dpi: u32,
    pub max_dpi: u32,
    /// Zoom factor for preview thumbnails.
    pub preview_zoom: f32,

    // -- Watermarks --
    /// Distance of edge anchors from the page boundary, in points.
    pub watermark_margin: f32,

    // -- Temp workspace --
    /// Directory for scoped temp files; the OS temp dir when unset.
    pub temp_dir: Option<PathBuf>,
    /// Files older than this are removed by the janitor sweep, in minutes.
    pub temp_retention_minutes: u64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            scanned_chars_per_page: 50.0,
            scan_sample_pages: 3,
            blank_text_chars: 50,
            ocr_confidence_plain: 0.3,
            ocr_confidence_structured: 0.5,
            docx_ocr_min_chars: 30,
            slide_ocr_min_chars: 50,
            extract_ocr_min_chars: 50,
            ocr_max_pages: 50,
            ocr_time_budget_secs: 300,
            raster_compress_threshold_bytes: 1024 * 1024,
            quality_profiles: QualityProfiles::default(),
            default_dpi: 200,
            max_dpi: 1200,
            preview_zoom: 1.5,
            watermark_margin: 50.0,
            temp_dir: None,
            temp_retention_minutes: 30,
        }
    }
}

impl PipelineConfig {
    /// Parse a JSON document; absent fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&raw)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn ocr_time_budget(&self) -> Duration {
        Duration::from_secs(self.ocr_time_budget_secs)
    }

    pub fn temp_retention(&self) -> Duration {
        Duration::from_secs(self.temp_retention_minutes * 60)
    }

    /// Reject settings no engine can work with.
    pub fn validate(&self) -> Result<()> {
        for (name, profile) in [
            ("low", self.quality_profiles.low),
            ("medium", self.quality_profiles.medium),
            ("high", self.quality_profiles.high),
        ] {
            if !(profile.scale > 0.0 && profile.scale <= 4.0) {
                return Err(SeitenwerkError::invalid(format!(
                    "{name} quality scale {} is outside (0, 4]",
                    profile.scale
                )));
            }
            if profile.jpeg_quality == 0 || profile.jpeg_quality > 100 {
                return Err(SeitenwerkError::invalid(format!(
                    "{name} JPEG quality {} is outside 1..=100",
                    profile.jpeg_quality
                )));
            }
        }
        if self.default_dpi == 0 || self.default_dpi > self.max_dpi {
            return Err(SeitenwerkError::invalid(format!(
                "default dpi {} must be within 1..={}",
                self.default_dpi, self.max_dpi
            )));
        }
        if self.preview_zoom <= 0.0 {
            return Err(SeitenwerkError::invalid("preview zoom must be positive"));
        }
        Ok(())
    }
}
