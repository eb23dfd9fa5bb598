// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// `OcrAdapter` backed by `ocrs`, a pure-Rust OCR engine whose detection and
// recognition networks run on `rten`.
//
// Two model files are required, `text-detection.rten` and
// `text-recognition.rten`. Running `ocrs-cli` once downloads them into
// `$XDG_CACHE_HOME/ocrs` (typically `~/.cache/ocrs`), which is where
// `OcrConfig::default()` looks.
//
// ocrs and rten must be built in release mode; debug builds are 10-100x slower.

use std::path::{Path, PathBuf};

use image::DynamicImage;
use ocrs::{ImageSource, OcrEngine, OcrEngineParams, TextItem};
use rten::Model;
use seitenwerk_core::error::{Result, SeitenwerkError};
use tracing::{debug, info, instrument};

use super::{BoundingBox, OcrAdapter, OcrRegion};

const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// ocrs reports no per-line score.
const REPORTED_CONFIDENCE: f32 = 1.0;

fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

/// Locations of the two model files.
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub detection_model_path: PathBuf,
    pub recognition_model_path: PathBuf,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self::from_dir(default_model_dir())
    }
}

impl OcrConfig {
    /// Expects `text-detection.rten` and `text-recognition.rten` in `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
            recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (kind, path) in [
            ("detection", &self.detection_model_path),
            ("recognition", &self.recognition_model_path),
        ] {
            if !path.exists() {
                return Err(SeitenwerkError::OcrError(format!(
                    "{kind} model not found at {}; run `ocrs-cli` once to download models",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

fn load_model(kind: &str, path: &Path) -> Result<Model> {
    info!(kind, path = %path.display(), "Loading OCR model");
    Model::load_file(path).map_err(|err| {
        SeitenwerkError::OcrError(format!(
            "failed to load {kind} model from {}: {}",
            path.display(),
            err
        ))
    })
}

/// Loads the models once; reuse the adapter for every page.
pub struct OcrsAdapter {
    engine: OcrEngine,
}

impl OcrsAdapter {
    #[instrument(skip_all, fields(
        detection = %config.detection_model_path.display(),
        recognition = %config.recognition_model_path.display(),
    ))]
    pub fn new(config: OcrConfig) -> Result<Self> {
        config.validate()?;
        let engine = OcrEngine::new(OcrEngineParams {
            detection_model: Some(load_model("detection", &config.detection_model_path)?),
            recognition_model: Some(load_model("recognition", &config.recognition_model_path)?),
            ..Default::default()
        })
        .map_err(|err| SeitenwerkError::OcrError(format!("failed to initialise OCR engine: {}", err)))?;
        info!("OCR engine initialised");
        Ok(Self { engine })
    }

    pub fn with_defaults() -> Result<Self> {
        Self::new(OcrConfig::default())
    }
}

impl OcrAdapter for OcrsAdapter {
    fn name(&self) -> &str {
        "ocrs"
    }

    #[instrument(skip_all, fields(width = image.width(), height = image.height()))]
    fn recognize(&self, image: &DynamicImage) -> Result<Vec<OcrRegion>> {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
            SeitenwerkError::OcrError(format!(
                "failed to create image source ({}x{}): {}",
                width, height, err
            ))
        })?;
        let input = self
            .engine
            .prepare_input(source)
            .map_err(|err| SeitenwerkError::OcrError(format!("OCR preprocessing failed: {}", err)))?;

        let words = self
            .engine
            .detect_words(&input)
            .map_err(|err| SeitenwerkError::OcrError(format!("word detection failed: {}", err)))?;
        let lines = self.engine.find_text_lines(&input, &words);
        let recognised = self
            .engine
            .recognize_text(&input, &lines)
            .map_err(|err| SeitenwerkError::OcrError(format!("line recognition failed: {}", err)))?;

        let regions: Vec<OcrRegion> = recognised
            .iter()
            .flatten()
            .filter_map(|line| {
                let text = line.to_string();
                if text.trim().is_empty() {
                    return None;
                }
                let rect = line.bounding_rect();
                Some(OcrRegion {
                    text,
                    confidence: REPORTED_CONFIDENCE,
                    bbox: BoundingBox {
                        left: rect.left() as f32,
                        top: rect.top() as f32,
                        width: rect.width() as f32,
                        height: rect.height() as f32,
                    },
                })
            })
            .collect();
        debug!(words = words.len(), regions = regions.len(), "OCR recognition complete");
        Ok(regions)
    }
}
