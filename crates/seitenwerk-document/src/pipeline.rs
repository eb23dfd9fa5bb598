// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Pipeline facade: owns the configuration and the shared backends, parses
// the source of each typed request and dispatches it to its engine.
//
// The pipeline holds no per-operation state, so one instance can serve any
// number of threads.

use std::sync::Arc;

use seitenwerk_core::error::Result;
use seitenwerk_core::{ClassificationVerdict, OperationRequest, OperationResult, PipelineConfig};
use tracing::{info, instrument, warn};

use crate::classify::is_scanned;
use crate::convert::convert;
use crate::ocr::{NoOcr, OcrAdapter};
use crate::ops::{self, OpContext};
use crate::pdf::Document;
use crate::render::{ImageLayerRenderer, PageRenderer};
use crate::temp::{SweepReport, TempWorkspace};

/// Entry point for every document operation.
#[derive(Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    renderers: Vec<Arc<dyn PageRenderer>>,
    ocr: Arc<dyn OcrAdapter>,
    workspace: TempWorkspace,
}

impl Pipeline {
    /// Pipeline with the default backends: pdfium when the library can be
    /// bound (with the `pdfium` feature), then the built-in image-layer
    /// renderer, and no OCR engine.
    pub fn new(config: PipelineConfig) -> Self {
        let workspace = TempWorkspace::from_config(&config);
        let mut renderers: Vec<Arc<dyn PageRenderer>> = Vec::new();

        #[cfg(feature = "pdfium")]
        match crate::render::PdfiumRenderer::new(workspace.clone()) {
            Ok(renderer) => renderers.push(Arc::new(renderer)),
            Err(err) => warn!("pdfium unavailable, using built-in renderer only: {err}"),
        }
        renderers.push(Arc::new(ImageLayerRenderer));

        info!(
            renderers = ?renderers.iter().map(|r| r.name()).collect::<Vec<_>>(),
            temp = %workspace.root().display(),
            "Pipeline initialised"
        );
        Self {
            config,
            renderers,
            ocr: Arc::new(NoOcr),
            workspace,
        }
    }

    /// Replace the renderer chain. An empty chain makes every rendering
    /// operation fail with `InvalidInput`.
    pub fn with_renderers(mut self, renderers: Vec<Arc<dyn PageRenderer>>) -> Self {
        self.renderers = renderers;
        self
    }

    /// Put `renderer` at the front of the chain.
    pub fn with_renderer(mut self, renderer: Arc<dyn PageRenderer>) -> Self {
        self.renderers.insert(0, renderer);
        self
    }

    pub fn with_ocr(mut self, ocr: Arc<dyn OcrAdapter>) -> Self {
        self.ocr = ocr;
        self
    }

    pub fn with_workspace(mut self, workspace: TempWorkspace) -> Self {
        self.workspace = workspace;
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    fn context(&self) -> OpContext<'_> {
        OpContext::new(&self.config, &self.renderers, self.ocr.as_ref(), &self.workspace)
    }

    /// Run one operation.
    #[instrument(skip_all, fields(operation = request.name()))]
    pub fn execute(&self, request: OperationRequest) -> Result<OperationResult> {
        self.config.validate()?;
        let ctx = self.context();
        let operation = request.name();

        let result = match request {
            OperationRequest::Merge { documents } => OperationResult::Single(ops::merge::merge(&documents)?),
            OperationRequest::Split { document, mode } => {
                ops::split::split(&Document::from_bytes(&document)?, &mode)?
            }
            OperationRequest::Compress { document, quality } => {
                OperationResult::Single(ops::compress::compress(&ctx, &Document::from_bytes(&document)?, quality)?)
            }
            OperationRequest::Rasterize { document, format, dpi } => {
                ops::raster::rasterize(&ctx, &Document::from_bytes(&document)?, format, dpi)?
            }
            OperationRequest::Derasterize { images, rotations } => {
                OperationResult::Single(ops::raster::derasterize(&images, &rotations)?)
            }
            OperationRequest::TextWatermark { document, watermark } => OperationResult::Single(
                ops::watermark::text_watermark(&Document::from_bytes(&document)?, &watermark, &self.config)?,
            ),
            OperationRequest::ImageWatermark { document, watermark } => OperationResult::Single(
                ops::watermark::image_watermark(&Document::from_bytes(&document)?, &watermark, &self.config)?,
            ),
            OperationRequest::Rotate { document, rotations } => {
                OperationResult::Single(ops::rotate::rotate(&Document::from_bytes(&document)?, &rotations)?)
            }
            OperationRequest::Encrypt {
                document,
                user_password,
                owner_password,
            } => OperationResult::Single(ops::security::encrypt(
                &Document::from_bytes(&document)?,
                user_password.as_deref(),
                owner_password.as_deref(),
            )?),
            OperationRequest::Decrypt { document, password } => {
                OperationResult::Single(ops::security::decrypt(&document, &password)?)
            }
            OperationRequest::Convert { source, direction } => {
                OperationResult::Single(convert(&ctx, &source, direction)?)
            }
            OperationRequest::Organize { document, mode } => OperationResult::Single(
                ops::organize::organize(&Document::from_bytes(&document)?, &mode, &self.config)?,
            ),
            OperationRequest::ExtractText { document } => {
                OperationResult::Single(ops::extract::extract_text(&ctx, &Document::from_bytes(&document)?)?)
            }
            OperationRequest::Preview { document } => {
                let thumbnails = ops::preview::preview(&ctx, &Document::from_bytes(&document)?)?;
                OperationResult::Multiple(thumbnails.into_iter().map(|t| t.into_output()).collect())
            }
        };
        info!(operation, outputs = result.outputs().len(), "Operation complete");
        Ok(result)
    }

    /// Scanned-vs-text verdict for a document.
    pub fn classify(&self, bytes: &[u8]) -> Result<ClassificationVerdict> {
        Ok(is_scanned(&Document::from_bytes(bytes)?, &self.config))
    }

    /// Delete workspace files older than the configured retention.
    pub fn sweep_temp(&self) -> Result<SweepReport> {
        let report = self.workspace.sweep_stale(self.config.temp_retention())?;
        if report.failed > 0 {
            warn!(failed = report.failed, "Some stale temp files could not be removed");
        }
        Ok(report)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("renderers", &self.renderers.iter().map(|r| r.name()).collect::<Vec<_>>())
            .field("ocr", &self.ocr.name())
            .field("workspace", &self.workspace.root())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, PageSpec};
    use crate::ocr::testing::ScriptedOcr;
    use crate::render::testing::FailingRenderer;
    use seitenwerk_core::{
        Anchor, ConversionDirection, ImageFormat, NamedColor, OrganizeMode, Quality, SeitenwerkError, SplitMode,
        TextWatermark, classify_error, ErrorClass,
    };
    use std::collections::BTreeMap;

    fn pipeline() -> Pipeline {
        Pipeline::new(PipelineConfig::default()).with_renderers(vec![Arc::new(ImageLayerRenderer)])
    }

    fn single(result: OperationResult) -> Document {
        Document::from_bytes(&result.single().unwrap().bytes).unwrap()
    }

    #[test]
    fn pipeline_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Pipeline>();
    }

    #[test]
    fn merge_keeps_file_then_page_order() {
        let result = pipeline()
            .execute(OperationRequest::Merge {
                documents: vec![fixtures::text_pdf(&["a1", "a2"]), fixtures::text_pdf(&["b1", "b2"])],
            })
            .unwrap();
        let merged = single(result);
        let texts: Vec<&str> = merged.pages().iter().map(|p| p.text().trim()).collect();
        assert_eq!(texts, vec!["a1", "a2", "b1", "b2"]);
    }

    #[test]
    fn split_each_names_pages() {
        let result = pipeline()
            .execute(OperationRequest::Split {
                document: fixtures::text_pdf(&["x", "y", "z"]),
                mode: SplitMode::Each,
            })
            .unwrap();
        let names: Vec<&str> = result.outputs().iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["page_1.pdf", "page_2.pdf", "page_3.pdf"]);
    }

    #[test]
    fn empty_rotation_map_changes_nothing() {
        let source = fixtures::pdf(&[PageSpec::text("a").rotated(90), PageSpec::text("b")]);
        let rotated = single(
            pipeline()
                .execute(OperationRequest::Rotate {
                    document: source.clone(),
                    rotations: BTreeMap::new(),
                })
                .unwrap(),
        );
        let original = Document::from_bytes(&source).unwrap();
        let before: Vec<_> = original.pages().iter().map(|p| p.rotation).collect();
        let after: Vec<_> = rotated.pages().iter().map(|p| p.rotation).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn encrypt_then_decrypt_restores_content() {
        let source = fixtures::text_pdf(&["secret one", "secret two"]);
        let pipeline = pipeline();
        let encrypted = pipeline
            .execute(OperationRequest::Encrypt {
                document: source,
                user_password: Some("pw".into()),
                owner_password: None,
            })
            .unwrap();
        let locked = encrypted.single().unwrap().bytes.clone();

        let err = pipeline
            .execute(OperationRequest::Decrypt {
                document: locked.clone(),
                password: "wrong".into(),
            })
            .unwrap_err();
        assert_eq!(classify_error(&err), ErrorClass::Client);

        let decrypted = single(
            pipeline
                .execute(OperationRequest::Decrypt {
                    document: locked,
                    password: "pw".into(),
                })
                .unwrap(),
        );
        assert_eq!(decrypted.page_count(), 2);
        assert_eq!(decrypted.pages()[1].text().trim(), "secret two");
    }

    #[test]
    fn text_documents_are_not_scanned() {
        let pages: Vec<String> = (0..3).map(|i| fixtures::prose(200, (b'a' + i) as char)).collect();
        let refs: Vec<&str> = pages.iter().map(String::as_str).collect();
        let verdict = pipeline().classify(&fixtures::text_pdf(&refs)).unwrap();
        assert!(!verdict.scanned);
        assert_eq!(verdict.sampled_pages, 3);
        assert!((150.0..=210.0).contains(&verdict.avg_chars_per_page), "{verdict:?}");
    }

    #[test]
    fn organize_and_watermark_dispatch() {
        let pipeline = pipeline();
        let source = fixtures::pdf(&[PageSpec::blank(), PageSpec::image(20, 20, 3), PageSpec::blank()]);
        let organized = single(
            pipeline
                .execute(OperationRequest::Organize {
                    document: source.clone(),
                    mode: OrganizeMode::BlankRemove,
                })
                .unwrap(),
        );
        assert_eq!(organized.page_count(), 1);
        assert!(organized.pages()[0].has_images);

        let mut watermark = TextWatermark::new("DRAFT");
        watermark.position = Anchor::Center;
        watermark.opacity = 0.1;
        watermark.color = NamedColor::Red;
        let result = pipeline
            .execute(OperationRequest::TextWatermark {
                document: fixtures::text_pdf(&["body"]),
                watermark,
            })
            .unwrap();
        assert_eq!(result.single().unwrap().name, "watermarked.pdf");
        assert!(single(result).full_text().contains("body"));
    }

    #[test]
    fn rasterize_and_preview_use_the_renderer_chain() {
        let source = fixtures::pdf(&[PageSpec::image(36, 36, 1)]);
        let pipeline = pipeline();
        let raster = pipeline
            .execute(OperationRequest::Rasterize {
                document: source.clone(),
                format: ImageFormat::Png,
                dpi: Some(144),
            })
            .unwrap();
        assert_eq!(raster.outputs()[0].name, "page_1.png");

        let preview = pipeline.execute(OperationRequest::Preview { document: source.clone() }).unwrap();
        assert_eq!(preview.outputs()[0].name, "preview_1.png");

        let broken = Pipeline::new(PipelineConfig::default()).with_renderers(vec![Arc::new(FailingRenderer)]);
        let err = broken
            .execute(OperationRequest::Preview { document: source })
            .unwrap_err();
        assert!(matches!(err, SeitenwerkError::StrategiesExhausted { .. }));
    }

    #[test]
    fn ocr_backend_reaches_text_extraction() {
        let pipeline = pipeline().with_ocr(Arc::new(ScriptedOcr::returning(&[("recognised", 0.9)])));
        let result = pipeline
            .execute(OperationRequest::ExtractText {
                document: fixtures::pdf(&[PageSpec::image(30, 30, 2)]),
            })
            .unwrap();
        let text = String::from_utf8(result.single().unwrap().bytes.clone()).unwrap();
        assert_eq!(text, "--- Page 1 (OCR) ---\nrecognised\n\n");
    }

    #[test]
    fn compress_and_convert_dispatch() {
        let pipeline = pipeline();
        let compressed = pipeline
            .execute(OperationRequest::Compress {
                document: fixtures::text_pdf(&["small"]),
                quality: Quality::Medium,
            })
            .unwrap();
        assert_eq!(single(compressed).pages()[0].text().trim(), "small");

        let converted = pipeline
            .execute(OperationRequest::Convert {
                source: fixtures::text_pdf(&["hello"]),
                direction: ConversionDirection::PdfToXlsx,
            })
            .unwrap();
        assert_eq!(converted.single().unwrap().name, "converted.xlsx");
    }

    #[test]
    fn invalid_config_is_rejected_before_dispatch() {
        let mut config = PipelineConfig::default();
        config.max_dpi = 0;
        let err = Pipeline::new(config)
            .execute(OperationRequest::ExtractText {
                document: fixtures::text_pdf(&["x"]),
            })
            .unwrap_err();
        assert!(matches!(err, SeitenwerkError::InvalidInput(_)));
    }

    #[test]
    fn derasterize_dispatch() {
        let result = pipeline()
            .execute(OperationRequest::Derasterize {
                images: vec![fixtures::png_bytes(20, 10, 1), fixtures::jpeg_bytes(10, 20, 2)],
                rotations: vec![],
            })
            .unwrap();
        assert_eq!(single(result).page_count(), 2);
    }
}
