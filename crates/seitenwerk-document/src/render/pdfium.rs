// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Full-fidelity renderer backed by the pdfium shared library.
//
// pdfium is bound per call so the renderer itself stays `Send + Sync`; the
// document is handed over through a scoped temp file.

use pdfium_render::prelude::*;
use seitenwerk_core::error::{Result, SeitenwerkError};
use tracing::{debug, info, instrument};

use super::{PageRenderer, PageSink};
use crate::pdf::Document;
use crate::pdf::objects::save;
use crate::temp::TempWorkspace;

pub struct PdfiumRenderer {
    workspace: TempWorkspace,
}

impl PdfiumRenderer {
    /// Fails when the pdfium library cannot be found on this system.
    pub fn new(workspace: TempWorkspace) -> Result<Self> {
        Self::bind()?;
        info!("pdfium library bound");
        Ok(Self { workspace })
    }

    fn bind() -> Result<Pdfium> {
        let bindings = Pdfium::bind_to_system_library()
            .map_err(|err| SeitenwerkError::codec(format!("pdfium library not available: {:?}", err)))?;
        Ok(Pdfium::new(bindings))
    }
}

fn open_error(err: PdfiumError) -> SeitenwerkError {
    match err {
        PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError) => {
            SeitenwerkError::invalid("document is encrypted; decrypt it first")
        }
        other => SeitenwerkError::codec(format!("pdfium could not open document: {:?}", other)),
    }
}

impl PageRenderer for PdfiumRenderer {
    fn name(&self) -> &str {
        "pdfium"
    }

    #[instrument(skip(self, document, sink), fields(pages = pages.len()))]
    fn render_pages(&self, document: &Document, pages: &[u32], zoom: f32, sink: &mut PageSink<'_>) -> Result<()> {
        let mut copy = document.inner().clone();
        let bytes = save(&mut copy)?;
        let file = self.workspace.scoped_file(".pdf", &bytes)?;

        let pdfium = Self::bind()?;
        let pdf = pdfium.load_pdf_from_file(file.path(), None).map_err(open_error)?;

        let config = PdfRenderConfig::new().scale_page_by_factor(zoom);
        for &number in pages {
            let index = number
                .checked_sub(1)
                .and_then(|i| u16::try_from(i).ok())
                .ok_or_else(|| SeitenwerkError::invalid(format!("page {number} does not exist")))?;
            let page = pdf.pages().get(index).map_err(|err| {
                SeitenwerkError::codec(format!("pdfium could not load page {number}: {:?}", err))
            })?;
            let bitmap = page.render_with_config(&config).map_err(|err| {
                SeitenwerkError::codec(format!("pdfium could not render page {number}: {:?}", err))
            })?;
            let image = bitmap.as_image();
            debug!(page = number, width = image.width(), height = image.height(), "Page rendered");
            sink(number, image)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn password_failures_are_client_errors() {
        let err = open_error(PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::PasswordError));
        assert!(matches!(err, SeitenwerkError::InvalidInput(_)));

        let err = open_error(PdfiumError::PdfiumLibraryInternalError(PdfiumInternalError::FormatError));
        assert!(matches!(err, SeitenwerkError::CodecFailure(_)));
    }
}
