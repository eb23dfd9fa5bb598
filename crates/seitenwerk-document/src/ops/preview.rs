// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Page previews as PNG thumbnails.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use seitenwerk_core::NamedOutput;
use seitenwerk_core::error::Result;
use tracing::{info, instrument};

use super::{OpContext, require_pages, require_unlocked};
use crate::image::ImageProcessor;
use crate::pdf::Document;
use crate::render::{all_pages, render_each};

/// One rendered page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageThumbnail {
    pub page_number: u32,
    pub width: u32,
    pub height: u32,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

impl PageThumbnail {
    /// `data:` URL for embedding in HTML.
    pub fn data_url(&self) -> String {
        format!("data:{};base64,{}", self.content_type, STANDARD.encode(&self.bytes))
    }

    pub fn into_output(self) -> NamedOutput {
        NamedOutput::new(format!("preview_{}.png", self.page_number), self.content_type, self.bytes)
    }
}

#[instrument(skip(ctx, document), fields(pages = document.page_count()))]
pub fn preview(ctx: &OpContext<'_>, document: &Document) -> Result<Vec<PageThumbnail>> {
    require_unlocked(document, "preview")?;
    require_pages(document, "preview")?;
    let thumbnails = render_each(
        ctx.renderers,
        "preview",
        document,
        &all_pages(document),
        ctx.config.preview_zoom,
        |page_number, raster| {
            let processor = ImageProcessor::from_dynamic(raster);
            Ok(PageThumbnail {
                page_number,
                width: processor.width(),
                height: processor.height(),
                content_type: "image/png",
                bytes: processor.to_png_bytes()?,
            })
        },
    )?;
    info!(thumbnails = thumbnails.len(), zoom = ctx.config.preview_zoom, "Previews rendered");
    Ok(thumbnails)
}
