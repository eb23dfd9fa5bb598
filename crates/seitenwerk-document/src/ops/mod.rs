// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Operation engines. Each engine is a plain function of its inputs; the
// backends it may need (renderers, OCR, temp space) arrive through
// `OpContext` for the duration of one call.

pub mod compress;
pub mod extract;
pub mod merge;
pub mod organize;
pub mod preview;
pub mod raster;
pub mod rotate;
pub mod security;
pub mod split;
pub mod watermark;

use std::sync::Arc;

use lopdf::ObjectId;
use seitenwerk_core::PipelineConfig;
use seitenwerk_core::error::{Result, SeitenwerkError};

use crate::ocr::OcrAdapter;
use crate::pdf::Document;
use crate::pdf::objects::{copy_pages, rebuild_page_tree, save};
use crate::render::PageRenderer;
use crate::strategy::StrategyChain;
use crate::temp::TempWorkspace;

/// Borrowed backends for one operation.
#[derive(Clone, Copy)]
pub struct OpContext<'a> {
    pub config: &'a PipelineConfig,
    /// Tried in order until one succeeds.
    pub renderers: &'a [Arc<dyn PageRenderer>],
    pub ocr: &'a dyn OcrAdapter,
    pub workspace: &'a TempWorkspace,
}

impl<'a> OpContext<'a> {
    pub fn new(
        config: &'a PipelineConfig,
        renderers: &'a [Arc<dyn PageRenderer>],
        ocr: &'a dyn OcrAdapter,
        workspace: &'a TempWorkspace,
    ) -> Self {
        Self {
            config,
            renderers,
            ocr,
            workspace,
        }
    }
}

impl std::fmt::Debug for OpContext<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpContext")
            .field(
                "renderers",
                &self.renderers.iter().map(|r| r.name()).collect::<Vec<_>>(),
            )
            .field("ocr", &self.ocr.name())
            .field("workspace", &self.workspace.root())
            .finish()
    }
}

/// Encrypted documents must be decrypted before any other operation.
pub(crate) fn require_unlocked(document: &Document, operation: &str) -> Result<()> {
    if document.is_locked() {
        return Err(SeitenwerkError::invalid(format!(
            "{operation}: document is encrypted; decrypt it first"
        )));
    }
    Ok(())
}

pub(crate) fn require_pages(document: &Document, operation: &str) -> Result<()> {
    if document.page_count() == 0 {
        return Err(SeitenwerkError::invalid(format!("{operation}: document has no pages")));
    }
    Ok(())
}

/// Serialize a brand-new document made of `page_ids`, in order.
///
/// Copying pages into a fresh graph is preferred; rebuilding the page tree
/// of a clone is the fallback for graphs the copier cannot follow.
pub(crate) fn subset(document: &Document, operation: &str, page_ids: &[ObjectId]) -> Result<Vec<u8>> {
    if page_ids.is_empty() {
        return Err(SeitenwerkError::invalid(format!("{operation}: no pages selected")));
    }
    let source = document.inner();
    StrategyChain::new(operation)
        .strategy("copy-pages", || {
            let mut copy = copy_pages(source, page_ids)?;
            save(&mut copy)
        })
        .strategy("rebuild-page-tree", || {
            let mut rebuilt = rebuild_page_tree(source, page_ids)?;
            save(&mut rebuilt)
        })
        .run()
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn subset_builds_new_document_in_order() {
        let document = Document::from_bytes(&fixtures::text_pdf(&["one", "two", "three"])).unwrap();
        let ids = document.page_ids();
        let bytes = subset(&document, "split", &[ids[2], ids[0]]).unwrap();
        let result = Document::from_bytes(&bytes).unwrap();
        let texts: Vec<&str> = result.pages().iter().map(|p| p.text().trim()).collect();
        assert_eq!(texts, vec!["three", "one"]);
    }

    #[test]
    fn empty_subset_is_invalid() {
        let document = Document::from_bytes(&fixtures::text_pdf(&["one"])).unwrap();
        let err = subset(&document, "split", &[]).unwrap_err();
        assert!(matches!(err, SeitenwerkError::InvalidInput(_)));
    }
}
