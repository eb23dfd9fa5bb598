// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Organize: reorder or filter pages into a new document.

use std::collections::{BTreeSet, HashSet};

use seitenwerk_core::error::{Result, SeitenwerkError};
use seitenwerk_core::{NamedOutput, OrganizeMode, PipelineConfig};
use tracing::{debug, info, instrument, warn};

use super::{require_pages, require_unlocked, subset};
use crate::classify::{ContentKind, content_fingerprint, content_kind, is_blank};
use crate::pdf::Document;

pub const OUTPUT_NAME: &str = "organized.pdf";

/// 1-based page numbers of the output, in output order.
pub fn plan_order(document: &Document, mode: &OrganizeMode, config: &PipelineConfig) -> Result<Vec<u32>> {
    let count = document.page_count();
    let order = match mode {
        OrganizeMode::Manual(indices) => {
            if indices.is_empty() {
                return Err(SeitenwerkError::invalid("manual page order is empty"));
            }
            indices
                .iter()
                .filter_map(|&index| {
                    if index >= count {
                        debug!(index, count, "Skipping out-of-range index");
                        return None;
                    }
                    Some(index as u32 + 1)
                })
                .collect()
        }
        OrganizeMode::Auto => {
            let mut pages: Vec<(u8, u32)> = document
                .pages()
                .iter()
                .map(|page| {
                    let rank = match content_kind(page) {
                        ContentKind::TextOnly => 0,
                        ContentKind::Mixed => 1,
                        ContentKind::ImageOnly => 2,
                    };
                    (rank, page.number)
                })
                .collect();
            pages.sort();
            pages.into_iter().map(|(_, number)| number).collect()
        }
        OrganizeMode::Bookmark => {
            let targets: BTreeSet<u32> = document
                .outline()
                .iter()
                .filter_map(|entry| entry.target_page)
                .collect();
            if targets.is_empty() {
                debug!("No outline targets; keeping page order");
            }
            let rest = document
                .pages()
                .iter()
                .map(|page| page.number)
                .filter(|number| !targets.contains(number));
            targets.iter().copied().chain(rest).collect()
        }
        OrganizeMode::BlankRemove => {
            let kept: Vec<u32> = document
                .pages()
                .iter()
                .filter(|page| !is_blank(page, config))
                .map(|page| page.number)
                .collect();
            if kept.is_empty() {
                return Err(SeitenwerkError::invalid("every page is blank"));
            }
            kept
        }
        OrganizeMode::DuplicateRemove => {
            let mut seen = HashSet::new();
            document
                .pages()
                .iter()
                .filter(|page| seen.insert(content_fingerprint(document, page)))
                .map(|page| page.number)
                .collect()
        }
    };
    Ok(order)
}

#[instrument(skip(document, config), fields(pages = document.page_count()))]
pub fn organize(document: &Document, mode: &OrganizeMode, config: &PipelineConfig) -> Result<NamedOutput> {
    require_unlocked(document, "organize")?;
    require_pages(document, "organize")?;
    let order = plan_order(document, mode, config)?;
    if order.len() < document.page_count() && !matches!(mode, OrganizeMode::Manual(_)) {
        warn!(removed = document.page_count() - order.len(), "Pages removed");
    }
    let ids: Vec<_> = order
        .iter()
        .filter_map(|&number| document.page(number))
        .map(|page| page.handle.0)
        .collect();
    let bytes = subset(document, "organize", &ids)?;
    info!(output_pages = ids.len(), "Organize complete");
    Ok(NamedOutput::pdf(OUTPUT_NAME, bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, PageSpec};

    fn config() -> PipelineConfig {
        PipelineConfig::default()
    }

    fn texts(bytes: &[u8]) -> Vec<String> {
        Document::from_bytes(bytes)
            .unwrap()
            .pages()
            .iter()
            .map(|page| page.text().trim().to_string())
            .collect()
    }

    #[test]
    fn manual_order_skips_out_of_range() {
        let document = Document::from_bytes(&fixtures::text_pdf(&["a", "b", "c"])).unwrap();
        let output = organize(&document, &OrganizeMode::Manual(vec![2, 7, 0]), &config()).unwrap();
        assert_eq!(output.name, "organized.pdf");
        assert_eq!(texts(&output.bytes), vec!["c", "a"]);

        let err = organize(&document, &OrganizeMode::Manual(vec![]), &config()).unwrap_err();
        assert!(matches!(err, SeitenwerkError::InvalidInput(_)));
        let err = organize(&document, &OrganizeMode::Manual(vec![9]), &config()).unwrap_err();
        assert!(matches!(err, SeitenwerkError::InvalidInput(_)));
    }

    #[test]
    fn auto_groups_text_then_mixed_then_images() {
        let document = Document::from_bytes(&fixtures::pdf(&[
            PageSpec::image(20, 20, 1),
            PageSpec::image(20, 20, 2).with_text("caption"),
            PageSpec::text("words"),
            PageSpec::blank(),
        ]))
        .unwrap();
        assert_eq!(plan_order(&document, &OrganizeMode::Auto, &config()).unwrap(), vec![3, 4, 2, 1]);
    }

    #[test]
    fn bookmark_targets_come_first() {
        let source = fixtures::outline_pdf(&["p1", "p2", "p3", "p4"], &[("Later", 3), ("Again", 3), ("Early", 1)]);
        let document = Document::from_bytes(&source).unwrap();
        assert_eq!(
            plan_order(&document, &OrganizeMode::Bookmark, &config()).unwrap(),
            vec![2, 4, 1, 3]
        );

        let plain = Document::from_bytes(&fixtures::text_pdf(&["x", "y"])).unwrap();
        assert_eq!(plan_order(&plain, &OrganizeMode::Bookmark, &config()).unwrap(), vec![1, 2]);
    }

    #[test]
    fn blank_removal_keeps_image_pages() {
        let document = Document::from_bytes(&fixtures::pdf(&[
            PageSpec::blank(),
            PageSpec::image(10, 10, 1),
            PageSpec::text(fixtures::prose(120, 'a')),
            PageSpec::text("tiny"),
        ]))
        .unwrap();
        let order = plan_order(&document, &OrganizeMode::BlankRemove, &config()).unwrap();
        assert_eq!(order, vec![2, 3]);
        assert!(order.len() <= document.page_count());

        let blank = Document::from_bytes(&fixtures::pdf(&[PageSpec::blank()])).unwrap();
        let err = organize(&blank, &OrganizeMode::BlankRemove, &config()).unwrap_err();
        assert!(matches!(err, SeitenwerkError::InvalidInput(_)));
    }

    #[test]
    fn duplicate_removal_is_idempotent() {
        let document = Document::from_bytes(&fixtures::pdf(&[
            PageSpec::text("same"),
            PageSpec::image(10, 10, 4),
            PageSpec::text("same"),
            PageSpec::image(10, 10, 4),
            PageSpec::text("other"),
        ]))
        .unwrap();
        let once = organize(&document, &OrganizeMode::DuplicateRemove, &config()).unwrap();
        assert_eq!(texts(&once.bytes), vec!["same", "", "other"]);

        let again = organize(
            &Document::from_bytes(&once.bytes).unwrap(),
            &OrganizeMode::DuplicateRemove,
            &config(),
        )
        .unwrap();
        assert_eq!(texts(&again.bytes), texts(&once.bytes));
    }
}
