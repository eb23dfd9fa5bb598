// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Split: one new document per page, per selection or per range.

use seitenwerk_core::error::{Result, SeitenwerkError};
use seitenwerk_core::{NamedOutput, OperationResult, SplitMode};
use tracing::{info, instrument, warn};

use super::{require_pages, require_unlocked, subset};
use crate::pdf::Document;

#[instrument(skip(document), fields(pages = document.page_count()))]
pub fn split(document: &Document, mode: &SplitMode) -> Result<OperationResult> {
    require_unlocked(document, "split")?;
    require_pages(document, "split")?;
    let count = document.page_count() as u32;

    let result = match mode {
        SplitMode::Each => {
            let mut outputs = Vec::with_capacity(count as usize);
            for page in document.pages() {
                let bytes = subset(document, "split", &[page.handle.0])?;
                outputs.push(NamedOutput::pdf(format!("page_{}.pdf", page.number), bytes));
            }
            OperationResult::Multiple(outputs)
        }
        SplitMode::Pages(numbers) => {
            let ids: Vec<_> = numbers
                .iter()
                .filter_map(|&number| {
                    let page = document.page(number);
                    if page.is_none() {
                        warn!(page = number, count, "Dropping out-of-range page");
                    }
                    page.map(|page| page.handle.0)
                })
                .collect();
            if ids.is_empty() {
                return Err(SeitenwerkError::invalid(format!(
                    "none of the selected pages exist in this {count}-page document"
                )));
            }
            let bytes = subset(document, "split", &ids)?;
            OperationResult::Single(NamedOutput::pdf("selected_pages.pdf", bytes))
        }
        SplitMode::Ranges(ranges) => {
            let mut outputs = Vec::with_capacity(ranges.len());
            for &(start, end) in ranges {
                let (first, last) = (start.max(1), end.min(count));
                if first > last {
                    warn!(start, end, count, "Dropping empty range");
                    continue;
                }
                let ids: Vec<_> = (first..=last)
                    .filter_map(|number| document.page(number))
                    .map(|page| page.handle.0)
                    .collect();
                let bytes = subset(document, "split", &ids)?;
                outputs.push(NamedOutput::pdf(format!("pages_{first}-{last}.pdf"), bytes));
            }
            if outputs.is_empty() {
                return Err(SeitenwerkError::invalid(format!(
                    "no range selects a page of this {count}-page document"
                )));
            }
            OperationResult::Multiple(outputs)
        }
    };
    info!(outputs = result.outputs().len(), "Split complete");
    Ok(result)
}
