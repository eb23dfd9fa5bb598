// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Merge: concatenate documents in input order.

use lopdf::ObjectId;
use seitenwerk_core::NamedOutput;
use seitenwerk_core::error::{Result, SeitenwerkError};
use tracing::{debug, info, instrument};

use crate::pdf::Document;
use crate::pdf::objects::{PageCopier, append_page, materialize_inherited, new_document, save};
use crate::strategy::StrategyChain;

pub const OUTPUT_NAME: &str = "merged.pdf";

/// Merge the documents in `inputs`, pages in file order then page order.
///
/// Needs at least two inputs. An input that fails to parse, is encrypted or
/// has no pages is reported by its 1-based position.
#[instrument(skip_all, fields(inputs = inputs.len()))]
pub fn merge(inputs: &[Vec<u8>]) -> Result<NamedOutput> {
    if inputs.len() < 2 {
        return Err(SeitenwerkError::invalid(format!(
            "merge needs at least two documents, got {}",
            inputs.len()
        )));
    }

    let mut documents = Vec::with_capacity(inputs.len());
    for (index, bytes) in inputs.iter().enumerate() {
        let position = index + 1;
        let document = Document::from_bytes(bytes)
            .map_err(|err| SeitenwerkError::invalid(format!("document #{position} cannot be read: {err}")))?;
        if document.is_locked() {
            return Err(SeitenwerkError::invalid(format!(
                "document #{position} is encrypted; decrypt it first"
            )));
        }
        if document.page_count() == 0 {
            return Err(SeitenwerkError::invalid(format!("document #{position} has no pages")));
        }
        debug!(position, pages = document.page_count(), "Merge input accepted");
        documents.push(document);
    }

    let bytes = StrategyChain::new("merge")
        .strategy("copy-pages", || copy_all(&documents))
        .strategy("renumber-and-graft", || graft_all(&documents))
        .run()?;
    info!(
        pages = documents.iter().map(Document::page_count).sum::<usize>(),
        output_bytes = bytes.len(),
        "Merge complete"
    );
    Ok(NamedOutput::pdf(OUTPUT_NAME, bytes))
}

fn copy_all(documents: &[Document]) -> Result<Vec<u8>> {
    let (mut target, pages_id) = new_document();
    for document in documents {
        let mut copier = PageCopier::new(document.inner());
        for page_id in document.page_ids() {
            copier.copy_page(&mut target, pages_id, page_id)?;
        }
    }
    save(&mut target)
}

/// Move every object of every source into one graph after renumbering it
/// past the objects already there, then hang the pages off a new tree.
fn graft_all(documents: &[Document]) -> Result<Vec<u8>> {
    let (mut target, pages_id) = new_document();
    for document in documents {
        let mut source = document.inner().clone();
        source.renumber_objects_with(target.max_id + 1);
        let page_ids: Vec<ObjectId> = source.get_pages().into_values().collect();
        for &page_id in &page_ids {
            materialize_inherited(&mut source, page_id)?;
        }
        target.max_id = target.max_id.max(source.max_id);
        target.objects.extend(source.objects);
        for page_id in page_ids {
            append_page(&mut target, pages_id, page_id);
        }
    }
    target.prune_objects();
    save(&mut target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, PageSpec};

    fn texts(bytes: &[u8]) -> Vec<String> {
        Document::from_bytes(bytes)
            .unwrap()
            .pages()
            .iter()
            .map(|page| page.text().trim().to_string())
            .collect()
    }

    #[test]
    fn two_documents_merge_in_file_then_page_order() {
        let first = fixtures::text_pdf(&["a1", "a2"]);
        let second = fixtures::text_pdf(&["b1", "b2"]);
        let output = merge(&[first, second]).unwrap();
        assert_eq!(output.name, "merged.pdf");
        assert_eq!(texts(&output.bytes), vec!["a1", "a2", "b1", "b2"]);
    }

    #[test]
    fn inherited_attributes_survive() {
        let output = merge(&[fixtures::inherited_attributes_pdf(), fixtures::text_pdf(&["x"])]).unwrap();
        let merged = Document::from_bytes(&output.bytes).unwrap();
        let first = merged.page(1).unwrap();
        assert_eq!((first.width, first.height), (300.0, 400.0));
        assert_eq!(first.rotation, seitenwerk_core::Rotation::Deg90);
        assert_eq!(first.text(), "inherited");
    }

    #[test]
    fn single_input_is_rejected() {
        let err = merge(&[fixtures::text_pdf(&["only"])]).unwrap_err();
        assert!(matches!(err, SeitenwerkError::InvalidInput(_)));
    }

    #[test]
    fn bad_input_is_named_by_position() {
        let err = merge(&[fixtures::text_pdf(&["ok"]), b"garbage".to_vec()]).unwrap_err();
        match err {
            SeitenwerkError::InvalidInput(message) => assert!(message.contains("#2"), "{message}"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn graft_fallback_matches_copy() {
        let documents = vec![
            Document::from_bytes(&fixtures::pdf(&[PageSpec::text("g1"), PageSpec::image(8, 8, 1)])).unwrap(),
            Document::from_bytes(&fixtures::text_pdf(&["g3"])).unwrap(),
        ];
        let grafted = graft_all(&documents).unwrap();
        let merged = Document::from_bytes(&grafted).unwrap();
        assert_eq!(merged.page_count(), 3);
        assert_eq!(merged.page(1).unwrap().text().trim(), "g1");
        assert!(merged.page(2).unwrap().has_images);
        assert_eq!(merged.page(3).unwrap().text().trim(), "g3");
    }
}
