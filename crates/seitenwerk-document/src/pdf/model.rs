// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// The parsed document model handed to every engine.

use std::collections::{BTreeMap, HashMap, HashSet};

use lopdf::{Dictionary, Object, ObjectId};
use seitenwerk_core::Rotation;
use seitenwerk_core::error::Result;
use tracing::{debug, instrument, warn};

use super::content::{self, TextLine};
use super::images;
use super::objects::{
    decode_text_string, load, media_box, name_of, number, page_rotation, resolve, resolve_dict, save,
};

/// Opaque reference to a page inside its owning [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PageHandle(pub(crate) ObjectId);

/// Cipher of an encrypted document, when recognisable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptionAlgorithm {
    Aes256,
    Rc4_128,
    Other(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptionState {
    Unencrypted,
    /// Encrypted and not yet authenticated; page text is unavailable.
    Locked(EncryptionAlgorithm),
    /// Encrypted source that has been decrypted in memory.
    Unlocked(EncryptionAlgorithm),
}

/// One page's measured properties.
#[derive(Debug, Clone)]
pub struct Page {
    /// 1-based position in the document.
    pub number: u32,
    /// Points, from the inherited `/MediaBox`.
    pub width: f32,
    pub height: f32,
    pub rotation: Rotation,
    /// Characters of trimmed extracted text.
    pub text_chars: usize,
    pub has_images: bool,
    pub handle: PageHandle,
    text: String,
}

impl Page {
    pub fn text(&self) -> &str {
        &self.text
    }
}

/// A flattened outline (bookmark) entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineEntry {
    pub title: String,
    /// Nesting depth, 0 for top-level entries.
    pub level: usize,
    /// 1-based destination page, when it resolves to a page of this document.
    pub target_page: Option<u32>,
}

/// A parsed PDF that owns its object graph.
pub struct Document {
    inner: lopdf::Document,
    pages: Vec<Page>,
    outline: Vec<OutlineEntry>,
    encryption: EncryptionState,
    source_len: usize,
}

impl std::fmt::Debug for Document {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Document")
            .field("pages", &self.pages.len())
            .field("outline", &self.outline.len())
            .field("encryption", &self.encryption)
            .field("source_len", &self.source_len)
            .finish()
    }
}

impl Document {
    /// Parse `bytes` and measure every page.
    #[instrument(skip(bytes), fields(bytes_len = bytes.len()))]
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let inner = load(bytes)?;
        let encryption = match encryption_algorithm(&inner) {
            Some(algorithm) => EncryptionState::Locked(algorithm),
            None => EncryptionState::Unencrypted,
        };
        Ok(Self::from_lopdf(inner, encryption, bytes.len()))
    }

    pub(crate) fn from_lopdf(inner: lopdf::Document, encryption: EncryptionState, source_len: usize) -> Self {
        let locked = matches!(encryption, EncryptionState::Locked(_));
        let pages: Vec<Page> = inner
            .get_pages()
            .into_iter()
            .map(|(number, id)| measure_page(&inner, number, id, locked))
            .collect();
        let outline = if locked { Vec::new() } else { read_outline(&inner) };
        debug!(
            pages = pages.len(),
            outline = outline.len(),
            ?encryption,
            "Document parsed"
        );
        Self {
            inner,
            pages,
            outline,
            encryption,
            source_len,
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[Page] {
        &self.pages
    }

    /// Page by 1-based number.
    pub fn page(&self, number: u32) -> Option<&Page> {
        number
            .checked_sub(1)
            .and_then(|index| self.pages.get(index as usize))
    }

    pub fn outline(&self) -> &[OutlineEntry] {
        &self.outline
    }

    pub fn encryption(&self) -> &EncryptionState {
        &self.encryption
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.encryption, EncryptionState::Locked(_))
    }

    /// Size of the serialized source this document was parsed from.
    pub fn source_len(&self) -> usize {
        self.source_len
    }

    /// Trimmed text of all pages, in order, separated by blank lines.
    pub fn full_text(&self) -> String {
        self.pages
            .iter()
            .map(|page| page.text.trim())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// Positioned text lines of a page, for layout-aware consumers.
    pub fn page_lines(&self, page: &Page) -> Result<Vec<TextLine>> {
        content::page_lines(&self.inner, page.handle.0)
    }

    pub fn to_bytes(&mut self) -> Result<Vec<u8>> {
        save(&mut self.inner)
    }

    pub(crate) fn inner(&self) -> &lopdf::Document {
        &self.inner
    }

    pub(crate) fn into_inner(self) -> lopdf::Document {
        self.inner
    }

    pub(crate) fn page_ids(&self) -> Vec<ObjectId> {
        self.pages.iter().map(|page| page.handle.0).collect()
    }
}

fn measure_page(document: &lopdf::Document, number: u32, id: ObjectId, locked: bool) -> Page {
    let [x0, y0, x1, y1] = media_box(document, id);
    let text = if locked {
        String::new()
    } else {
        content::page_text(document, id, number).unwrap_or_else(|err| {
            warn!(page = number, %err, "Text extraction failed, treating page as textless");
            String::new()
        })
    };
    Page {
        number,
        width: x1 - x0,
        height: y1 - y0,
        rotation: page_rotation(document, id),
        text_chars: text.trim().chars().count(),
        has_images: images::page_has_images(document, id),
        handle: PageHandle(id),
        text,
    }
}

// -- Encryption ---------------------------------------------------------------

/// The cipher named by the trailer's `/Encrypt` dictionary, if present.
pub(crate) fn encryption_algorithm(document: &lopdf::Document) -> Option<EncryptionAlgorithm> {
    let encrypt = document.trailer.get(b"Encrypt").ok()?;
    let dict = resolve_dict(document, encrypt);
    let field = |key: &[u8]| {
        dict.and_then(|d| d.get(key).ok())
            .and_then(number)
            .map(|value| value as i64)
    };
    let version = field(b"V").unwrap_or(0);
    let revision = field(b"R").unwrap_or(0);
    let length = field(b"Length").unwrap_or(40);
    Some(match (version, revision) {
        (5, _) | (_, 5) | (_, 6) => EncryptionAlgorithm::Aes256,
        (2, 3) if length == 128 => EncryptionAlgorithm::Rc4_128,
        _ => EncryptionAlgorithm::Other(format!("V{version} R{revision} {length}-bit")),
    })
}

// -- Outline ------------------------------------------------------------------

const MAX_OUTLINE_DEPTH: usize = 32;

struct OutlineReader<'a> {
    document: &'a lopdf::Document,
    page_numbers: HashMap<ObjectId, u32>,
    named: BTreeMap<Vec<u8>, Object>,
    visited: HashSet<ObjectId>,
    entries: Vec<OutlineEntry>,
}

fn catalog(document: &lopdf::Document) -> Option<&Dictionary> {
    document
        .trailer
        .get(b"Root")
        .ok()
        .and_then(|root| resolve_dict(document, root))
}

pub(crate) fn read_outline(document: &lopdf::Document) -> Vec<OutlineEntry> {
    let Some(first) = catalog(document)
        .and_then(|cat| cat.get(b"Outlines").ok())
        .and_then(|outlines| resolve_dict(document, outlines))
        .and_then(|outlines| outlines.get(b"First").ok())
        .and_then(|first| first.as_reference().ok())
    else {
        return Vec::new();
    };

    let mut reader = OutlineReader {
        document,
        page_numbers: document.get_pages().into_iter().map(|(n, id)| (id, n)).collect(),
        named: named_destinations(document),
        visited: HashSet::new(),
        entries: Vec::new(),
    };
    reader.walk(first, 0);
    reader.entries
}

impl OutlineReader<'_> {
    fn walk(&mut self, first: ObjectId, level: usize) {
        if level > MAX_OUTLINE_DEPTH {
            return;
        }
        let mut next = Some(first);
        while let Some(id) = next {
            if !self.visited.insert(id) {
                warn!(?id, "Outline cycle detected, stopping");
                return;
            }
            let Ok(item) = self.document.get_dictionary(id) else {
                return;
            };
            let title = match item.get(b"Title").ok().and_then(|t| resolve(self.document, t)) {
                Some(Object::String(bytes, _)) => decode_text_string(bytes),
                _ => String::new(),
            };
            let target_page = self.target(item);
            self.entries.push(OutlineEntry {
                title,
                level,
                target_page,
            });
            if let Ok(child) = item.get(b"First").and_then(Object::as_reference) {
                self.walk(child, level + 1);
            }
            next = item.get(b"Next").and_then(Object::as_reference).ok();
        }
    }

    fn target(&self, item: &Dictionary) -> Option<u32> {
        let destination = match item.get(b"Dest") {
            Ok(dest) => Some(dest),
            Err(_) => item
                .get(b"A")
                .ok()
                .and_then(|action| resolve_dict(self.document, action))
                .filter(|action| action.get(b"S").ok().and_then(name_of) == Some(b"GoTo".as_slice()))
                .and_then(|action| action.get(b"D").ok()),
        }?;
        self.destination_page(destination, 0)
    }

    fn destination_page(&self, destination: &Object, depth: usize) -> Option<u32> {
        if depth > 4 {
            return None;
        }
        match resolve(self.document, destination)? {
            Object::Array(items) => match items.first()? {
                Object::Reference(page_id) => self.page_numbers.get(page_id).copied(),
                // Remote-style destinations use a 0-based page index.
                Object::Integer(index) => u32::try_from(*index).ok().map(|i| i + 1),
                _ => None,
            },
            Object::Dictionary(dict) => self.destination_page(dict.get(b"D").ok()?, depth + 1),
            Object::Name(key) | Object::String(key, _) => {
                self.destination_page(self.named.get(key)?, depth + 1)
            }
            _ => None,
        }
    }
}

/// Named destinations from both the legacy catalog `/Dests` dictionary and
/// the `/Names /Dests` name tree.
fn named_destinations(document: &lopdf::Document) -> BTreeMap<Vec<u8>, Object> {
    let mut named = BTreeMap::new();
    let Some(cat) = catalog(document) else {
        return named;
    };
    if let Some(dests) = cat.get(b"Dests").ok().and_then(|d| resolve_dict(document, d)) {
        for (key, value) in dests.iter() {
            named.insert(key.clone(), value.clone());
        }
    }
    if let Some(tree) = cat
        .get(b"Names")
        .ok()
        .and_then(|n| resolve_dict(document, n))
        .and_then(|names| names.get(b"Dests").ok())
        .and_then(|d| resolve_dict(document, d))
    {
        collect_name_tree(document, tree, 0, &mut named);
    }
    named
}

fn collect_name_tree(
    document: &lopdf::Document,
    node: &Dictionary,
    depth: usize,
    named: &mut BTreeMap<Vec<u8>, Object>,
) {
    if depth > MAX_OUTLINE_DEPTH {
        return;
    }
    if let Some(Object::Array(pairs)) = node.get(b"Names").ok().and_then(|n| resolve(document, n)) {
        for pair in pairs.chunks_exact(2) {
            if let Object::String(key, _) = &pair[0] {
                named.insert(key.clone(), pair[1].clone());
            }
        }
    }
    if let Some(Object::Array(kids)) = node.get(b"Kids").ok().and_then(|k| resolve(document, k)) {
        for kid in kids {
            if let Some(child) = resolve_dict(document, kid) {
                collect_name_tree(document, child, depth + 1, named);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{self, PageSpec};

    #[test]
    fn pages_are_measured() {
        let bytes = fixtures::pdf(&[
            PageSpec::text(fixtures::prose(120, 'l')),
            PageSpec::image(40, 30, 7).rotated(270),
            PageSpec::blank(),
        ]);
        let document = Document::from_bytes(&bytes).unwrap();
        assert_eq!(document.page_count(), 3);
        assert_eq!(*document.encryption(), EncryptionState::Unencrypted);

        let first = document.page(1).unwrap();
        assert_eq!((first.width, first.height), (612.0, 792.0));
        assert!(first.text_chars >= 100, "got {}", first.text_chars);
        assert!(!first.has_images);

        let second = document.page(2).unwrap();
        assert_eq!((second.width, second.height), (40.0, 30.0));
        assert_eq!(second.rotation, Rotation::Deg270);
        assert!(second.has_images);
        assert_eq!(second.text_chars, 0);

        assert!(document.page(0).is_none());
        assert!(document.page(4).is_none());
    }

    #[test]
    fn inherited_attributes_are_visible_on_pages() {
        let document = Document::from_bytes(&fixtures::inherited_attributes_pdf()).unwrap();
        let page = document.page(1).unwrap();
        assert_eq!(page.rotation, Rotation::Deg90);
        assert_eq!((page.width, page.height), (300.0, 400.0));
        assert_eq!(page.text(), "inherited");
    }

    #[test]
    fn outline_is_flattened_with_targets() {
        let bytes = fixtures::outline_pdf(&["one", "two", "three"], &[("Intro", 2), ("Body", 0)]);
        let document = Document::from_bytes(&bytes).unwrap();
        let outline = document.outline();
        assert_eq!(outline.len(), 2);
        assert_eq!(outline[0].title, "Intro");
        assert_eq!(outline[0].target_page, Some(3));
        assert_eq!(outline[1].target_page, Some(1));
        assert_eq!(outline[1].level, 0);
    }

    #[test]
    fn garbage_is_a_codec_failure() {
        let err = Document::from_bytes(b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, seitenwerk_core::SeitenwerkError::CodecFailure(_)));
    }
}
