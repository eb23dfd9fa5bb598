// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Object-graph helpers over `lopdf`: loading and saving, inherited page
// attributes, page tree construction, page copying between documents, and
// appending content streams and resources to existing pages.

use std::collections::{HashMap, HashSet};

use lopdf::encryption::DecryptionError;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use seitenwerk_core::Rotation;
use seitenwerk_core::error::{Result, SeitenwerkError};
use tracing::{debug, warn};

/// Page attributes a page may inherit from its ancestors in the page tree.
pub(crate) const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"Resources", b"Rotate", b"CropBox"];

/// US Letter, used when a page declares no usable media box.
pub(crate) const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

const MAX_TREE_DEPTH: usize = 64;

// -- Loading and saving -------------------------------------------------------

pub(crate) fn load(bytes: &[u8]) -> Result<Document> {
    if bytes.is_empty() {
        return Err(SeitenwerkError::invalid("document is empty"));
    }
    Document::load_mem(bytes)
        .map_err(|err| SeitenwerkError::codec(format!("failed to load PDF from memory: {}", err)))
}

// Same-length stand-ins for the trailer's `/Encrypt` key and the `/ObjStm`
// type. With both hidden the reader loads every object raw, still
// encrypted, instead of keeping only the encryption dictionary.
const ENCRYPT_KEY: &[u8] = b"/Encrypt";
const ENCRYPT_HIDDEN: &[u8] = b"/Encryp_";
const OBJSTM_TYPE: &[u8] = b"/ObjStm";
const OBJSTM_HIDDEN: &[u8] = b"/ObjSt_";

/// True when `byte` cannot continue a PDF name.
fn ends_name(byte: Option<&u8>) -> bool {
    byte.is_none_or(|b| b.is_ascii_whitespace() || b"/<>[]()%{}".contains(b))
}

/// Rename every whole-name occurrence of `from` to `to` in place.
fn rename_name(bytes: &mut [u8], from: &[u8], to: &[u8]) -> usize {
    debug_assert_eq!(from.len(), to.len());
    let mut renamed = 0;
    let mut i = 0;
    while i + from.len() <= bytes.len() {
        if &bytes[i..i + from.len()] == from && ends_name(bytes.get(i + from.len())) {
            bytes[i..i + from.len()].copy_from_slice(to);
            renamed += 1;
            i += from.len();
        } else {
            i += 1;
        }
    }
    renamed
}

/// Load an encrypted PDF and decrypt it with `password`, which may be the
/// user or the owner password.
///
/// lopdf's reader only decrypts files whose user password is empty. Here
/// the objects are loaded raw, the encryption entry restored, and
/// `Document::decrypt` run once over the whole graph, object streams
/// included. A wrong password is [`SeitenwerkError::InvalidPassword`].
pub(crate) fn load_decrypted(bytes: &[u8], password: &str) -> Result<Document> {
    let mut patched = bytes.to_vec();
    if rename_name(&mut patched, ENCRYPT_KEY, ENCRYPT_HIDDEN) == 0 {
        return Err(SeitenwerkError::invalid("document is not encrypted"));
    }
    let object_streams = rename_name(&mut patched, OBJSTM_TYPE, OBJSTM_HIDDEN);

    let mut document = load(&patched)?;
    let encrypt = document
        .trailer
        .remove(&ENCRYPT_HIDDEN[1..])
        .ok_or_else(|| SeitenwerkError::codec("trailer lost its encryption entry"))?;
    document.trailer.set("Encrypt", encrypt);
    if object_streams > 0 {
        for object in document.objects.values_mut() {
            if let Ok(stream) = object.as_stream_mut() {
                if stream.dict.has_type(&OBJSTM_HIDDEN[1..]) {
                    stream.dict.set("Type", Object::Name(OBJSTM_TYPE[1..].to_vec()));
                }
            }
        }
    }

    document.decrypt(password).map_err(|err| match err {
        lopdf::Error::Decryption(DecryptionError::IncorrectPassword) => SeitenwerkError::InvalidPassword,
        other => SeitenwerkError::codec(format!("failed to decrypt document: {other}")),
    })?;
    debug!(objects = document.objects.len(), object_streams, "Document decrypted");
    Ok(document)
}

pub(crate) fn save(document: &mut Document) -> Result<Vec<u8>> {
    let mut output = Vec::new();
    document
        .save_to(&mut output)
        .map_err(|err| SeitenwerkError::codec(format!("failed to serialise PDF: {}", err)))?;
    Ok(output)
}

// -- Value helpers ------------------------------------------------------------

/// Follow references until a direct object is reached.
pub(crate) fn resolve<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Object> {
    let mut current = object;
    for _ in 0..MAX_TREE_DEPTH {
        match current {
            Object::Reference(id) => current = document.get_object(*id).ok()?,
            other => return Some(other),
        }
    }
    None
}

pub(crate) fn resolve_dict<'a>(document: &'a Document, object: &'a Object) -> Option<&'a Dictionary> {
    match resolve(document, object)? {
        Object::Dictionary(dict) => Some(dict),
        Object::Stream(stream) => Some(&stream.dict),
        _ => None,
    }
}

pub(crate) fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        Object::Real(value) => Some(*value),
        _ => None,
    }
}

pub(crate) fn name_of(object: &Object) -> Option<&[u8]> {
    match object {
        Object::Name(name) => Some(name.as_slice()),
        _ => None,
    }
}

pub(crate) fn name(value: &str) -> Object {
    Object::Name(value.as_bytes().to_vec())
}

pub(crate) fn real(value: f32) -> Object {
    Object::Real(value)
}

/// Decode a PDF text string: UTF-16BE with BOM, otherwise PDFDocEncoding
/// (treated as Latin-1).
pub(crate) fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        let units: Vec<u16> = bytes[2..]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}

// -- Page attributes ----------------------------------------------------------

pub(crate) fn page_dict(document: &Document, page_id: ObjectId) -> Result<&Dictionary> {
    document
        .get_dictionary(page_id)
        .map_err(|err| SeitenwerkError::codec(format!("cannot read page {:?}: {}", page_id, err)))
}

/// Look up `key` on the page, then on each ancestor `/Parent`.
pub(crate) fn inherited<'a>(
    document: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = document.get_dictionary(page_id).ok()?;
    for _ in 0..MAX_TREE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(value);
        }
        let parent = current.get(b"Parent").ok()?;
        current = resolve_dict(document, parent)?;
    }
    None
}

pub(crate) fn media_box(document: &Document, page_id: ObjectId) -> [f32; 4] {
    inherited(document, page_id, b"MediaBox")
        .and_then(|object| resolve(document, object))
        .and_then(|object| match object {
            Object::Array(values) => {
                let numbers: Vec<f32> = values
                    .iter()
                    .filter_map(|v| resolve(document, v).and_then(number))
                    .collect();
                (numbers.len() == 4).then(|| [numbers[0], numbers[1], numbers[2], numbers[3]])
            }
            _ => None,
        })
        .map(|[x0, y0, x1, y1]| [x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)])
        .filter(|[x0, y0, x1, y1]| x1 - x0 > 0.0 && y1 - y0 > 0.0)
        .unwrap_or(DEFAULT_MEDIA_BOX)
}

pub(crate) fn page_rotation(document: &Document, page_id: ObjectId) -> Rotation {
    inherited(document, page_id, b"Rotate")
        .and_then(|object| resolve(document, object))
        .and_then(number)
        .map(|degrees| Rotation::normalize(degrees.round() as i64))
        .unwrap_or_default()
}

/// Resolved `/Resources` dictionary of a page, following inheritance.
pub(crate) fn page_resources(document: &Document, page_id: ObjectId) -> Option<&Dictionary> {
    inherited(document, page_id, b"Resources").and_then(|object| resolve_dict(document, object))
}

// -- Building documents -------------------------------------------------------

/// A fresh document with an empty page tree. Returns the `/Pages` id.
pub(crate) fn new_document() -> (Document, ObjectId) {
    let mut document = Document::with_version("1.7");
    let pages_id = document.new_object_id();

    let mut pages = Dictionary::new();
    pages.set("Type", name("Pages"));
    pages.set("Kids", Object::Array(Vec::new()));
    pages.set("Count", Object::Integer(0));
    document.objects.insert(pages_id, Object::Dictionary(pages));

    let mut catalog = Dictionary::new();
    catalog.set("Type", name("Catalog"));
    catalog.set("Pages", Object::Reference(pages_id));
    let catalog_id = document.add_object(catalog);
    document.trailer.set("Root", Object::Reference(catalog_id));

    (document, pages_id)
}

/// Attach an already-inserted page object as the last kid of `/Pages`.
pub(crate) fn append_page(document: &mut Document, pages_id: ObjectId, page_id: ObjectId) {
    if let Ok(Object::Dictionary(page)) = document.get_object_mut(page_id) {
        page.set("Parent", Object::Reference(pages_id));
    }
    if let Ok(Object::Dictionary(pages)) = document.get_object_mut(pages_id) {
        if let Ok(Object::Array(kids)) = pages.get_mut(b"Kids") {
            kids.push(Object::Reference(page_id));
        }
        if let Ok(count_obj) = pages.get_mut(b"Count")
            && let Object::Integer(count) = count_obj
        {
            *count += 1;
        }
    }
}

/// Add a page showing `content` with the given resources and size.
pub(crate) fn add_page(
    document: &mut Document,
    pages_id: ObjectId,
    width: f32,
    height: f32,
    resources: Dictionary,
    content: Vec<u8>,
) -> ObjectId {
    let content_id = document.add_object(Stream::new(Dictionary::new(), content));
    let mut page = Dictionary::new();
    page.set("Type", name("Page"));
    page.set(
        "MediaBox",
        Object::Array(vec![real(0.0), real(0.0), real(width), real(height)]),
    );
    page.set("Resources", Object::Dictionary(resources));
    page.set("Contents", Object::Reference(content_id));
    let page_id = document.add_object(page);
    append_page(document, pages_id, page_id);
    page_id
}

/// Copies pages from one source document into targets, cloning each
/// referenced object once per target so shared fonts and images stay shared.
pub(crate) struct PageCopier<'a> {
    source: &'a Document,
    copied: HashMap<ObjectId, ObjectId>,
}

impl<'a> PageCopier<'a> {
    pub(crate) fn new(source: &'a Document) -> Self {
        Self {
            source,
            copied: HashMap::new(),
        }
    }

    /// Copy `page_id` into `target` as its last page, materialising inherited
    /// attributes on the copy. Returns the new page id.
    pub(crate) fn copy_page(
        &mut self,
        target: &mut Document,
        target_pages: ObjectId,
        page_id: ObjectId,
    ) -> Result<ObjectId> {
        let mut page = page_dict(self.source, page_id)?.clone();
        for key in INHERITABLE {
            if !page.has(key)
                && let Some(value) = inherited(self.source, page_id, key)
            {
                page.set(key.to_vec(), value.clone());
            }
        }
        page.remove(b"Parent");

        let new_id = target.new_object_id();
        self.copied.insert(page_id, new_id);
        let cloned = self.clone_object(target, &Object::Dictionary(page))?;
        target.objects.insert(new_id, cloned);
        append_page(target, target_pages, new_id);
        Ok(new_id)
    }

    fn clone_object(&mut self, target: &mut Document, object: &Object) -> Result<Object> {
        match object {
            Object::Dictionary(dict) => Ok(Object::Dictionary(self.clone_dict(target, dict)?)),
            Object::Array(items) => {
                let mut cloned = Vec::with_capacity(items.len());
                for item in items {
                    cloned.push(self.clone_object(target, item)?);
                }
                Ok(Object::Array(cloned))
            }
            Object::Stream(stream) => {
                let dict = self.clone_dict(target, &stream.dict)?;
                let mut copy = Stream::new(dict, stream.content.clone());
                copy.allows_compression = stream.allows_compression;
                Ok(Object::Stream(copy))
            }
            Object::Reference(id) => self.clone_reference(target, *id),
            other => Ok(other.clone()),
        }
    }

    fn clone_dict(&mut self, target: &mut Document, dict: &Dictionary) -> Result<Dictionary> {
        let mut cloned = Dictionary::new();
        for (key, value) in dict.iter() {
            // Page-tree back-links are rewired by `append_page`; following them
            // would drag the whole source tree along.
            if key.as_slice() == b"Parent" && self.is_page_tree_node(value) {
                continue;
            }
            cloned.set(key.clone(), self.clone_object(target, value)?);
        }
        Ok(cloned)
    }

    fn clone_reference(&mut self, target: &mut Document, id: ObjectId) -> Result<Object> {
        if let Some(mapped) = self.copied.get(&id) {
            return Ok(Object::Reference(*mapped));
        }
        let referenced = match self.source.get_object(id) {
            Ok(object) => object,
            Err(err) => {
                warn!(?id, %err, "Cannot resolve reference, using Null");
                return Ok(Object::Null);
            }
        };
        let new_id = target.new_object_id();
        self.copied.insert(id, new_id);
        let cloned = self.clone_object(target, referenced)?;
        target.objects.insert(new_id, cloned);
        Ok(Object::Reference(new_id))
    }

    fn is_page_tree_node(&self, value: &Object) -> bool {
        resolve_dict(self.source, value)
            .and_then(|dict| dict.get(b"Type").ok())
            .and_then(name_of)
            .is_some_and(|kind| kind == b"Pages" || kind == b"Page")
    }
}

/// Build a new document from `page_ids` of `source`, in the given order.
pub(crate) fn copy_pages(source: &Document, page_ids: &[ObjectId]) -> Result<Document> {
    let (mut target, pages_id) = new_document();
    let mut copier = PageCopier::new(source);
    for &page_id in page_ids {
        copier.copy_page(&mut target, pages_id, page_id)?;
    }
    debug!(pages = page_ids.len(), "Pages copied into new document");
    Ok(target)
}

/// Copy inherited attributes onto the page itself so it survives being
/// re-parented.
pub(crate) fn materialize_inherited(document: &mut Document, page_id: ObjectId) -> Result<()> {
    let mut missing = Vec::new();
    {
        let page = page_dict(document, page_id)?;
        for key in INHERITABLE {
            if !page.has(key)
                && let Some(value) = inherited(document, page_id, key)
            {
                missing.push((key.to_vec(), value.clone()));
            }
        }
    }
    if missing.is_empty() {
        return Ok(());
    }
    match document.get_object_mut(page_id) {
        Ok(Object::Dictionary(page)) => {
            for (key, value) in missing {
                page.set(key, value);
            }
            Ok(())
        }
        _ => Err(SeitenwerkError::codec(format!("page {:?} is not a dictionary", page_id))),
    }
}

/// Keep the whole object graph but replace the page tree with a flat one
/// holding `page_ids` in order, then drop everything no longer reachable.
/// Outlines are dropped since they may point at removed pages.
pub(crate) fn rebuild_page_tree(source: &Document, page_ids: &[ObjectId]) -> Result<Document> {
    let mut document = source.clone();
    let mut seen = HashSet::new();
    for &page_id in page_ids {
        if !seen.insert(page_id) {
            return Err(SeitenwerkError::codec(format!(
                "page {:?} selected twice; a flat page tree cannot share page objects",
                page_id
            )));
        }
        materialize_inherited(&mut document, page_id)?;
    }

    let pages_id = document.new_object_id();
    let mut pages = Dictionary::new();
    pages.set("Type", name("Pages"));
    pages.set("Kids", Object::Array(Vec::new()));
    pages.set("Count", Object::Integer(0));
    document.objects.insert(pages_id, Object::Dictionary(pages));
    for &page_id in page_ids {
        append_page(&mut document, pages_id, page_id);
    }

    let catalog_id = document
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|err| SeitenwerkError::codec(format!("document has no catalog: {}", err)))?;
    match document.get_object_mut(catalog_id) {
        Ok(Object::Dictionary(catalog)) => {
            catalog.set("Pages", Object::Reference(pages_id));
            catalog.remove(b"Outlines");
        }
        _ => return Err(SeitenwerkError::codec("document catalog is not a dictionary")),
    }
    let pruned = document.prune_objects();
    debug!(pages = page_ids.len(), pruned = pruned.len(), "Page tree rebuilt");
    Ok(document)
}

// -- Editing pages ------------------------------------------------------------

/// Append `content` to the page so it draws above the existing content. The
/// existing streams are wrapped in `q`/`Q` so their graphics state cannot leak.
pub(crate) fn overlay_content(document: &mut Document, page_id: ObjectId, content: Vec<u8>) -> Result<()> {
    let current = page_dict(document, page_id)?.get(b"Contents").ok().cloned();
    let existing: Vec<Object> = match current {
        Some(Object::Array(items)) => items,
        Some(Object::Reference(id)) => match document.get_object(id) {
            Ok(Object::Array(items)) => items.clone(),
            _ => vec![Object::Reference(id)],
        },
        Some(Object::Stream(stream)) => vec![Object::Reference(document.add_object(stream))],
        _ => Vec::new(),
    };

    let push = document.add_object(Stream::new(Dictionary::new(), b"q\n".to_vec()));
    let pop = document.add_object(Stream::new(Dictionary::new(), b"\nQ\n".to_vec()));
    let overlay = document.add_object(Stream::new(Dictionary::new(), content));

    let mut contents = Vec::with_capacity(existing.len() + 3);
    if !existing.is_empty() {
        contents.push(Object::Reference(push));
        contents.extend(existing);
        contents.push(Object::Reference(pop));
    }
    contents.push(Object::Reference(overlay));

    match document.get_object_mut(page_id) {
        Ok(Object::Dictionary(page)) => {
            page.set("Contents", Object::Array(contents));
            Ok(())
        }
        _ => Err(SeitenwerkError::codec(format!("page {:?} is not a dictionary", page_id))),
    }
}

/// Give the page its own direct `/Resources` dictionary (with direct
/// sub-dictionaries for `categories`) so entries can be added without
/// touching resources shared with other pages.
pub(crate) fn own_resources(document: &mut Document, page_id: ObjectId, categories: &[&[u8]]) -> Result<()> {
    let mut resources = page_resources(document, page_id)
        .cloned()
        .unwrap_or_else(Dictionary::new);
    for &category in categories {
        let direct = resources
            .get(category)
            .ok()
            .and_then(|object| resolve_dict(document, object))
            .cloned()
            .unwrap_or_else(Dictionary::new);
        resources.set(category.to_vec(), Object::Dictionary(direct));
    }
    match document.get_object_mut(page_id) {
        Ok(Object::Dictionary(page)) => {
            page.set("Resources", Object::Dictionary(resources));
            Ok(())
        }
        _ => Err(SeitenwerkError::codec(format!("page {:?} is not a dictionary", page_id))),
    }
}

/// Register `value` under a fresh name in the page's `category` resources
/// and return that name. Call [`own_resources`] first.
pub(crate) fn add_resource(
    document: &mut Document,
    page_id: ObjectId,
    category: &[u8],
    prefix: &str,
    value: Object,
) -> Result<Vec<u8>> {
    let page = match document.get_object_mut(page_id) {
        Ok(Object::Dictionary(page)) => page,
        _ => return Err(SeitenwerkError::codec(format!("page {:?} is not a dictionary", page_id))),
    };
    let resources = match page.get_mut(b"Resources") {
        Ok(Object::Dictionary(resources)) => resources,
        _ => return Err(SeitenwerkError::codec("page resources are not direct")),
    };
    if !resources.has(category) {
        resources.set(category.to_vec(), Object::Dictionary(Dictionary::new()));
    }
    let entries = match resources.get_mut(category) {
        Ok(Object::Dictionary(entries)) => entries,
        _ => return Err(SeitenwerkError::codec("resource category is not direct")),
    };

    let taken: HashSet<Vec<u8>> = entries.iter().map(|(key, _)| key.clone()).collect();
    let resource_name = (0..)
        .map(|n| format!("{prefix}{n}").into_bytes())
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| prefix.as_bytes().to_vec());
    entries.set(resource_name.clone(), value);
    Ok(resource_name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn new_document_has_empty_page_tree() {
        let (mut document, _) = new_document();
        assert_eq!(document.get_pages().len(), 0);
        let bytes = save(&mut document).unwrap();
        assert!(bytes.starts_with(b"%PDF-1.7"));
    }

    #[test]
    fn copy_materialises_inherited_attributes() {
        let source = load(&fixtures::inherited_attributes_pdf()).unwrap();
        let ids: Vec<ObjectId> = source.get_pages().values().copied().collect();
        let copy = copy_pages(&source, &ids).unwrap();
        let copied_id = *copy.get_pages().get(&1).unwrap();
        let page = copy.get_dictionary(copied_id).unwrap();
        assert!(page.has(b"MediaBox"));
        assert!(page.has(b"Resources"));
        assert_eq!(page_rotation(&copy, copied_id), Rotation::Deg90);
        assert_eq!(media_box(&copy, copied_id), [0.0, 0.0, 300.0, 400.0]);
    }

    #[test]
    fn shared_resources_are_cloned_once() {
        let source = load(&fixtures::text_pdf(&["one", "two", "three"])).unwrap();
        let ids: Vec<ObjectId> = source.get_pages().values().copied().collect();
        let copy = copy_pages(&source, &ids).unwrap();
        let fonts: Vec<_> = copy
            .objects
            .values()
            .filter(|object| {
                matches!(object, Object::Dictionary(d)
                    if d.get(b"Type").ok().and_then(name_of) == Some(b"Font".as_slice()))
            })
            .collect();
        assert_eq!(fonts.len(), 1);
    }

    #[test]
    fn add_resource_picks_unused_names() {
        let mut document = load(&fixtures::text_pdf(&["hello"])).unwrap();
        let page_id = *document.get_pages().get(&1).unwrap();
        own_resources(&mut document, page_id, &[b"Font"]).unwrap();
        let first = add_resource(&mut document, page_id, b"Font", "F", Object::Null).unwrap();
        let second = add_resource(&mut document, page_id, b"Font", "F", Object::Null).unwrap();
        // The fixture already uses /F1.
        assert_eq!(first, b"F0".to_vec());
        assert_eq!(second, b"F2".to_vec());
    }

    #[test]
    fn rebuilt_tree_keeps_selected_pages_in_order() {
        let source = load(&fixtures::text_pdf(&["one", "two", "three"])).unwrap();
        let ids: Vec<ObjectId> = source.get_pages().values().copied().collect();
        let rebuilt = rebuild_page_tree(&source, &[ids[2], ids[0]]).unwrap();
        let pages: Vec<ObjectId> = rebuilt.get_pages().values().copied().collect();
        assert_eq!(pages, vec![ids[2], ids[0]]);
        assert!(rebuilt.get_object(ids[1]).is_err());
        assert!(rebuild_page_tree(&source, &[ids[0], ids[0]]).is_err());
    }

    #[test]
    fn renaming_only_touches_whole_names() {
        let mut bytes = b"<</Encrypt 5 0 R/EncryptMetadata true>>/Encrypt\n".to_vec();
        assert_eq!(rename_name(&mut bytes, ENCRYPT_KEY, ENCRYPT_HIDDEN), 2);
        assert_eq!(bytes, b"<</Encryp_ 5 0 R/EncryptMetadata true>>/Encryp_\n".to_vec());
    }

    #[test]
    fn decrypting_load_keeps_every_page() {
        let source = crate::Document::from_bytes(&fixtures::text_pdf(&["alpha", "beta", "gamma"])).unwrap();
        let encrypted = crate::ops::security::encrypt(&source, Some("reader"), Some("admin")).unwrap();

        for password in ["reader", "admin"] {
            let document = load_decrypted(&encrypted.bytes, password).unwrap();
            assert_eq!(document.get_pages().len(), 3, "{password}");
            assert!(!document.trailer.has(b"Encrypt"));
            assert!(!document.trailer.has(b"Encryp_"));
        }
        assert!(matches!(
            load_decrypted(&encrypted.bytes, "nobody"),
            Err(SeitenwerkError::InvalidPassword)
        ));
    }

    #[test]
    fn decrypting_load_rejects_plain_files() {
        let err = load_decrypted(&fixtures::text_pdf(&["plain"]), "pw").unwrap_err();
        assert!(matches!(err, SeitenwerkError::InvalidInput(_)));
    }

    #[test]
    fn text_strings_decode_utf16_and_latin1() {
        assert_eq!(decode_text_string(&[0xFE, 0xFF, 0x00, 0x41, 0x00, 0xE9]), "Aé");
        assert_eq!(decode_text_string(b"Chapter 1"), "Chapter 1");
    }
}
