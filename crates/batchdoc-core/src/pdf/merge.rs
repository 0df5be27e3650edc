//! Concatenate PDFs into one document
//!
//! The first document is the base. Every later document has its object ids
//! shifted past the current maximum, its objects copied over, and its pages
//! appended to the base page tree. Pages are re-parented onto the base root,
//! so attributes they inherited from their old page tree are copied onto each
//! page first.

use super::{load, pages_root_id, save};
use crate::error::CollaboratorError;
use lopdf::{Document, Object, ObjectId};
use std::collections::BTreeSet;

/// Page attributes a page may take from an ancestor `Pages` node
const INHERITABLE: [&[u8]; 4] = [b"MediaBox", b"CropBox", b"Resources", b"Rotate"];

pub fn merge_documents(documents: &[&[u8]]) -> Result<Vec<u8>, CollaboratorError> {
    let (first, rest) = documents
        .split_first()
        .ok_or_else(|| CollaboratorError::UnsupportedStructure("No documents to merge".into()))?;

    if rest.is_empty() {
        return Ok(first.to_vec());
    }

    let mut base = load(first, 0)?;
    let base_pages_id = pages_root_id(&base)?;
    let mut kids: Vec<ObjectId> = base.get_pages().into_values().collect();
    for page_id in &kids {
        flatten_page(&mut base, *page_id, base_pages_id);
    }
    if let Some(Object::Dictionary(root)) = base.objects.get_mut(&base_pages_id) {
        for key in INHERITABLE {
            root.remove(key);
        }
    }

    for (position, bytes) in rest.iter().enumerate() {
        let mut source = load(bytes, position + 1)?;
        let offset = base.max_id;
        let source_max_id = source.max_id;

        let source_pages: Vec<ObjectId> = source.get_pages().into_values().collect();
        for page_id in &source_pages {
            inline_inherited(&mut source, *page_id);
        }

        for (id, mut object) in source.objects {
            shift_refs(&mut object, offset);
            base.objects.insert((id.0 + offset, id.1), object);
        }

        for (number, generation) in source_pages {
            let page_id = (number + offset, generation);
            if let Some(Object::Dictionary(page)) = base.objects.get_mut(&page_id) {
                page.set("Parent", Object::Reference(base_pages_id));
            }
            kids.push(page_id);
        }

        base.max_id = base.max_id.max(source_max_id + offset);
    }

    set_kids(&mut base, base_pages_id, &kids)?;
    base.prune_objects();
    base.compress();
    save(&mut base)
}

/// Inline inherited attributes, then hang the page directly off `root`
fn flatten_page(doc: &mut Document, page_id: ObjectId, root: ObjectId) {
    inline_inherited(doc, page_id);
    if let Some(Object::Dictionary(page)) = doc.objects.get_mut(&page_id) {
        page.set("Parent", Object::Reference(root));
    }
}

/// Copy every inheritable attribute the page lacks from its nearest ancestor
fn inline_inherited(doc: &mut Document, page_id: ObjectId) {
    let inherited = inherited_attributes(doc, page_id);
    if inherited.is_empty() {
        return;
    }
    if let Some(Object::Dictionary(page)) = doc.objects.get_mut(&page_id) {
        for (key, value) in inherited {
            page.set(key, value);
        }
    }
}

fn inherited_attributes(doc: &Document, page_id: ObjectId) -> Vec<(Vec<u8>, Object)> {
    let Ok(page) = doc.get_dictionary(page_id) else {
        return Vec::new();
    };
    let mut missing: Vec<&[u8]> = INHERITABLE
        .iter()
        .copied()
        .filter(|key| !page.has(key))
        .collect();
    let mut found = Vec::new();
    let mut visited = BTreeSet::new();
    let mut next = page.get(b"Parent").and_then(Object::as_reference).ok();

    while let Some(id) = next {
        if missing.is_empty() || !visited.insert(id) {
            break;
        }
        let Ok(node) = doc.get_dictionary(id) else {
            break;
        };
        missing.retain(|key| match node.get(key) {
            Ok(value) => {
                found.push((key.to_vec(), value.clone()));
                false
            }
            Err(_) => true,
        });
        next = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    found
}

/// Shift every indirect reference inside `object` by `offset`
fn shift_refs(object: &mut Object, offset: u32) {
    match object {
        Object::Reference(id) => id.0 += offset,
        Object::Array(items) => items.iter_mut().for_each(|o| shift_refs(o, offset)),
        Object::Dictionary(dict) => {
            for (_, value) in dict.iter_mut() {
                shift_refs(value, offset);
            }
        }
        Object::Stream(stream) => {
            for (_, value) in stream.dict.iter_mut() {
                shift_refs(value, offset);
            }
        }
        _ => {}
    }
}

fn set_kids(
    doc: &mut Document,
    pages_id: ObjectId,
    kids: &[ObjectId],
) -> Result<(), CollaboratorError> {
    match doc.objects.get_mut(&pages_id) {
        Some(Object::Dictionary(pages)) => {
            pages.set(
                "Kids",
                Object::Array(kids.iter().map(|id| Object::Reference(*id)).collect()),
            );
            pages.set("Count", Object::Integer(kids.len() as i64));
            Ok(())
        }
        _ => Err(CollaboratorError::UnsupportedStructure(
            "Invalid pages dictionary".into(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pdf::test_support::create_test_pdf;
    use lopdf::{Dictionary, Stream};
    use pretty_assertions::assert_eq;

    /// Pages carry only Contents; MediaBox and Resources sit on the root node
    fn create_inheriting_pdf(num_pages: u32) -> Vec<u8> {
        let mut doc = Document::with_version("1.7");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Font".to_vec())),
            ("Subtype", Object::Name(b"Type1".to_vec())),
            ("BaseFont", Object::Name(b"Helvetica".to_vec())),
        ]));

        let page_ids: Vec<ObjectId> = (0..num_pages)
            .map(|_| {
                let content_id = doc.add_object(Stream::new(Dictionary::new(), b"BT ET".to_vec()));
                doc.add_object(Dictionary::from_iter(vec![
                    ("Type", Object::Name(b"Page".to_vec())),
                    ("Parent", Object::Reference(pages_id)),
                    ("Contents", Object::Reference(content_id)),
                ]))
            })
            .collect();

        let resources = Dictionary::from_iter(vec![(
            "Font",
            Object::Dictionary(Dictionary::from_iter(vec![("F1", Object::Reference(font_id))])),
        )]);
        let pages = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Count", Object::Integer(num_pages as i64)),
            (
                "Kids",
                Object::Array(page_ids.iter().map(|id| Object::Reference(*id)).collect()),
            ),
            (
                "MediaBox",
                Object::Array(vec![
                    Object::Integer(0),
                    Object::Integer(0),
                    Object::Integer(200),
                    Object::Integer(300),
                ]),
            ),
            ("Resources", Object::Dictionary(resources)),
        ]);
        doc.objects.insert(pages_id, Object::Dictionary(pages));

        let catalog_id = doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(pages_id)),
        ]));
        doc.trailer.set("Root", Object::Reference(catalog_id));

        let mut buffer = Vec::new();
        doc.save_to(&mut buffer).unwrap();
        buffer
    }

    fn page_count(bytes: &[u8]) -> usize {
        Document::load_mem(bytes).unwrap().get_pages().len()
    }

    #[test]
    fn test_merge_empty_fails() {
        let err = merge_documents(&[]).unwrap_err();
        assert!(err.to_string().contains("No documents to merge"));
    }

    #[test]
    fn test_merge_single_document_returns_same() {
        let pdf = create_test_pdf(2);
        let merged = merge_documents(&[&pdf]).unwrap();
        assert_eq!(merged, pdf);
    }

    #[test]
    fn test_merge_combines_pages_in_order() {
        let a = create_test_pdf(2);
        let b = create_test_pdf(3);
        let c = create_test_pdf(1);

        let merged = merge_documents(&[&a, &b, &c]).unwrap();

        assert_eq!(page_count(&merged), 6);
    }

    #[test]
    fn test_merge_keeps_attributes_inherited_from_page_tree() {
        let a = create_test_pdf(1);
        let b = create_inheriting_pdf(2);

        let merged = merge_documents(&[&a, &b, &b]).unwrap();
        let doc = Document::load_mem(&merged).unwrap();
        let pages: Vec<ObjectId> = doc.get_pages().into_values().collect();
        assert_eq!(pages.len(), 5);

        for page_id in &pages[1..] {
            let page = doc.get_dictionary(*page_id).unwrap();
            let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
            assert_eq!(media_box[2].as_i64().unwrap(), 200);
            assert_eq!(media_box[3].as_i64().unwrap(), 300);

            let resources = match page.get(b"Resources").unwrap() {
                Object::Reference(id) => doc.get_dictionary(*id).unwrap(),
                other => other.as_dict().unwrap(),
            };
            let font_id = resources
                .get(b"Font")
                .and_then(Object::as_dict)
                .and_then(|fonts| fonts.get(b"F1"))
                .and_then(Object::as_reference)
                .unwrap();
            let font = doc.get_dictionary(font_id).unwrap();
            assert_eq!(font.get(b"BaseFont").unwrap().as_name().unwrap(), b"Helvetica");
        }
    }

    #[test]
    fn test_merge_rejects_garbage() {
        let a = create_test_pdf(1);
        let err = merge_documents(&[&a, b"not a pdf"]).unwrap_err();
        assert!(matches!(err, CollaboratorError::ParseFailure(_)));
    }
}
