//! PDF collaborators backed by lopdf
//!
//! - [`merge::merge_documents`]: concatenate documents
//! - [`split::extract_pages`] plus [`PageSelector`] planning: split
//! - [`compose::images_to_pdf`]: one JPEG per A4 page

pub mod compose;
pub mod merge;
pub mod split;

pub use compose::images_to_pdf;
pub use merge::merge_documents;
pub use split::{extract_pages, PageSelector};

use crate::error::CollaboratorError;
use crate::services::{JpegPage, PdfService, ServiceResult};
use lopdf::{Document, ObjectId};

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<u32, CollaboratorError> {
    Ok(load(bytes, 0)?.get_pages().len() as u32)
}

/// Load a document; `position` names it in the error
pub(crate) fn load(bytes: &[u8], position: usize) -> Result<Document, CollaboratorError> {
    Document::load_mem(bytes).map_err(|e| {
        CollaboratorError::ParseFailure(format!("document {}: {}", position + 1, e))
    })
}

pub(crate) fn save(doc: &mut Document) -> Result<Vec<u8>, CollaboratorError> {
    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| CollaboratorError::UnsupportedStructure(format!("Save failed: {}", e)))?;
    Ok(buffer)
}

/// Id of the root `Pages` node
pub(crate) fn pages_root_id(doc: &Document) -> Result<ObjectId, CollaboratorError> {
    let structure = |msg: &str| CollaboratorError::UnsupportedStructure(msg.to_string());

    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(|root| root.as_reference())
        .map_err(|_| structure("No Root in trailer"))?;

    doc.get_dictionary(catalog_id)
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(|pages| pages.as_reference())
        .map_err(|_| structure("No Pages in catalog"))
}

/// [`PdfService`] over lopdf
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfService;

impl PdfService for LopdfService {
    fn page_count(&self, bytes: &[u8]) -> ServiceResult<u32> {
        get_page_count(bytes)
    }

    fn extract_pages(&self, bytes: &[u8], pages: &[u32]) -> ServiceResult<Vec<u8>> {
        extract_pages(bytes, pages)
    }

    fn merge(&self, documents: &[&[u8]]) -> ServiceResult<Vec<u8>> {
        merge_documents(documents)
    }

    fn images_to_pdf(&self, pages: &[JpegPage]) -> ServiceResult<Vec<u8>> {
        images_to_pdf(pages)
    }
}
