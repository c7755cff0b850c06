//! PDF text and metadata extraction via `lopdf`.
//!
//! Mirrors the info-dictionary walk used for Office document properties:
//! pull known keys out of the trailer's `Info` dictionary, tolerating any
//! individually missing or malformed entry.

use super::{DocumentError, DocumentMetadata};
use lopdf::{Document, Object};

#[derive(Debug)]
pub struct PdfExtraction {
    pub text: String,
    pub metadata: DocumentMetadata,
}

pub fn extract(raw: &[u8]) -> Result<PdfExtraction, DocumentError> {
    let document = Document::load_mem(raw)
        .map_err(|e| DocumentError::PdfExtraction(e.to_string()))?;

    let page_numbers: Vec<u32> = document.get_pages().keys().copied().collect();
    let text = document
        .extract_text(&page_numbers)
        .unwrap_or_default();

    let mut metadata = DocumentMetadata {
        page_count: Some(page_numbers.len() as u32),
        ..Default::default()
    };

    if let Ok(Object::Reference(info_id)) = document.trailer.get(b"Info") {
        if let Ok(Object::Dictionary(dict)) = document.get_object(*info_id) {
            metadata.title = dict_string(dict, b"Title");
            metadata.author = dict_string(dict, b"Author");
            metadata.created = dict_string(dict, b"CreationDate");
            metadata.modified = dict_string(dict, b"ModDate");
            metadata.keywords = dict_string(dict, b"Keywords");
        }
    }

    Ok(PdfExtraction { text, metadata })
}

fn dict_string(dict: &lopdf::Dictionary, key: &[u8]) -> Option<String> {
    dict.get(key).ok().and_then(|obj| match obj {
        Object::String(bytes, _) => String::from_utf8(bytes.clone()).ok(),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_non_pdf_bytes() {
        let err = extract(b"not a pdf").unwrap_err();
        assert!(matches!(err, DocumentError::PdfExtraction(_)));
    }
}
