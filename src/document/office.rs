//! Office Open XML (docx/xlsx/pptx) extraction: unzip the container, read
//! `docProps/core.xml` for properties, pull-parse the body XML for text.

use super::{DocumentError, DocumentMetadata};
use quick_xml::events::Event;
use quick_xml::Reader;
use std::io::{Cursor, Read};
use zip::ZipArchive;

#[derive(Debug)]
pub struct OfficeExtraction {
    pub text: String,
    pub metadata: DocumentMetadata,
}

/// Content-bearing XML entries to try, in order, for docx/pptx/xlsx
/// respectively. The first one present in the archive wins.
const BODY_CANDIDATES: &[&str] = &["word/document.xml", "xl/sharedStrings.xml"];

pub fn extract(raw: &[u8]) -> Result<OfficeExtraction, DocumentError> {
    let mut archive = ZipArchive::new(Cursor::new(raw))?;

    let metadata = read_core_properties(&mut archive)?;

    let mut text = String::new();
    let mut found_body = false;
    for candidate in BODY_CANDIDATES {
        if let Some(xml) = read_entry(&mut archive, candidate) {
            text = extract_text_from_xml(&xml);
            found_body = true;
            break;
        }
    }

    if !found_body {
        let slide_names: Vec<String> = (0..archive.len())
            .filter_map(|i| archive.by_index(i).ok().map(|f| f.name().to_string()))
            .filter(|name| name.starts_with("ppt/slides/slide") && name.ends_with(".xml"))
            .collect();
        let mut slides = slide_names;
        slides.sort();
        let mut parts = Vec::new();
        for name in slides {
            if let Some(xml) = read_entry(&mut archive, &name) {
                parts.push(extract_text_from_xml(&xml));
            }
        }
        text = parts.join("\n");
    }

    Ok(OfficeExtraction { text, metadata })
}

fn read_entry(archive: &mut ZipArchive<Cursor<&[u8]>>, name: &str) -> Option<String> {
    let mut file = archive.by_name(name).ok()?;
    let mut contents = String::new();
    file.read_to_string(&mut contents).ok()?;
    Some(contents)
}

fn read_core_properties(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
) -> Result<DocumentMetadata, DocumentError> {
    let mut metadata = DocumentMetadata::default();
    let Some(xml) = read_entry(archive, "docProps/core.xml") else {
        return Ok(metadata);
    };

    let mut reader = Reader::from_str(&xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut current_tag = String::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                current_tag = local_name(e.name().as_ref());
            }
            Ok(Event::Text(e)) => {
                let value = e.unescape().unwrap_or_default().into_owned();
                match current_tag.as_str() {
                    "title" => metadata.title = Some(value),
                    "creator" => metadata.author = Some(value),
                    "created" => metadata.created = Some(value),
                    "modified" => metadata.modified = Some(value),
                    "keywords" => metadata.keywords = Some(value),
                    _ => {}
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(DocumentError::OfficeExtraction(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    Ok(metadata)
}

fn local_name(qualified: &[u8]) -> String {
    let name = String::from_utf8_lossy(qualified);
    name.rsplit(':').next().unwrap_or(&name).to_string()
}

fn extract_text_from_xml(xml: &str) -> String {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);
    let mut buf = Vec::new();
    let mut parts = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Text(e)) => {
                if let Ok(text) = e.unescape() {
                    if !text.trim().is_empty() {
                        parts.push(text.into_owned());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    parts.join(" ")
}
