//! Document processor: detects downloadable document content types, saves
//! the raw artifact, extracts text and metadata, and hands the derived text
//! back to the caller as plain-text content for the originating URL.
//!
//! PDF parsing is pure Rust (`lopdf`) and Office Open XML formats are parsed
//! as ZIP containers of XML (`zip` + `quick-xml`) so the crawler stays a
//! single static binary with no external converter dependency.

mod office;
mod pdf;

use crate::url::safe_name;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("I/O error handling document artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF extraction failed: {0}")]
    PdfExtraction(String),

    #[error("Office document extraction failed: {0}")]
    OfficeExtraction(String),

    #[error("zip container error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("unsupported document format: {0}")]
    Unsupported(String),

    #[error("metadata serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type DocumentResult<T> = Result<T, DocumentError>;

/// The document sub-formats this processor knows how to extract text from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    WordProcessing,
    Spreadsheet,
    Presentation,
    OpenDocument,
    Unknown,
}

impl DocumentKind {
    /// Classifies a response by its `Content-Type` header (and, failing
    /// that, the URL's extension).
    pub fn classify(content_type: &str, url: &str) -> Self {
        let content_type = content_type.to_lowercase();
        if content_type.contains("pdf") {
            return Self::Pdf;
        }
        if content_type.contains("msword") || content_type.contains("wordprocessingml") {
            return Self::WordProcessing;
        }
        if content_type.contains("ms-excel") || content_type.contains("spreadsheetml") {
            return Self::Spreadsheet;
        }
        if content_type.contains("ms-powerpoint") || content_type.contains("presentationml") {
            return Self::Presentation;
        }
        if content_type.contains("opendocument") {
            return Self::OpenDocument;
        }

        let lower_url = url.to_lowercase();
        if lower_url.ends_with(".pdf") {
            Self::Pdf
        } else if lower_url.ends_with(".docx") || lower_url.ends_with(".doc") {
            Self::WordProcessing
        } else if lower_url.ends_with(".xlsx") || lower_url.ends_with(".xls") {
            Self::Spreadsheet
        } else if lower_url.ends_with(".pptx") || lower_url.ends_with(".ppt") {
            Self::Presentation
        } else if lower_url.ends_with(".odt")
            || lower_url.ends_with(".ods")
            || lower_url.ends_with(".odp")
        {
            Self::OpenDocument
        } else {
            Self::Unknown
        }
    }

    fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::WordProcessing => "docx",
            Self::Spreadsheet => "xlsx",
            Self::Presentation => "pptx",
            Self::OpenDocument => "odt",
            Self::Unknown => "bin",
        }
    }
}

/// Document properties common across formats. Any field the source format
/// doesn't expose is left `None` rather than failing extraction.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub title: Option<String>,
    pub author: Option<String>,
    pub created: Option<String>,
    pub modified: Option<String>,
    pub keywords: Option<String>,
    pub page_count: Option<u32>,
}

/// Result of processing one document: where the raw artifact landed, and
/// whatever text/metadata could be pulled from it.
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub kind: DocumentKind,
    pub artifact_path: PathBuf,
    pub text_path: Option<PathBuf>,
    pub metadata_path: Option<PathBuf>,
    pub extracted_text: Option<String>,
    pub metadata: DocumentMetadata,
}

pub struct DocumentProcessor {
    documents_dir: PathBuf,
}

impl DocumentProcessor {
    pub fn new(output_dir: impl AsRef<Path>) -> Self {
        Self {
            documents_dir: output_dir.as_ref().join("documents"),
        }
    }

    /// Saves `raw` under a URL-derived name, attempts format-specific
    /// extraction, and persists whatever text/metadata resulted. Unsupported
    /// sub-formats still save the artifact; only extraction is skipped.
    pub fn process_document(
        &self,
        url: &str,
        content_type: &str,
        raw: &[u8],
    ) -> DocumentResult<ProcessedDocument> {
        std::fs::create_dir_all(&self.documents_dir)?;

        let kind = DocumentKind::classify(content_type, url);
        let base_name = safe_name(url);
        let artifact_path = self
            .documents_dir
            .join(format!("{base_name}.{}", kind.extension()));
        std::fs::write(&artifact_path, raw)?;

        let extraction = match kind {
            DocumentKind::Pdf => pdf::extract(raw)
                .map(|e| (Some(e.text), e.metadata))
                .unwrap_or_else(|_| (None, DocumentMetadata::default())),
            DocumentKind::WordProcessing
            | DocumentKind::Spreadsheet
            | DocumentKind::Presentation => office::extract(raw)
                .map(|e| (Some(e.text), e.metadata))
                .unwrap_or_else(|_| (None, DocumentMetadata::default())),
            DocumentKind::OpenDocument | DocumentKind::Unknown => {
                (None, DocumentMetadata::default())
            }
        };
        let (extracted_text, metadata) = extraction;

        let text_path = if let Some(text) = extracted_text.as_ref().filter(|t| !t.trim().is_empty()) {
            let path = self.documents_dir.join(format!("{base_name}.txt"));
            std::fs::write(&path, text)?;
            Some(path)
        } else {
            None
        };

        let metadata_path = {
            let path = self
                .documents_dir
                .join(format!("{base_name}.metadata.json"));
            std::fs::write(&path, serde_json::to_string_pretty(&metadata)?)?;
            Some(path)
        };

        Ok(ProcessedDocument {
            kind,
            artifact_path,
            text_path,
            metadata_path,
            extracted_text,
            metadata,
        })
    }
}
