use serde::{Deserialize, Serialize};

use super::ExtractionError;
use crate::pipeline::import::short_digest;

/// What gets sent to the model: the document itself or its text layer.
#[derive(Clone, PartialEq, Eq)]
pub enum DocumentPayload {
    /// Raw document, sent inline for multimodal reading (scans, photos).
    Bytes { mime_type: String, data: Vec<u8> },
    /// Text extracted locally from a digital PDF or a plain-text file.
    Text(String),
}

impl DocumentPayload {
    pub fn pdf(data: Vec<u8>) -> Self {
        Self::Bytes {
            mime_type: "application/pdf".into(),
            data,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Bytes { data, .. } => data.is_empty(),
            Self::Text(text) => text.trim().is_empty(),
        }
    }

    /// Size in bytes of the document or text.
    pub fn len(&self) -> usize {
        match self {
            Self::Bytes { data, .. } => data.len(),
            Self::Text(text) => text.len(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Bytes { .. } => "bytes",
            Self::Text(_) => "text",
        }
    }

    pub fn digest(&self) -> String {
        match self {
            Self::Bytes { data, .. } => short_digest(data),
            Self::Text(text) => short_digest(text.as_bytes()),
        }
    }
}

// Document bodies can be megabytes; never dump them into logs.
impl std::fmt::Debug for DocumentPayload {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bytes { mime_type, data } => f
                .debug_struct("Bytes")
                .field("mime_type", mime_type)
                .field("len", &data.len())
                .finish(),
            Self::Text(text) => f.debug_struct("Text").field("len", &text.len()).finish(),
        }
    }
}

/// How the payload was obtained
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionMethod {
    /// Document bytes sent as-is.
    Inline,
    /// PDF text layer extracted locally.
    PdfText,
    /// File was already plain text.
    PlainTextRead,
}

/// Per-page extraction result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageExtraction {
    pub page_number: usize,
    pub text: String,
    /// False when the page yielded too few characters to be useful.
    pub has_text: bool,
}

/// PDF text extraction abstraction
pub trait PdfExtractor {
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<Vec<PageExtraction>, ExtractionError>;
}
