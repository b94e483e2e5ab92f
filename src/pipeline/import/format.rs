use std::path::Path;

use serde::{Deserialize, Serialize};

use super::ImportError;

/// Broad file categories we handle
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    DigitalPdf,
    ScannedPdf,
    Image,
    PlainText,
    Unsupported,
}

impl FileCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DigitalPdf => "digital_pdf",
            Self::ScannedPdf => "scanned_pdf",
            Self::Image => "image",
            Self::PlainText => "plain_text",
            Self::Unsupported => "unsupported",
        }
    }
}

/// Result of format detection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FormatDetection {
    pub mime_type: String,
    pub category: FileCategory,
    pub file_size_bytes: u64,
}

/// Inline document limit of the hosted model API.
pub const MAX_FILE_SIZE: u64 = 20 * 1024 * 1024;

/// How much of a PDF is scanned for text operators.
const TEXT_PROBE_BYTES: usize = 256 * 1024;

/// Reject files over [`MAX_FILE_SIZE`] from metadata alone. Returns the size.
pub fn check_file_size(path: &Path) -> Result<u64, ImportError> {
    let size = std::fs::metadata(path)?.len();
    if size > MAX_FILE_SIZE {
        return Err(too_large(size));
    }
    Ok(size)
}

/// Read a file and detect its format.
pub fn detect_format(path: &Path) -> Result<FormatDetection, ImportError> {
    check_file_size(path)?;
    let bytes = std::fs::read(path)?;
    detect_format_bytes(&bytes)
}

/// Detect file format from magic bytes (NOT file extensions).
pub fn detect_format_bytes(bytes: &[u8]) -> Result<FormatDetection, ImportError> {
    let file_size = bytes.len() as u64;
    if file_size == 0 {
        return Err(ImportError::EmptyDocument);
    }
    if file_size > MAX_FILE_SIZE {
        return Err(too_large(file_size));
    }

    let (mime_type, category) = match &bytes[..bytes.len().min(12)] {
        // PDF: starts with %PDF
        [0x25, 0x50, 0x44, 0x46, ..] => {
            let category = if pdf_has_text(bytes) {
                FileCategory::DigitalPdf
            } else {
                FileCategory::ScannedPdf
            };
            ("application/pdf", category)
        }
        // JPEG: starts with FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => ("image/jpeg", FileCategory::Image),
        // PNG: starts with 89 50 4E 47
        [0x89, 0x50, 0x4E, 0x47, ..] => ("image/png", FileCategory::Image),
        // WEBP: RIFF....WEBP
        [b'R', b'I', b'F', b'F', _, _, _, _, b'W', b'E', b'B', b'P'] => {
            ("image/webp", FileCategory::Image)
        }
        // HEIC/HEIF: "ftyp" at offset 4
        header if header.len() >= 12 && &header[4..8] == b"ftyp" => {
            ("image/heic", FileCategory::Image)
        }
        _ if is_likely_text(bytes) => ("text/plain", FileCategory::PlainText),
        _ => ("application/octet-stream", FileCategory::Unsupported),
    };

    Ok(FormatDetection {
        mime_type: mime_type.to_string(),
        category,
        file_size_bytes: file_size,
    })
}

/// Check if a PDF has extractable text (digital vs scanned).
/// Uses a heuristic: search for text stream markers in raw PDF bytes.
fn pdf_has_text(bytes: &[u8]) -> bool {
    let probe = &bytes[..bytes.len().min(TEXT_PROBE_BYTES)];
    let content = String::from_utf8_lossy(probe);

    // BT/ET = begin/end text, Tj/TJ = show text, Tf = set font
    let text_markers = ["BT", "ET", " Tj", " TJ", " Tf"];
    let marker_count: usize = text_markers
        .iter()
        .map(|m| content.matches(m).count())
        .sum();

    // >= 3 text markers suggests a digital PDF with a text layer
    marker_count >= 3
}

/// Valid UTF-8 in the first 4 KiB and mostly printable.
fn is_likely_text(bytes: &[u8]) -> bool {
    let head = &bytes[..bytes.len().min(4096)];
    let text = match std::str::from_utf8(head) {
        Ok(t) => t,
        // A multi-byte char may straddle the 4 KiB cut.
        Err(e) if e.error_len().is_none() => match std::str::from_utf8(&head[..e.valid_up_to()]) {
            Ok(t) if !t.is_empty() => t,
            _ => return false,
        },
        Err(_) => return false,
    };

    let total = text.chars().count().max(1);
    let printable = text
        .chars()
        .filter(|c| !c.is_control() || c.is_whitespace())
        .count();
    printable as f64 / total as f64 > 0.80
}

fn too_large(size: u64) -> ImportError {
    ImportError::FileTooLarge {
        size_mb: size as f64 / (1024.0 * 1024.0),
        max_mb: MAX_FILE_SIZE / (1024 * 1024),
    }
}
