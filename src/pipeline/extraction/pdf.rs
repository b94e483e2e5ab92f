use super::types::{PageExtraction, PdfExtractor};
use super::ExtractionError;

/// Pages with fewer non-whitespace characters than this count as empty.
pub const MIN_PAGE_CHARS: usize = 10;

/// Below this, the text layer is not worth sending instead of the document.
pub const MIN_DOCUMENT_CHARS: usize = 50;

/// PDF text extractor using the pdf-extract crate.
/// Handles digital PDFs with embedded text layers.
pub struct PdfTextExtractor;

impl PdfExtractor for PdfTextExtractor {
    fn extract_text(&self, pdf_bytes: &[u8]) -> Result<Vec<PageExtraction>, ExtractionError> {
        let page_texts = pdf_extract::extract_text_from_mem_by_pages(pdf_bytes)
            .map_err(|e| ExtractionError::PdfParsing(e.to_string()))?;

        let pages = page_texts
            .into_iter()
            .enumerate()
            .map(|(i, text)| PageExtraction {
                page_number: i + 1,
                has_text: meaningful_chars(&text) >= MIN_PAGE_CHARS,
                text,
            })
            .collect();

        Ok(pages)
    }
}

/// Join pages with `--- Page N ---` markers so the model can still tell
/// page boundaries apart.
pub fn join_pages(pages: &[PageExtraction]) -> String {
    pages
        .iter()
        .filter(|p| p.has_text)
        .map(|p| format!("--- Page {} ---\n{}", p.page_number, p.text.trim()))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Extract the text layer, or `None` when it is too thin to replace the
/// document (mostly-scanned PDFs with a stray text object).
pub fn extract_text_layer(
    extractor: &dyn PdfExtractor,
    pdf_bytes: &[u8],
) -> Result<Option<String>, ExtractionError> {
    let pages = extractor.extract_text(pdf_bytes)?;
    let text = join_pages(&pages);
    let chars: usize = pages
        .iter()
        .filter(|p| p.has_text)
        .map(|p| meaningful_chars(&p.text))
        .sum();

    tracing::debug!(
        pages = pages.len(),
        pages_with_text = pages.iter().filter(|p| p.has_text).count(),
        chars,
        "PDF text layer extracted"
    );

    if chars < MIN_DOCUMENT_CHARS {
        return Ok(None);
    }
    Ok(Some(text))
}

fn meaningful_chars(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}
