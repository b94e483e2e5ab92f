//! Document processing pipeline.
//!
//! Single entry point that drives one tour document end to end:
//! detect format → build payload → request → parse → reconcile dates.
//!
//! The generative client and the PDF text extractor are injected, so the
//! processor is testable without network access.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use crate::pipeline::extraction::{
    extract_text_layer, DocumentPayload, ExtractionMethod, PdfExtractor, PdfTextExtractor,
};
use crate::pipeline::import::{check_file_size, detect_format_bytes, FileCategory, ImportError};
use crate::pipeline::structuring::{
    parse_tour_reply, reconcile_dates, AttemptRecord, ExtractionRequest, ExtractionRequester,
    ParsedReply, RequestError,
};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Import failed: {0}")]
    Import(#[from] ImportError),

    #[error("Request failed: {0}")]
    Request(#[from] RequestError),
}

// ---------------------------------------------------------------------------
// Options and result
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct ProcessOptions {
    /// Shamsi year used when the document omits one.
    pub target_year: i32,
    pub candidate_models: Vec<String>,
    /// Send the PDF text layer instead of the document when there is one.
    pub local_text: bool,
}

/// Outcome of processing one document.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessedTour {
    /// Model that produced the reply.
    pub model: String,
    pub method: ExtractionMethod,
    pub reply: ParsedReply,
    /// Non-fatal issues found while parsing and reconciling.
    pub warnings: Vec<String>,
    /// Failed attempts before the successful one.
    pub attempts: Vec<AttemptRecord>,
}

// ---------------------------------------------------------------------------
// Processor
// ---------------------------------------------------------------------------

pub struct DocumentProcessor {
    requester: ExtractionRequester,
    pdf_extractor: Arc<dyn PdfExtractor + Send + Sync>,
}

impl DocumentProcessor {
    pub fn new(requester: ExtractionRequester) -> Self {
        Self {
            requester,
            pdf_extractor: Arc::new(PdfTextExtractor),
        }
    }

    pub fn with_pdf_extractor(mut self, extractor: Arc<dyn PdfExtractor + Send + Sync>) -> Self {
        self.pdf_extractor = extractor;
        self
    }

    /// Process a document from disk.
    pub fn process_file(
        &self,
        path: &Path,
        options: &ProcessOptions,
    ) -> Result<ProcessedTour, ProcessingError> {
        let span = tracing::info_span!("process_file", file = %path.display());
        let _guard = span.enter();

        check_file_size(path)?;
        let bytes = std::fs::read(path).map_err(ImportError::from)?;
        self.process_bytes(&bytes, options)
    }

    /// Process an in-memory document.
    pub fn process_bytes(
        &self,
        bytes: &[u8],
        options: &ProcessOptions,
    ) -> Result<ProcessedTour, ProcessingError> {
        let format = detect_format_bytes(bytes)?;
        tracing::info!(
            category = format.category.as_str(),
            mime = %format.mime_type,
            size = format.file_size_bytes,
            "Document format detected"
        );

        let mut warnings = Vec::new();
        let (payload, method) = self.build_payload(
            bytes,
            &format.mime_type,
            format.category,
            options,
            &mut warnings,
        )?;

        let request = ExtractionRequest {
            payload,
            target_year: options.target_year,
            candidate_models: options.candidate_models.clone(),
        };
        let raw = self.requester.request(&request)?;

        let (mut reply, parse_warnings) = parse_tour_reply(&raw.text);
        warnings.extend(parse_warnings);

        match &mut reply {
            ParsedReply::Structured(tour) => {
                warnings.extend(reconcile_dates(tour, options.target_year));
            }
            ParsedReply::Unparseable { reason, .. } => {
                tracing::warn!(model = %raw.model, reason = %reason, "Model reply is not valid JSON");
            }
        }

        for warning in &warnings {
            tracing::warn!(warning = %warning, "Extraction warning");
        }

        Ok(ProcessedTour {
            model: raw.model,
            method,
            reply,
            warnings,
            attempts: raw.attempts,
        })
    }

    fn build_payload(
        &self,
        bytes: &[u8],
        mime_type: &str,
        category: FileCategory,
        options: &ProcessOptions,
        warnings: &mut Vec<String>,
    ) -> Result<(DocumentPayload, ExtractionMethod), ProcessingError> {
        let inline = || DocumentPayload::Bytes {
            mime_type: mime_type.to_string(),
            data: bytes.to_vec(),
        };

        match category {
            FileCategory::Unsupported => {
                Err(ImportError::UnsupportedFormat(mime_type.to_string()).into())
            }
            FileCategory::PlainText => {
                let text = String::from_utf8_lossy(bytes).into_owned();
                Ok((DocumentPayload::Text(text), ExtractionMethod::PlainTextRead))
            }
            FileCategory::DigitalPdf if options.local_text => {
                match extract_text_layer(self.pdf_extractor.as_ref(), bytes) {
                    Ok(Some(text)) => Ok((DocumentPayload::Text(text), ExtractionMethod::PdfText)),
                    Ok(None) => {
                        tracing::info!("Text layer too thin, sending document as-is");
                        Ok((inline(), ExtractionMethod::Inline))
                    }
                    Err(e) => {
                        warnings.push(format!(
                            "Local text extraction failed, sent document as-is: {e}"
                        ));
                        Ok((inline(), ExtractionMethod::Inline))
                    }
                }
            }
            FileCategory::ScannedPdf if options.local_text => {
                tracing::info!("No text layer found, sending document as-is");
                Ok((inline(), ExtractionMethod::Inline))
            }
            FileCategory::DigitalPdf | FileCategory::ScannedPdf | FileCategory::Image => {
                Ok((inline(), ExtractionMethod::Inline))
            }
        }
    }
}
