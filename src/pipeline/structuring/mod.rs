pub mod types;
pub mod prompt;
pub mod classify;
pub mod gemini;
pub mod gemini_types;
pub mod parser;
pub mod orchestrator;
pub mod reconcile;

pub use types::*;
pub use prompt::*;
pub use classify::*;
pub use gemini::*;
pub use parser::*;
pub use orchestrator::*;
pub use reconcile::*;

use thiserror::Error;

/// Failure of a single model call.
///
/// The fallback loop never inspects these directly; it asks for
/// [`StructuringError::kind`] instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StructuringError {
    #[error("Generative API is not reachable at {0}")]
    Connection(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Generative API returned error (status {status}): {message}")]
    Api {
        status: u16,
        /// Symbolic status from the error body, e.g. `RESOURCE_EXHAUSTED`.
        api_status: Option<String>,
        message: String,
    },

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Response parsing error: {0}")]
    ResponseParsing(String),

    #[error("Model returned no content: {0}")]
    EmptyResponse(String),

    #[error("Model output is not valid JSON: {0}")]
    MalformedOutput(String),

    #[error("Invalid model identifier: '{0}'")]
    InvalidModelId(String),
}
