use serde::Serialize;

use super::classify::FailureKind;
use super::StructuringError;
use crate::pipeline::extraction::DocumentPayload;

/// Instruction pair sent with every document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionPrompt {
    /// System instruction describing fields and output schema.
    pub system: String,
    /// Short user-turn directive accompanying the document.
    pub directive: String,
}

/// Hosted generative model abstraction (allows mocking).
///
/// Implementations must ask the service for JSON-formatted output and
/// return the reply text untouched.
pub trait GenerativeClient {
    fn generate(
        &self,
        model: &str,
        prompt: &ExtractionPrompt,
        payload: &DocumentPayload,
    ) -> Result<String, StructuringError>;
}

/// One failed model call, kept for the caller's diagnostics.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttemptRecord {
    pub model: String,
    pub kind: FailureKind,
    pub message: String,
    /// Whether the requester paused after this attempt.
    pub paused: bool,
}
