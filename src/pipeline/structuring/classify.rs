//! Normalizes model-call failures into a closed set of kinds.
//!
//! Status codes win when the transport gives us one. Otherwise the error
//! text is matched against known phrasings, since SDK wrappers and proxies
//! tend to flatten everything into a message string.

use serde::{Deserialize, Serialize};

use super::StructuringError;

/// What the fallback loop needs to know about a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Quota or rate limit hit. Worth a short pause before the next model.
    RateLimited,
    /// The identifier is unknown to the service. Skip without waiting.
    NotFound,
    /// Anything else.
    Other,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::NotFound => "not_found",
            Self::Other => "other",
        }
    }
}

const RATE_LIMIT_MARKERS: &[&str] = &[
    "429",
    "quota",
    "rate limit",
    "rate-limit",
    "ratelimit",
    "resource exhausted",
    "resource_exhausted",
    "too many requests",
];

const NOT_FOUND_MARKERS: &[&str] = &[
    "404",
    "not found",
    "not_found",
    "is not supported for generatecontent",
];

/// Classify an HTTP status code. `None` for codes that carry no signal.
pub fn classify_status(status: u16) -> Option<FailureKind> {
    match status {
        429 => Some(FailureKind::RateLimited),
        404 => Some(FailureKind::NotFound),
        _ => None,
    }
}

/// Classify the symbolic status of a Google API error body.
pub fn classify_api_status(api_status: &str) -> Option<FailureKind> {
    match api_status {
        "RESOURCE_EXHAUSTED" => Some(FailureKind::RateLimited),
        "NOT_FOUND" => Some(FailureKind::NotFound),
        _ => None,
    }
}

/// Classify free-form error text. Rate-limit phrasing is checked first.
pub fn classify_message(message: &str) -> FailureKind {
    let lower = message.to_lowercase();
    if RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m)) {
        FailureKind::RateLimited
    } else if NOT_FOUND_MARKERS.iter().any(|m| lower.contains(m)) {
        FailureKind::NotFound
    } else {
        FailureKind::Other
    }
}

impl StructuringError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Api {
                status,
                api_status,
                message,
            } => classify_status(*status)
                .or_else(|| api_status.as_deref().and_then(classify_api_status))
                .unwrap_or_else(|| classify_message(message)),
            // Transport failures say nothing about the model; URLs and ports
            // in their text must not be mistaken for status codes.
            Self::Connection(_) | Self::Timeout(_) | Self::HttpClient(_) => FailureKind::Other,
            Self::MalformedOutput(_) | Self::InvalidModelId(_) => FailureKind::Other,
            Self::ResponseParsing(msg) | Self::EmptyResponse(msg) => classify_message(msg),
        }
    }
}
