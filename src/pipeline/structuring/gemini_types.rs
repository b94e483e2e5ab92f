//! Gemini `generateContent` REST contract and model-id validation.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use super::StructuringError;

// ──────────────────────────────────────────────
// Request
// ──────────────────────────────────────────────

/// Body of POST `/v1beta/models/{model}:generateContent`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    pub system_instruction: Content,
    pub contents: Vec<Content>,
    pub generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default)]
    pub parts: Vec<Part>,
}

/// Either a text part or an inline binary part.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inline_data: Option<InlineData>,
}

impl Part {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            inline_data: None,
        }
    }

    pub fn inline(mime_type: impl Into<String>, base64_data: String) -> Self {
        Self {
            text: None,
            inline_data: Some(InlineData {
                mime_type: mime_type.into(),
                data: base64_data,
            }),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    /// Base64-encoded document bytes.
    pub data: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    pub response_mime_type: String,
    /// 0.0 for deterministic extraction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
}

// ──────────────────────────────────────────────
// Response
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default)]
    pub candidates: Vec<Candidate>,
    #[serde(default)]
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    #[serde(default)]
    pub content: Option<Content>,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(default)]
    pub block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text parts of the first candidate.
    pub fn into_text(self) -> Result<String, StructuringError> {
        let block_reason = self
            .prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.clone());

        let candidate = self.candidates.into_iter().next().ok_or_else(|| {
            StructuringError::EmptyResponse(match block_reason {
                Some(reason) => format!("prompt blocked ({reason})"),
                None => "no candidates".to_string(),
            })
        })?;

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            let reason = candidate.finish_reason.unwrap_or_else(|| "unknown".into());
            return Err(StructuringError::EmptyResponse(format!(
                "candidate has no text (finish reason {reason})"
            )));
        }
        Ok(text)
    }
}

/// Google API error envelope: `{ "error": { code, message, status } }`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorEnvelope {
    pub error: ApiErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub status: Option<String>,
}

// ──────────────────────────────────────────────
// Model id validation
// ──────────────────────────────────────────────

static MODEL_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9._-]{0,127}$").unwrap());

/// Normalize and validate a model identifier before it goes into a URL path.
///
/// Accepts an optional `models/` prefix (as listed by the API) and strips it.
/// Valid: `gemini-1.5-flash`, `models/gemini-2.0-flash-exp`
/// Invalid: `../v1/files`, `gemini flash`, `a/b`
pub fn normalize_model_id(model: &str) -> Result<&str, StructuringError> {
    let trimmed = model.trim();
    let id = trimmed.strip_prefix("models/").unwrap_or(trimmed);
    if !MODEL_ID.is_match(id) {
        return Err(StructuringError::InvalidModelId(model.to_string()));
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_camel_case() {
        let request = GenerateContentRequest {
            system_instruction: Content {
                role: None,
                parts: vec![Part::text("sys")],
            },
            contents: vec![Content {
                role: Some("user".into()),
                parts: vec![Part::text("go"), Part::inline("application/pdf", "AAAA".into())],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json".into(),
                temperature: None,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "sys");
        assert!(json["systemInstruction"].get("role").is_none());
        assert_eq!(json["contents"][0]["role"], "user");
        assert_eq!(
            json["contents"][0]["parts"][1]["inlineData"]["mimeType"],
            "application/pdf"
        );
        assert!(json["contents"][0]["parts"][1].get("text").is_none());
        assert_eq!(
            json["generationConfig"]["responseMimeType"],
            "application/json"
        );
        assert!(json["generationConfig"].get("temperature").is_none());
    }

    #[test]
    fn response_text_concatenates_parts() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"{\"a\":"},{"text":"1}"}]},"finishReason":"STOP"}]}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.into_text().unwrap(), "{\"a\":1}");
    }

    #[test]
    fn blocked_prompt_is_empty_response() {
        let body = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(body).unwrap();
        let err = parsed.into_text().unwrap_err();
        assert!(matches!(err, StructuringError::EmptyResponse(ref m) if m.contains("SAFETY")));
    }

    #[test]
    fn candidate_without_text_is_empty_response() {
        let body = r#"{"candidates":[{"finishReason":"MAX_TOKENS"}]}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(body).unwrap();
        let err = parsed.into_text().unwrap_err();
        assert!(err.to_string().contains("MAX_TOKENS"));
    }

    #[test]
    fn error_envelope_parses() {
        let body = r#"{"error":{"code":429,"message":"Quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        let env: ApiErrorEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(env.error.message, "Quota exceeded");
        assert_eq!(env.error.status.as_deref(), Some("RESOURCE_EXHAUSTED"));
    }

    #[test]
    fn model_id_validation() {
        assert_eq!(normalize_model_id("gemini-1.5-flash").unwrap(), "gemini-1.5-flash");
        assert_eq!(
            normalize_model_id("models/gemini-2.0-flash-exp").unwrap(),
            "gemini-2.0-flash-exp"
        );
        assert!(normalize_model_id("../v1/files").is_err());
        assert!(normalize_model_id("gemini flash").is_err());
        assert!(normalize_model_id("a/b").is_err());
        assert!(normalize_model_id("").is_err());
    }
}
