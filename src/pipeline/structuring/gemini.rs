use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use base64::Engine as _;
use zeroize::Zeroizing;

use super::gemini_types::{
    normalize_model_id, ApiErrorEnvelope, Content, GenerateContentRequest,
    GenerateContentResponse, GenerationConfig, Part,
};
use super::prompt::wrap_document_text;
use super::types::{ExtractionPrompt, GenerativeClient};
use super::StructuringError;
use crate::pipeline::extraction::DocumentPayload;

/// Public Gemini endpoint.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Error bodies are echoed into messages; keep them short.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Blocking HTTP client for the Gemini `generateContent` API.
pub struct GeminiClient {
    base_url: String,
    api_key: Zeroizing<String>,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl GeminiClient {
    pub fn new(
        base_url: &str,
        api_key: Zeroizing<String>,
        timeout_secs: u64,
    ) -> Result<Self, StructuringError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| StructuringError::HttpClient(e.to_string()))?;

        Ok(Self::with_http_client(base_url, api_key, client, timeout_secs))
    }

    /// Build around an existing HTTP client (custom proxy or TLS settings).
    pub fn with_http_client(
        base_url: &str,
        api_key: Zeroizing<String>,
        client: reqwest::blocking::Client,
        timeout_secs: u64,
    ) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
            timeout_secs,
        }
    }

    fn endpoint(&self, model_id: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, model_id)
    }
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

/// Build the request body: system instruction, one user turn with the
/// directive and the document, JSON output.
pub fn build_request(prompt: &ExtractionPrompt, payload: &DocumentPayload) -> GenerateContentRequest {
    let document_part = match payload {
        DocumentPayload::Bytes { mime_type, data } => Part::inline(
            mime_type.as_str(),
            base64::engine::general_purpose::STANDARD.encode(data),
        ),
        DocumentPayload::Text(text) => Part::text(wrap_document_text(text)),
    };

    GenerateContentRequest {
        system_instruction: Content {
            role: None,
            parts: vec![Part::text(prompt.system.as_str())],
        },
        contents: vec![Content {
            role: Some("user".into()),
            parts: vec![Part::text(prompt.directive.as_str()), document_part],
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json".into(),
            temperature: Some(0.0),
        },
    }
}

/// Turn a non-success HTTP response into a typed error.
pub fn api_error(status: u16, body: &str) -> StructuringError {
    match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(envelope) => StructuringError::Api {
            status,
            api_status: envelope.error.status,
            message: envelope.error.message,
        },
        Err(_) => StructuringError::Api {
            status,
            api_status: None,
            message: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
        },
    }
}

impl GenerativeClient for GeminiClient {
    fn generate(
        &self,
        model: &str,
        prompt: &ExtractionPrompt,
        payload: &DocumentPayload,
    ) -> Result<String, StructuringError> {
        let model_id = normalize_model_id(model)?;
        let url = self.endpoint(model_id);
        let body = build_request(prompt, payload);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", self.api_key.as_str())
            .json(&body)
            .send()
            .map_err(|e| {
                if e.is_connect() {
                    StructuringError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    StructuringError::Timeout(self.timeout_secs)
                } else {
                    StructuringError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(api_error(status.as_u16(), &body));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .map_err(|e| StructuringError::ResponseParsing(e.to_string()))?;

        parsed.into_text()
    }
}

/// Scripted client for tests: a fixed outcome per model id, with a call log.
///
/// Models without a script fail with a 404-style error.
#[derive(Default)]
pub struct MockGenerativeClient {
    outcomes: HashMap<String, Result<String, StructuringError>>,
    calls: Mutex<Vec<String>>,
}

impl MockGenerativeClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_response(mut self, model: &str, response: &str) -> Self {
        self.outcomes
            .insert(model.to_string(), Ok(response.to_string()));
        self
    }

    pub fn with_error(mut self, model: &str, error: StructuringError) -> Self {
        self.outcomes.insert(model.to_string(), Err(error));
        self
    }

    /// Models called so far, in call order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls().len()
    }
}

impl GenerativeClient for MockGenerativeClient {
    fn generate(
        &self,
        model: &str,
        _prompt: &ExtractionPrompt,
        _payload: &DocumentPayload,
    ) -> Result<String, StructuringError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(model.to_string());
        }
        self.outcomes.get(model).cloned().unwrap_or_else(|| {
            Err(StructuringError::Api {
                status: 404,
                api_status: Some("NOT_FOUND".into()),
                message: format!("models/{model} is not found"),
            })
        })
    }
}
