use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use thiserror::Error;
use uuid::Uuid;

use super::classify::FailureKind;
use super::parser::is_json_document;
use super::prompt::build_extraction_prompt;
use super::types::{AttemptRecord, GenerativeClient};
use super::StructuringError;
use crate::pipeline::extraction::DocumentPayload;

/// Fixed backoff after a rate-limited attempt.
pub const DEFAULT_RATE_LIMIT_PAUSE: Duration = Duration::from_secs(2);

/// Prefix of the legacy string rendering of a failed request.
pub const ERROR_MARKER: &str = "ERROR:";

/// Blocking delay between attempts (allows tests to observe waits).
pub trait Pause {
    fn pause(&self, duration: Duration);
}

/// Sleeps the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadPause;

impl Pause for ThreadPause {
    fn pause(&self, duration: Duration) {
        std::thread::sleep(duration);
    }
}

/// Records requested pauses without sleeping.
#[derive(Debug, Default)]
pub struct RecordingPause {
    pauses: Mutex<Vec<Duration>>,
}

impl RecordingPause {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pauses(&self) -> Vec<Duration> {
        self.pauses.lock().map(|p| p.clone()).unwrap_or_default()
    }
}

impl Pause for RecordingPause {
    fn pause(&self, duration: Duration) {
        if let Ok(mut pauses) = self.pauses.lock() {
            pauses.push(duration);
        }
    }
}

/// What to do with a successful call whose text is not a JSON object.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MalformedPolicy {
    /// Hand the text back; the caller decides what to do with it.
    #[default]
    ReturnRaw,
    /// Record the reply as a failed attempt and try the next candidate.
    NextCandidate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackPolicy {
    pub rate_limit_pause: Duration,
    pub malformed: MalformedPolicy,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        Self {
            rate_limit_pause: DEFAULT_RATE_LIMIT_PAUSE,
            malformed: MalformedPolicy::ReturnRaw,
        }
    }
}

/// One document to extract, with the year and model order to use.
#[derive(Debug, Clone)]
pub struct ExtractionRequest {
    pub payload: DocumentPayload,
    /// Solar Hijri year injected into the instruction.
    pub target_year: i32,
    /// Tried strictly in order.
    pub candidate_models: Vec<String>,
}

/// Text returned by the first candidate that answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawExtraction {
    pub model: String,
    pub text: String,
    /// Failed attempts that preceded the success.
    pub attempts: Vec<AttemptRecord>,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RequestError {
    #[error("No candidate models configured")]
    NoCandidates,

    #[error("Document payload is empty")]
    EmptyDocument,

    #[error("All {} candidate models failed. Last error: {last_error}", .attempts.len())]
    Exhausted {
        /// Message of the last `Other` failure, or of the final attempt
        /// when every failure was rate-limited or not-found.
        last_error: String,
        attempts: Vec<AttemptRecord>,
    },
}

impl RequestError {
    pub fn attempts(&self) -> &[AttemptRecord] {
        match self {
            Self::Exhausted { attempts, .. } => attempts,
            Self::NoCandidates | Self::EmptyDocument => &[],
        }
    }
}

/// Render a request outcome as the single string older consumers expect:
/// the reply text, or the error prefixed with [`ERROR_MARKER`].
pub fn into_legacy_text(result: Result<RawExtraction, RequestError>) -> String {
    match result {
        Ok(raw) => raw.text,
        Err(e) => format!("{ERROR_MARKER} {e}"),
    }
}

/// Tries candidate models in order until one answers.
///
/// Rate-limited attempts pause before moving on (except after the last
/// candidate). Unknown models are skipped immediately. Anything else is
/// recorded and the loop continues.
pub struct ExtractionRequester {
    client: Arc<dyn GenerativeClient + Send + Sync>,
    pause: Arc<dyn Pause + Send + Sync>,
    policy: FallbackPolicy,
}

impl ExtractionRequester {
    pub fn new(client: Arc<dyn GenerativeClient + Send + Sync>) -> Self {
        Self {
            client,
            pause: Arc::new(ThreadPause),
            policy: FallbackPolicy::default(),
        }
    }

    pub fn with_pause(mut self, pause: Arc<dyn Pause + Send + Sync>) -> Self {
        self.pause = pause;
        self
    }

    pub fn with_policy(mut self, policy: FallbackPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn request(&self, request: &ExtractionRequest) -> Result<RawExtraction, RequestError> {
        if request.candidate_models.is_empty() {
            return Err(RequestError::NoCandidates);
        }
        if request.payload.is_empty() {
            return Err(RequestError::EmptyDocument);
        }

        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "extraction_request",
            request_id = %request_id,
            payload = request.payload.kind(),
            size = request.payload.len(),
            digest = %request.payload.digest(),
            target_year = request.target_year,
        );
        let _guard = span.enter();

        let prompt = build_extraction_prompt(request.target_year);
        let total = request.candidate_models.len();
        let mut attempts: Vec<AttemptRecord> = Vec::new();

        for (idx, model) in request.candidate_models.iter().enumerate() {
            let is_last = idx + 1 == total;
            let start = Instant::now();

            let error = match self.client.generate(model, &prompt, &request.payload) {
                Ok(text) => {
                    if self.policy.malformed == MalformedPolicy::NextCandidate
                        && !is_json_document(&text)
                    {
                        StructuringError::MalformedOutput(format!(
                            "{} chars of non-JSON text",
                            text.chars().count()
                        ))
                    } else {
                        tracing::info!(
                            model = %model,
                            attempt = idx + 1,
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            chars = text.len(),
                            "Extraction succeeded"
                        );
                        return Ok(RawExtraction {
                            model: model.clone(),
                            text,
                            attempts,
                        });
                    }
                }
                Err(e) => e,
            };

            let kind = error.kind();
            let paused = kind == FailureKind::RateLimited && !is_last;
            tracing::warn!(
                model = %model,
                attempt = idx + 1,
                kind = kind.as_str(),
                error = %error,
                "Model attempt failed"
            );

            attempts.push(AttemptRecord {
                model: model.clone(),
                kind,
                message: error.to_string(),
                paused,
            });

            if paused {
                tracing::debug!(
                    pause_ms = self.policy.rate_limit_pause.as_millis() as u64,
                    "Pausing after rate limit"
                );
                self.pause.pause(self.policy.rate_limit_pause);
            }
        }

        // Rate-limit and not-found failures only steer the loop.
        let last_error = attempts
            .iter()
            .rev()
            .find(|a| a.kind == FailureKind::Other)
            .or_else(|| attempts.last())
            .map(|a| a.message.clone())
            .unwrap_or_default();
        tracing::warn!(attempts = attempts.len(), "All candidate models failed");
        Err(RequestError::Exhausted {
            last_error,
            attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::pipeline::structuring::gemini::MockGenerativeClient;
    use crate::pipeline::structuring::types::ExtractionPrompt;

    fn api(status: u16, message: &str) -> StructuringError {
        StructuringError::Api {
            status,
            api_status: None,
            message: message.into(),
        }
    }

    fn request(models: &[&str]) -> ExtractionRequest {
        ExtractionRequest {
            payload: DocumentPayload::pdf(b"%PDF-1.4 tour".to_vec()),
            target_year: 1404,
            candidate_models: models.iter().map(|m| m.to_string()).collect(),
        }
    }

    fn requester(
        client: Arc<MockGenerativeClient>,
    ) -> (ExtractionRequester, Arc<RecordingPause>) {
        let pause = Arc::new(RecordingPause::new());
        let requester = ExtractionRequester::new(client).with_pause(pause.clone());
        (requester, pause)
    }

    const M3_REPLY: &str = r#"{"tour_title":"T","flight_info":{"shamsi":"1404/01/01","gregorian":"2025-03-21"},"itinerary":[]}"#;

    #[test]
    fn rate_limit_then_not_found_then_success() {
        let client = Arc::new(
            MockGenerativeClient::new()
                .with_error("m1", api(500, "429 quota exceeded"))
                .with_error("m2", api(500, "404 model not found"))
                .with_response("m3", M3_REPLY),
        );
        let (requester, pause) = requester(client.clone());

        let result = requester.request(&request(&["m1", "m2", "m3"])).unwrap();

        assert_eq!(result.model, "m3");
        assert_eq!(result.text, M3_REPLY);
        assert_eq!(client.call_count(), 3);
        assert_eq!(pause.pauses(), vec![Duration::from_secs(2)]);
        let kinds: Vec<FailureKind> = result.attempts.iter().map(|a| a.kind).collect();
        assert_eq!(kinds, vec![FailureKind::RateLimited, FailureKind::NotFound]);
        assert!(result.attempts[0].paused);
        assert!(!result.attempts[1].paused);
    }

    #[test]
    fn first_success_stops_the_loop() {
        let client = Arc::new(
            MockGenerativeClient::new()
                .with_response("m1", "{}")
                .with_response("m2", "{}"),
        );
        let (requester, pause) = requester(client.clone());

        let result = requester.request(&request(&["m1", "m2"])).unwrap();
        assert_eq!(result.model, "m1");
        assert!(result.attempts.is_empty());
        assert_eq!(client.calls(), vec!["m1".to_string()]);
        assert!(pause.pauses().is_empty());
    }

    #[test]
    fn malformed_text_is_returned_by_default() {
        let client = Arc::new(
            MockGenerativeClient::new()
                .with_response("m1", "Sorry, I cannot help with that.")
                .with_response("m2", "{}"),
        );
        let (requester, _) = requester(client.clone());

        let result = requester.request(&request(&["m1", "m2"])).unwrap();
        assert_eq!(result.model, "m1");
        assert_eq!(result.text, "Sorry, I cannot help with that.");
        assert_eq!(client.call_count(), 1);
    }

    #[test]
    fn malformed_text_falls_through_when_opted_in() {
        let client = Arc::new(
            MockGenerativeClient::new()
                .with_response("m1", "not json")
                .with_response("m2", "{\"tour_title\":\"X\"}"),
        );
        let (requester, pause) = requester(client.clone());
        let requester = requester.with_policy(FallbackPolicy {
            malformed: MalformedPolicy::NextCandidate,
            ..FallbackPolicy::default()
        });

        let result = requester.request(&request(&["m1", "m2"])).unwrap();
        assert_eq!(result.model, "m2");
        assert_eq!(result.attempts.len(), 1);
        assert_eq!(result.attempts[0].kind, FailureKind::Other);
        assert!(pause.pauses().is_empty());
    }

    #[test]
    fn exhaustion_reports_last_error() {
        let client = Arc::new(
            MockGenerativeClient::new()
                .with_error("m1", api(401, "API key not valid"))
                .with_error("m2", api(500, "Internal error encountered")),
        );
        let (requester, pause) = requester(client.clone());

        let err = requester.request(&request(&["m1", "m2"])).unwrap_err();
        match &err {
            RequestError::Exhausted {
                last_error,
                attempts,
            } => {
                assert!(last_error.contains("Internal error encountered"));
                assert_eq!(attempts.len(), 2);
            }
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(client.call_count(), 2);
        assert!(pause.pauses().is_empty());
    }

    #[test]
    fn other_failure_outlives_later_not_found() {
        let client = Arc::new(MockGenerativeClient::new().with_error(
            "m1",
            StructuringError::Api {
                status: 400,
                api_status: Some("INVALID_ARGUMENT".into()),
                message: "API key not valid".into(),
            },
        ));
        let (requester, _) = requester(client.clone());

        // m2 is unscripted, so the mock answers 404.
        let err = requester.request(&request(&["m1", "m2"])).unwrap_err();
        match &err {
            RequestError::Exhausted {
                last_error,
                attempts,
            } => {
                assert!(last_error.contains("API key not valid"));
                assert_eq!(attempts[1].kind, FailureKind::NotFound);
            }
            other => panic!("unexpected {other:?}"),
        }
        let text = into_legacy_text(Err(err));
        assert!(text.contains("API key not valid"));
        assert!(!text.contains("not found"));
    }

    #[test]
    fn without_other_failures_the_final_one_is_reported() {
        let client = Arc::new(
            MockGenerativeClient::new().with_error("m1", api(429, "Resource has been exhausted")),
        );
        let (requester, _) = requester(client.clone());

        let err = requester.request(&request(&["m1", "m2"])).unwrap_err();
        match err {
            RequestError::Exhausted { last_error, .. } => {
                assert!(last_error.contains("models/m2 is not found"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn each_candidate_called_once_in_order() {
        let client = Arc::new(MockGenerativeClient::new());
        let (requester, _) = requester(client.clone());

        let err = requester.request(&request(&["a", "b", "c"])).unwrap_err();
        assert_eq!(err.attempts().len(), 3);
        assert_eq!(
            client.calls(),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn rate_limit_on_every_candidate_pauses_between_only() {
        let client = Arc::new(
            MockGenerativeClient::new()
                .with_error("m1", api(429, "Resource has been exhausted"))
                .with_error("m2", api(429, "Resource has been exhausted")),
        );
        let (requester, pause) = requester(client);

        let err = requester.request(&request(&["m1", "m2"])).unwrap_err();
        assert_eq!(pause.pauses().len(), 1);
        assert!(err.attempts()[0].paused);
        assert!(!err.attempts()[1].paused);
    }

    #[test]
    fn configured_pause_duration_is_used() {
        let client = Arc::new(
            MockGenerativeClient::new()
                .with_error("m1", api(429, "quota"))
                .with_response("m2", "{}"),
        );
        let (requester, pause) = requester(client);
        let requester = requester.with_policy(FallbackPolicy {
            rate_limit_pause: Duration::from_millis(250),
            ..FallbackPolicy::default()
        });

        requester.request(&request(&["m1", "m2"])).unwrap();
        assert_eq!(pause.pauses(), vec![Duration::from_millis(250)]);
    }

    #[test]
    fn empty_candidate_list_makes_no_call() {
        let client = Arc::new(MockGenerativeClient::new());
        let (requester, _) = requester(client.clone());

        let err = requester.request(&request(&[])).unwrap_err();
        assert_eq!(err, RequestError::NoCandidates);
        assert_eq!(client.call_count(), 0);
    }

    #[test]
    fn empty_document_makes_no_call() {
        let client = Arc::new(MockGenerativeClient::new().with_response("m1", "{}"));
        let (requester, _) = requester(client.clone());
        let mut req = request(&["m1"]);
        req.payload = DocumentPayload::Text("   ".into());

        assert_eq!(requester.request(&req).unwrap_err(), RequestError::EmptyDocument);
        assert_eq!(client.call_count(), 0);
    }

    /// Counts calls and checks the prompt carries the target year.
    struct YearCheckingClient {
        calls: AtomicUsize,
    }

    impl GenerativeClient for YearCheckingClient {
        fn generate(
            &self,
            _model: &str,
            prompt: &ExtractionPrompt,
            _payload: &DocumentPayload,
        ) -> Result<String, StructuringError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if prompt.system.contains("1407") {
                Ok("{}".into())
            } else {
                Err(StructuringError::MalformedOutput("wrong year".into()))
            }
        }
    }

    #[test]
    fn target_year_reaches_the_prompt() {
        let client = Arc::new(YearCheckingClient {
            calls: AtomicUsize::new(0),
        });
        let requester = ExtractionRequester::new(client.clone());
        let mut req = request(&["m1"]);
        req.target_year = 1407;

        assert!(requester.request(&req).is_ok());
        assert_eq!(client.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn legacy_text_rendering() {
        let ok = Ok(RawExtraction {
            model: "m".into(),
            text: "{}".into(),
            attempts: vec![],
        });
        assert_eq!(into_legacy_text(ok), "{}");

        let err = Err(RequestError::Exhausted {
            last_error: "boom".into(),
            attempts: vec![],
        });
        let text = into_legacy_text(err);
        assert!(text.starts_with(ERROR_MARKER));
        assert!(text.contains("boom"));
        assert!(!is_json_document(&text));
    }
}
