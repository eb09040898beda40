//! Generative-AI collaborator client — prompt-in, text-out completions
//! with bounded retry on transient provider failures.
//!
//! The hosted model intermittently sheds load with 503 responses; those
//! (plus connect failures and timeouts) are the only errors worth
//! retrying. Everything else is permanent and surfaces immediately.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    pub delay: Duration,
}

/// Policy used by every assistant call: three attempts, two seconds apart.
pub const DEFAULT_RETRY: RetryPolicy = RetryPolicy {
    attempts: 3,
    delay: Duration::from_secs(2),
};

#[derive(Debug, thiserror::Error)]
pub enum GenAiError {
    #[error("Cannot reach the AI provider at {0}")]
    Connection(String),
    #[error("Request timed out")]
    Timeout,
    #[error("HTTP client error: {0}")]
    HttpClient(String),
    #[error("AI provider returned {status}: {body}")]
    Provider { status: u16, body: String },
    #[error("AI response contained no text")]
    EmptyResponse,
    #[error("Failed to parse AI response: {0}")]
    ResponseParsing(String),
}

impl GenAiError {
    /// Whether a retry could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            GenAiError::Provider { status, .. } => *status == 503,
            GenAiError::Connection(_) | GenAiError::Timeout => true,
            _ => false,
        }
    }
}

/// Text completion against the hosted generative-AI service.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenAiError>;
}

/// Drive a generator with bounded retry on transient errors only.
pub async fn generate_with_retry(
    client: &dyn TextGenerator,
    prompt: &str,
    policy: RetryPolicy,
) -> Result<String, GenAiError> {
    let mut attempt = 1u32;
    loop {
        match client.generate(prompt).await {
            Ok(text) => return Ok(text),
            Err(e) if e.is_transient() && attempt < policy.attempts => {
                tracing::warn!(attempt, "AI provider unavailable, retrying: {e}");
                tokio::time::sleep(policy.delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Gemini implementation
// ---------------------------------------------------------------------------

/// HTTP client for the Gemini generateContent endpoint.
pub struct GeminiClient {
    base_url: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Hosted endpoint with the configured default model.
    pub fn hosted(api_key: &str) -> Self {
        Self::new(
            "https://generativelanguage.googleapis.com",
            api_key,
            config::GEMINI_MODEL,
        )
    }
}

/// Request body for generateContent.
#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

/// Response body from generateContent.
#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: String,
}

/// First candidate's first text part, if any.
fn extract_text(response: GenerateResponse) -> Option<String> {
    response
        .candidates
        .into_iter()
        .next()?
        .content
        .parts
        .into_iter()
        .next()
        .map(|part| part.text)
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, GenAiError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    GenAiError::Connection(self.base_url.clone())
                } else if e.is_timeout() {
                    GenAiError::Timeout
                } else {
                    GenAiError::HttpClient(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GenAiError::Provider {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GenAiError::ResponseParsing(e.to_string()))?;

        extract_text(parsed).ok_or(GenAiError::EmptyResponse)
    }
}

// ---------------------------------------------------------------------------
// Mock
// ---------------------------------------------------------------------------

/// Mock generator for testing — scripted outcomes, then a fixed fallback.
///
/// Outcomes are consumed front to back; once the script is exhausted the
/// mock keeps returning the default reply, or 503 when there is none.
pub struct MockGenerator {
    script: Mutex<VecDeque<Result<String, GenAiError>>>,
    default_reply: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl MockGenerator {
    /// Always returns the given reply.
    pub fn replying(text: &str) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_reply: Some(text.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always returns a transient 503.
    pub fn unavailable() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            default_reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Plays the outcomes in order, then behaves like `unavailable`.
    pub fn scripted(outcomes: Vec<Result<String, GenAiError>>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            default_reply: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// The transient error this mock emits.
    pub fn transient_error() -> GenAiError {
        GenAiError::Provider {
            status: 503,
            body: "model overloaded".to_string(),
        }
    }

    /// Every prompt received, oldest first.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenAiError> {
        self.prompts.lock().unwrap().push(prompt.to_string());

        if let Some(outcome) = self.script.lock().unwrap().pop_front() {
            return outcome;
        }
        match &self.default_reply {
            Some(text) => Ok(text.clone()),
            None => Err(Self::transient_error()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fast policy so retry tests do not sleep for real.
    const TEST_RETRY: RetryPolicy = RetryPolicy {
        attempts: 3,
        delay: Duration::from_millis(1),
    };

    #[test]
    fn transient_classification() {
        assert!(GenAiError::Provider { status: 503, body: String::new() }.is_transient());
        assert!(GenAiError::Connection("host".into()).is_transient());
        assert!(GenAiError::Timeout.is_transient());

        assert!(!GenAiError::Provider { status: 400, body: String::new() }.is_transient());
        assert!(!GenAiError::EmptyResponse.is_transient());
        assert!(!GenAiError::ResponseParsing("bad json".into()).is_transient());
    }

    #[test]
    fn gemini_client_trims_trailing_slash() {
        let client = GeminiClient::new("https://generativelanguage.googleapis.com/", "k", "m");
        assert_eq!(client.base_url, "https://generativelanguage.googleapis.com");
    }

    #[test]
    fn hosted_uses_configured_model() {
        let client = GeminiClient::hosted("key");
        assert_eq!(client.model, config::GEMINI_MODEL);
    }

    #[test]
    fn extract_text_takes_first_part() {
        let parsed: GenerateResponse = serde_json::from_value(serde_json::json!({
            "candidates": [
                {"content": {"parts": [{"text": "first"}, {"text": "second"}]}}
            ]
        }))
        .unwrap();
        assert_eq!(extract_text(parsed).as_deref(), Some("first"));
    }

    #[test]
    fn extract_text_empty_candidates() {
        let parsed: GenerateResponse =
            serde_json::from_value(serde_json::json!({"candidates": []})).unwrap();
        assert!(extract_text(parsed).is_none());
    }

    #[tokio::test]
    async fn retry_recovers_after_transient_failures() {
        let mock = MockGenerator::scripted(vec![
            Err(MockGenerator::transient_error()),
            Err(MockGenerator::transient_error()),
            Ok("answer".to_string()),
        ]);

        let text = generate_with_retry(&mock, "question", TEST_RETRY).await.unwrap();
        assert_eq!(text, "answer");
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn retry_gives_up_after_all_attempts() {
        let mock = MockGenerator::unavailable();

        let err = generate_with_retry(&mock, "question", TEST_RETRY).await.unwrap_err();
        assert!(err.is_transient());
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let mock = MockGenerator::scripted(vec![Err(GenAiError::Provider {
            status: 400,
            body: "bad request".to_string(),
        })]);

        let err = generate_with_retry(&mock, "question", TEST_RETRY).await.unwrap_err();
        assert!(!err.is_transient());
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn mock_records_prompts() {
        let mock = MockGenerator::replying("ok");
        mock.generate("first").await.unwrap();
        mock.generate("second").await.unwrap();
        assert_eq!(mock.prompts(), vec!["first", "second"]);
    }
}
