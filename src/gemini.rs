//! Gemini `generateContent` backend.

use crate::{
    error::{Error, Result},
    summarizer::{Summarizer, Summary, SummaryInput, render_prompt},
};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, trace};

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";

/// Public Gemini REST endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<ContentResponse>,
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Debug, Deserialize)]
struct PartResponse {
    #[serde(default)]
    text: String,
}

impl GeminiRequest {
    fn for_prompt(prompt: String) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: Some(GenerationConfig {
                temperature: Some(0.2),
                max_output_tokens: Some(1024),
            }),
        }
    }
}

/// Summarizes through the Gemini API.
#[derive(Debug, Clone)]
pub struct GeminiSummarizer {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiSummarizer {
    /// Creates a client for `model` authenticated with `api_key`.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the key is blank or the HTTP client
    /// cannot be built.
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::config(
                "Gemini API key is empty (set GEMINI_API_KEY or pass --api-key)",
            ));
        }

        let model = model.into();
        if model.trim().is_empty() {
            return Err(Error::config("Gemini model name is empty"));
        }

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| Error::config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            model,
            base_url: DEFAULT_API_BASE_URL.to_string(),
        })
    }

    /// Points the client at another endpoint (proxies, local fakes).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Returns the configured model.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!("{}/{}:generateContent", self.base_url, self.model)
    }

    fn generate(&self, prompt: String) -> Result<String> {
        let request = GeminiRequest::for_prompt(prompt);

        trace!("POST {}", self.endpoint());
        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .map_err(|e| classify_transport(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(classify_status(status, &body));
        }

        let body = response
            .text()
            .map_err(|e| Error::transient(format!("Failed to read Gemini response: {e}")))?;

        let text = extract_text(&body)?;
        debug!("Gemini returned {} chars", text.len());
        Ok(strip_code_fence(&text).to_string())
    }
}

impl Summarizer for GeminiSummarizer {
    fn summarize(&self, input: &SummaryInput<'_>) -> Result<Summary> {
        self.generate(render_prompt(input)).map(Summary::new)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

/// Maps a non-success HTTP status to the error taxonomy.
///
/// 408, 429 and every 5xx are retryable; other statuses are not.
fn classify_status(status: StatusCode, body: &str) -> Error {
    let message = format!("Gemini API error ({status}): {}", body.trim());

    if status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
        || status.is_server_error()
    {
        Error::transient(message)
    } else {
        Error::permanent(message)
    }
}

fn classify_transport(error: &reqwest::Error) -> Error {
    let message = format!("Gemini API request failed: {error}");

    if error.is_timeout() || error.is_connect() || error.is_request() {
        Error::transient(message)
    } else {
        Error::permanent(message)
    }
}

/// Pulls the first candidate's text out of a response body.
fn extract_text(body: &str) -> Result<String> {
    let response: GeminiResponse = serde_json::from_str(body)
        .map_err(|e| Error::permanent(format!("Failed to parse Gemini response: {e}")))?;

    let text: String = response
        .candidates
        .into_iter()
        .find_map(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .map(|p| p.text)
                .collect::<Vec<_>>()
                .join("")
        })
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(Error::permanent("No response text from Gemini API"));
    }

    Ok(text)
}

/// Removes a surrounding Markdown code fence, if the reply has one.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();

    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the info string ("json", "text", ...) on the opening line.
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(classify_status(StatusCode::TOO_MANY_REQUESTS, "slow down").is_transient());
        assert!(classify_status(StatusCode::REQUEST_TIMEOUT, "").is_transient());
        assert!(classify_status(StatusCode::SERVICE_UNAVAILABLE, "").is_transient());
        assert!(classify_status(StatusCode::INTERNAL_SERVER_ERROR, "").is_transient());

        assert!(classify_status(StatusCode::BAD_REQUEST, "bad").is_permanent());
        assert!(classify_status(StatusCode::FORBIDDEN, "key").is_permanent());
        assert!(classify_status(StatusCode::NOT_FOUND, "model").is_permanent());
    }

    #[test]
    fn test_status_message_keeps_body() {
        let err = classify_status(StatusCode::BAD_REQUEST, "  invalid model  ");
        assert!(err.to_string().contains("invalid model"));
        assert!(err.to_string().contains("400"));
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("plain text"), "plain text");
        assert_eq!(strip_code_fence("```\nfenced\n```"), "fenced");
        assert_eq!(strip_code_fence("```text\nSummary here.\n```\n"), "Summary here.");
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn test_extract_text() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"Hello "},{"text":"world"}]}}]}"#;
        assert_eq!(extract_text(body).unwrap(), "Hello world");
    }

    #[test]
    fn test_extract_text_failures_are_permanent() {
        assert!(extract_text(r#"{"candidates":[]}"#).unwrap_err().is_permanent());
        assert!(extract_text(r#"{"candidates":[{}]}"#).unwrap_err().is_permanent());
        assert!(extract_text("not json").unwrap_err().is_permanent());
    }

    #[test]
    fn test_request_serialization() {
        let request = GeminiRequest::for_prompt("Summarize".to_string());
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["contents"][0]["parts"][0]["text"], "Summarize");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 1024);
    }

    #[test]
    fn test_blank_key_is_config_error() {
        let err = GeminiSummarizer::new("  ", DEFAULT_MODEL).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_endpoint() {
        let summarizer = GeminiSummarizer::new("key", "gemini-test")
            .unwrap()
            .with_base_url("http://localhost:9999/models/");
        assert_eq!(
            summarizer.endpoint(),
            "http://localhost:9999/models/gemini-test:generateContent"
        );
        assert_eq!(summarizer.model(), "gemini-test");
    }

    #[test]
    #[ignore] // Requires GEMINI_API_KEY and network access
    fn test_gemini_live() {
        let api_key = std::env::var("GEMINI_API_KEY").unwrap();
        let summarizer = GeminiSummarizer::new(api_key, DEFAULT_MODEL).unwrap();

        let summary = summarizer
            .summarize(&SummaryInput::File {
                path: "add.py",
                content: "def add(a, b):\n    return a + b\n",
            })
            .unwrap();

        assert!(!summary.text.trim().is_empty());
    }
}
