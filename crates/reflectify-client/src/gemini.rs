//! Gemini `generateContent` client.
//!
//! Sends a single user-role content part carrying the prompt plus a
//! `generationConfig` built from [`GenerationOptions`], and returns the
//! concatenated text of the first candidate.

use std::time::{Duration, Instant};

use reflectify_core::config::ServiceConfig;
use reflectify_core::GenerationOptions;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::TextGenerator;

/// Longest error body kept for logs.
const MAX_ERROR_BODY_CHARS: usize = 512;

/// HTTP client for the Gemini API.
#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: Client,
    url: String,
    api_key: String,
}

impl GeminiClient {
    /// Create a client for a full `...:generateContent` URL.
    pub fn new(
        url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, ClientError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()?;
        Ok(Self {
            http,
            url: url.into(),
            api_key: api_key.into(),
        })
    }

    /// Create a client from the `[service]` config section and a resolved key.
    pub fn from_config(config: &ServiceConfig, api_key: impl Into<String>) -> Result<Self, ClientError> {
        Self::new(config.generate_url(), api_key, config.request_timeout())
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

// ============================================================================
// Wire types
// ============================================================================

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    role: &'static str,
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_k: u32,
    top_p: f32,
    max_output_tokens: u32,
}

impl From<&GenerationOptions> for GenerationConfig {
    fn from(options: &GenerationOptions) -> Self {
        Self {
            temperature: options.temperature,
            top_k: options.top_k,
            top_p: options.top_p,
            max_output_tokens: options.max_output_tokens,
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    prompt_feedback: Option<PromptFeedback>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<CandidateContent>,
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ApiError {
    message: String,
}

fn build_request<'a>(prompt: &'a str, options: &GenerationOptions) -> GenerateRequest<'a> {
    GenerateRequest {
        contents: vec![RequestContent {
            role: "user",
            parts: vec![RequestPart { text: prompt }],
        }],
        generation_config: options.into(),
    }
}

/// Pull the reply text out of a success envelope.
///
/// Anything other than a first candidate with content is a service error;
/// an envelope is never read as an empty reply.
fn reply_text(body: &str) -> Result<String, ClientError> {
    let response: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| ClientError::Service(format!("malformed response envelope: {}", e)))?;

    if let Some(error) = response.error {
        return Err(ClientError::Service(error.message));
    }

    let candidate = match response.candidates.and_then(|c| c.into_iter().next()) {
        Some(candidate) => candidate,
        None => {
            let reason = response
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .map(|r| format!("prompt blocked: {}", r))
                .unwrap_or_else(|| "response contained no candidates".to_string());
            return Err(ClientError::Service(reason));
        }
    };

    let content = candidate.content.ok_or_else(|| {
        ClientError::Service(format!(
            "candidate has no content (finish reason: {})",
            candidate.finish_reason.as_deref().unwrap_or("unknown")
        ))
    })?;

    Ok(content
        .parts
        .into_iter()
        .filter_map(|p| p.text)
        .collect::<String>())
}

fn truncate_body(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

impl TextGenerator for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        options: &GenerationOptions,
    ) -> Result<String, ClientError> {
        let started = Instant::now();
        let request = build_request(prompt, options);

        let response = self
            .http
            .post(&self.url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                tracing::warn!(error = %e, "Gemini request failed");
                ClientError::from(e)
            })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let body = truncate_body(&body);
            tracing::warn!(status = status.as_u16(), "Gemini returned an error status");
            tracing::debug!(status = status.as_u16(), body = %body, "Gemini error body");
            return Err(ClientError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = reply_text(&body).inspect_err(|e| {
            tracing::warn!(status = status.as_u16(), "Gemini response unusable");
            tracing::debug!(error = %e, "Gemini response detail");
        })?;

        tracing::debug!(
            prompt_len = prompt.len(),
            reply_len = text.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Gemini reply received"
        );
        Ok(text)
    }
}
