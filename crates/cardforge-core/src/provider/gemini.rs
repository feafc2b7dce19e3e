//! Gemini generation backend (REST, v1beta).
//!
//! Talks to `generativelanguage.googleapis.com` directly rather than
//! through an SDK: the flash-tier models are only served on `v1beta`,
//! and `responseMimeType: "application/json"` forces JSON-mode output,
//! which keeps payload extraction stable. The API key travels as a
//! query parameter, not a header.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{run_variants, GenerationBackend, VariantCall};
use crate::error::{ProviderFailure, VariantFailure};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Models rotate fast on this provider; the list is ordered newest
/// first and each entry is tried until one answers.
const DEFAULT_MODELS: &[&str] = &[
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite",
    "gemini-1.5-flash",
];

const TIMEOUT: Duration = Duration::from_secs(120);

pub struct GeminiBackend {
    client: Client,
    base_url: String,
    models: Vec<String>,
}

impl GeminiBackend {
    /// `base_url` and `models` override the defaults when non-empty.
    pub fn new(client: Client, base_url: Option<&str>, models: Vec<String>) -> Self {
        let models = if models.is_empty() {
            DEFAULT_MODELS.iter().map(|m| m.to_string()).collect()
        } else {
            models
        };
        Self {
            client,
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            models,
        }
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    response_mime_type: &'static str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ApiErrorResponse {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// Pull the human-readable message out of an error body, falling back
/// to a truncated raw body.
fn error_message(body: &str) -> String {
    serde_json::from_str::<ApiErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.chars().take(300).collect())
}

// ── Backend implementation ──────────────────────────────────────────

#[async_trait]
impl VariantCall for GeminiBackend {
    async fn call_variant(
        &self,
        model: &str,
        prompt: &str,
        credential: Option<&str>,
    ) -> Result<String, VariantFailure> {
        let key = credential.unwrap_or_default();
        let url = format!("{}/{}:generateContent", self.base_url, model);

        let body = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: 0.3,
                max_output_tokens: 8192,
                response_mime_type: "application/json",
            },
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", key)])
            .json(&body)
            .timeout(TIMEOUT)
            .send()
            .await
            .map_err(|e| VariantFailure::Transport(e.to_string()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| VariantFailure::Transport(e.to_string()))?;

        if status.as_u16() == 401 || status.as_u16() == 403 {
            return Err(VariantFailure::Auth(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let message = error_message(&text);
            // Bad keys surface as 400 API_KEY_INVALID on this provider.
            if message.contains("API_KEY_INVALID") {
                return Err(VariantFailure::Auth(message));
            }
            return Err(VariantFailure::Transport(format!("HTTP {status} - {message}")));
        }

        let parsed: GenerateContentResponse = serde_json::from_str(&text)
            .map_err(|e| VariantFailure::Transport(format!("unreadable response: {e}")))?;

        let Some(candidate) = parsed.candidates.into_iter().next() else {
            return Err(VariantFailure::EmptyResponse("no candidates".into()));
        };

        let raw = candidate
            .content
            .and_then(|c| c.parts.into_iter().next())
            .map(|p| p.text)
            .unwrap_or_default();

        if raw.trim().is_empty() {
            let reason = candidate.finish_reason.unwrap_or_else(|| "UNKNOWN".into());
            return Err(VariantFailure::EmptyResponse(format!(
                "empty text (finishReason={reason})"
            )));
        }

        Ok(raw)
    }
}

#[async_trait]
impl GenerationBackend for GeminiBackend {
    fn name(&self) -> &'static str {
        "gemini"
    }

    async fn attempt(
        &self,
        prompt: &str,
        credential: Option<&str>,
    ) -> Result<String, ProviderFailure> {
        if credential.is_none() {
            return Err(ProviderFailure::CredentialAbsent);
        }
        run_variants(self, self.name(), &self.models, prompt, credential).await
    }
}
