//! Anthropic generation backend.
//!
//! Versioned messages endpoint with `x-api-key` header auth. No JSON
//! response mode exists here, so the output contract in the prompt plus
//! payload extraction carry the weight of getting clean JSON back.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{run_variants, GenerationBackend, VariantCall};
use crate::error::{ProviderFailure, VariantFailure};

const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const API_VERSION: &str = "2023-06-01";

const DEFAULT_MODELS: &[&str] = &["claude-3-5-sonnet-20240620", "claude-3-5-haiku-20241022"];

const TIMEOUT: Duration = Duration::from_secs(120);

pub struct AnthropicBackend {
    client: Client,
    base_url: String,
    models: Vec<String>,
}

impl AnthropicBackend {
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
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<MessageTurn<'a>>,
}

#[derive(Serialize)]
struct MessageTurn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: String,
}

// ── Backend implementation ──────────────────────────────────────────

#[async_trait]
impl VariantCall for AnthropicBackend {
    async fn call_variant(
        &self,
        model: &str,
        prompt: &str,
        credential: Option<&str>,
    ) -> Result<String, VariantFailure> {
        let key = credential.unwrap_or_default();
        let url = format!("{}/v1/messages", self.base_url);

        let body = MessagesRequest {
            model,
            max_tokens: 8000,
            messages: vec![MessageTurn {
                role: "user",
                content: prompt,
            }],
        };

        let response = self
            .client
            .post(&url)
            .header("x-api-key", key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
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
            let brief: String = text.chars().take(300).collect();
            return Err(VariantFailure::Transport(format!("HTTP {status} - {brief}")));
        }

        let parsed: MessagesResponse = serde_json::from_str(&text)
            .map_err(|e| VariantFailure::Transport(format!("unreadable response: {e}")))?;

        let raw = parsed
            .content
            .into_iter()
            .next()
            .map(|block| block.text)
            .unwrap_or_default();

        if raw.trim().is_empty() {
            return Err(VariantFailure::EmptyResponse("no text content block".into()));
        }

        Ok(raw)
    }
}

#[async_trait]
impl GenerationBackend for AnthropicBackend {
    fn name(&self) -> &'static str {
        "anthropic"
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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_models() {
        let b = AnthropicBackend::new(Client::new(), None, Vec::new());
        assert_eq!(
            b.models.first().map(String::as_str),
            Some("claude-3-5-sonnet-20240620")
        );
    }

    #[test]
    fn request_body_serializes_message_turns() {
        let body = MessagesRequest {
            model: "claude-3-5-sonnet-20240620",
            max_tokens: 8000,
            messages: vec![MessageTurn {
                role: "user",
                content: "hello",
            }],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["role"], "user");
        assert_eq!(json["max_tokens"], 8000);
    }
}
