//! OpenAI generation backend.
//!
//! Bearer-token chat completions with `response_format: json_object`,
//! which instructs the model to emit a single JSON object and makes
//! extraction mostly a formality.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{run_variants, GenerationBackend, VariantCall};
use crate::error::{ProviderFailure, VariantFailure};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

const DEFAULT_MODELS: &[&str] = &["gpt-4o", "gpt-4o-mini"];

const TIMEOUT: Duration = Duration::from_secs(120);

pub struct OpenAiBackend {
    client: Client,
    base_url: String,
    models: Vec<String>,
}

impl OpenAiBackend {
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
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<MessageTurn<'a>>,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct MessageTurn<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

// ── Backend implementation ──────────────────────────────────────────

#[async_trait]
impl VariantCall for OpenAiBackend {
    async fn call_variant(
        &self,
        model: &str,
        prompt: &str,
        credential: Option<&str>,
    ) -> Result<String, VariantFailure> {
        let key = credential.unwrap_or_default();
        let url = format!("{}/chat/completions", self.base_url);

        let body = CompletionRequest {
            model,
            messages: vec![MessageTurn {
                role: "user",
                content: prompt,
            }],
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {key}"))
            .header("Content-Type", "application/json")
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

        let parsed: CompletionResponse = serde_json::from_str(&text)
            .map_err(|e| VariantFailure::Transport(format!("unreadable response: {e}")))?;

        let raw = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();

        if raw.trim().is_empty() {
            return Err(VariantFailure::EmptyResponse("no message content".into()));
        }

        Ok(raw)
    }
}

#[async_trait]
impl GenerationBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "openai"
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
        let b = OpenAiBackend::new(Client::new(), None, Vec::new());
        assert_eq!(b.models, vec!["gpt-4o".to_string(), "gpt-4o-mini".to_string()]);
    }

    #[test]
    fn request_asks_for_json_mode() {
        let body = CompletionRequest {
            model: "gpt-4o",
            messages: vec![MessageTurn {
                role: "user",
                content: "p",
            }],
            response_format: ResponseFormat {
                format_type: "json_object",
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["response_format"]["type"], "json_object");
    }
}
