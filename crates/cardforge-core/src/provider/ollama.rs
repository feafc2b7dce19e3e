//! Local-model generation backend (Ollama).
//!
//! Posts to a configurable local endpoint with no auth; the model name
//! comes from configuration rather than a fixed fallback list. Local
//! inference is slow, so the timeout is far more generous than for the
//! hosted providers.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{run_variants, GenerationBackend, VariantCall};
use crate::error::{ProviderFailure, VariantFailure};

const TIMEOUT: Duration = Duration::from_secs(300);

pub struct OllamaBackend {
    client: Client,
    endpoint: String,
    models: Vec<String>,
}

impl OllamaBackend {
    /// `endpoint` is the server base (e.g. `http://localhost:11434`),
    /// `model` the configured model name.
    pub fn new(client: Client, endpoint: &str, model: &str) -> Self {
        Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            models: vec![model.to_string()],
        }
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    format: &'static str,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
}

// ── Backend implementation ──────────────────────────────────────────

#[async_trait]
impl VariantCall for OllamaBackend {
    async fn call_variant(
        &self,
        model: &str,
        prompt: &str,
        _credential: Option<&str>,
    ) -> Result<String, VariantFailure> {
        let url = format!("{}/api/generate", self.endpoint);

        let body = OllamaRequest {
            model,
            prompt,
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: 0.3,
                num_predict: 16_000,
            },
        };

        let response = self
            .client
            .post(&url)
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

        if !status.is_success() {
            let brief: String = text.chars().take(300).collect();
            return Err(VariantFailure::Transport(format!("HTTP {status} - {brief}")));
        }

        let parsed: OllamaResponse = serde_json::from_str(&text)
            .map_err(|e| VariantFailure::Transport(format!("unreadable response: {e}")))?;

        if parsed.response.trim().is_empty() {
            return Err(VariantFailure::EmptyResponse("empty response field".into()));
        }

        Ok(parsed.response)
    }
}

#[async_trait]
impl GenerationBackend for OllamaBackend {
    fn name(&self) -> &'static str {
        "ollama"
    }

    fn requires_credential(&self) -> bool {
        false
    }

    async fn attempt(
        &self,
        prompt: &str,
        credential: Option<&str>,
    ) -> Result<String, ProviderFailure> {
        run_variants(self, self.name(), &self.models, prompt, credential).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_trailing_slash_is_trimmed() {
        let b = OllamaBackend::new(Client::new(), "http://localhost:11434/", "qwen2.5-coder:14b");
        assert_eq!(b.endpoint, "http://localhost:11434");
        assert_eq!(b.models, vec!["qwen2.5-coder:14b".to_string()]);
    }

    #[test]
    fn request_forces_non_streaming_json() {
        let body = OllamaRequest {
            model: "qwen2.5-coder:14b",
            prompt: "p",
            stream: false,
            format: "json",
            options: OllamaOptions {
                temperature: 0.3,
                num_predict: 16_000,
            },
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stream"], false);
        assert_eq!(json["format"], "json");
    }
}
