//! Topic research: expand a bare topic into a dense context paragraph.
//!
//! Runs a search-grounded Gemini call (the grounding tool only exists on
//! that provider) before generation so slide content reflects current
//! facts rather than the model's training cutoff. Enrichment is strictly
//! best-effort: every failure path returns the original topic unchanged
//! and the generation pipeline carries on.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Same fallback order as the generation backend; grounding support
/// follows the same model families.
const DEFAULT_MODELS: &[&str] = &[
    "gemini-2.0-flash",
    "gemini-2.0-flash-lite",
    "gemini-1.5-flash",
];

const TIMEOUT: Duration = Duration::from_secs(120);

pub struct ResearchEnricher {
    client: Client,
    base_url: String,
    models: Vec<String>,
}

impl ResearchEnricher {
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

    /// Expand `topic` into a research paragraph.
    ///
    /// Without a credential this returns immediately with zero outbound
    /// calls. With one, each model variant gets a single grounded
    /// request; the first non-empty answer wins, and total failure
    /// degrades to the original topic.
    pub async fn enrich(&self, topic: &str, credential: Option<&str>) -> String {
        let Some(key) = credential else {
            warn!("No Gemini key available, skipping topic research");
            return topic.to_string();
        };

        let prompt = research_prompt(topic);

        for model in &self.models {
            match self.call_grounded(model, &prompt, key).await {
                Ok(text) if !text.trim().is_empty() => {
                    info!(model = %model, chars = text.len(), "Topic research complete");
                    return text.trim().to_string();
                }
                Ok(_) => {
                    warn!(model = %model, "Research returned empty text, trying next model");
                }
                Err(e) => {
                    warn!(model = %model, error = %e, "Research call failed, trying next model");
                }
            }
        }

        warn!(topic, "All research models failed, using the raw topic");
        topic.to_string()
    }

    async fn call_grounded(&self, model: &str, prompt: &str, key: &str) -> anyhow::Result<String> {
        let url = format!("{}/{}:generateContent", self.base_url, model);

        // The grounding tool rides alongside the normal content payload.
        let body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "tools": [{"google_search": {}}],
            "generationConfig": {"temperature": 0.3},
        });

        let response = self
            .client
            .post(&url)
            .query(&[("key", key)])
            .json(&body)
            .timeout(TIMEOUT)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            anyhow::bail!("HTTP {status} - {}", text.chars().take(300).collect::<String>());
        }

        let parsed: GroundedResponse = serde_json::from_str(&text)?;
        Ok(parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default())
    }
}

#[derive(Deserialize)]
struct GroundedResponse {
    #[serde(default)]
    candidates: Vec<GroundedCandidate>,
}

#[derive(Deserialize)]
struct GroundedCandidate {
    #[serde(default)]
    content: Option<GroundedContent>,
}

#[derive(Deserialize)]
struct GroundedContent {
    #[serde(default)]
    parts: Vec<GroundedPart>,
}

#[derive(Deserialize)]
struct GroundedPart {
    #[serde(default)]
    text: String,
}

fn research_prompt(topic: &str) -> String {
    format!(
        "You are a world-class analyst. Research the absolute latest \
         information for the topic: \"{topic}\".\n\
         Use web search to find current facts, named products or versions, \
         and real benchmarks.\n\n\
         Provide a HIGH-DENSITY research report (1500+ characters):\n\
         1. [CURRENT LEADERS] the top players right now, by name.\n\
         2. [SPECIFICS] concrete features, figures, or use cases that \
         emerged recently.\n\
         3. [MARKET DATA] at least 3 real statistics from recent reports.\n\n\
         Focus on the newest information available; mention older facts \
         only for comparison."
    )
}
