//! Generation backends and the ordered-fallback orchestrator.
//!
//! Each backend (Gemini, Anthropic, OpenAI, local Ollama) implements
//! [`GenerationBackend`]: take a composed prompt and a credential, return
//! extracted markup or a typed failure. The [`Orchestrator`] holds the
//! backends in a fixed priority order and short-circuits on the first
//! success — providers are paid and rate-limited, so "first success wins"
//! beats racing them.

pub mod anthropic;
pub mod gemini;
pub mod ollama;
pub mod openai;

use async_trait::async_trait;
use std::collections::HashMap;
use tracing::{debug, info, warn};

use crate::error::{GenerateError, ProviderFailure, VariantFailure};
use crate::extract::extract_markup;
use crate::prompt::PromptComposer;

/// Per-request provider secrets. A missing key means "skip this
/// provider", never "retry without auth".
#[derive(Debug, Clone, Default)]
pub struct CredentialSet {
    keys: HashMap<String, String>,
}

impl CredentialSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the key for `provider`. Empty strings are treated as absent.
    pub fn insert(&mut self, provider: &str, key: &str) {
        if !key.trim().is_empty() {
            self.keys.insert(provider.to_string(), key.to_string());
        }
    }

    pub fn get(&self, provider: &str) -> Option<&str> {
        self.keys.get(provider).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// One generation call. Immutable once constructed; owned by a single
/// orchestration pass.
#[derive(Debug)]
pub struct GenerationRequest {
    pub source_text: String,
    pub slide_count: u32,
    pub bg_image_url: Option<String>,
    pub credentials: CredentialSet,
}

impl GenerationRequest {
    pub fn new(source_text: impl Into<String>, slide_count: u32) -> Self {
        Self {
            source_text: source_text.into(),
            slide_count: slide_count.max(1),
            bg_image_url: None,
            credentials: CredentialSet::new(),
        }
    }
}

/// Capability every provider adapter implements.
///
/// `attempt` walks the adapter's model-variant list in priority order:
/// auth rejection is fatal for the provider, everything else falls
/// through to the next variant, and the failure of the *last* variant
/// becomes the provider's diagnostic.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Stable provider name; also the credential-set lookup key.
    fn name(&self) -> &'static str;

    /// Whether this backend needs an API key at all. Local model servers
    /// return false and are attempted unauthenticated.
    fn requires_credential(&self) -> bool {
        true
    }

    /// Try to produce markup for `prompt`.
    async fn attempt(
        &self,
        prompt: &str,
        credential: Option<&str>,
    ) -> Result<String, ProviderFailure>;
}

/// One request to one named model variant, in the provider's own wire
/// envelope. Returns the raw response text; payload extraction happens
/// in the shared variant loop.
#[async_trait]
pub(crate) trait VariantCall: Send + Sync {
    async fn call_variant(
        &self,
        model: &str,
        prompt: &str,
        credential: Option<&str>,
    ) -> Result<String, VariantFailure>;
}

/// Shared fallback loop over a provider's model-variant list.
///
/// Rules (identical for every provider):
/// - auth rejection aborts the provider immediately — retrying the same
///   key against another variant fails identically;
/// - transport errors, empty bodies and unextractable output record a
///   diagnostic and fall through to the next variant;
/// - extraction yielding non-empty markup wins immediately;
/// - if the list runs out, the *last* diagnostic becomes the provider's
///   failure detail.
pub(crate) async fn run_variants<C: VariantCall + ?Sized>(
    caller: &C,
    provider: &str,
    variants: &[String],
    prompt: &str,
    credential: Option<&str>,
) -> Result<String, ProviderFailure> {
    let mut last_detail: Option<String> = None;

    for model in variants {
        debug!(provider, model = %model, "Attempting model variant");
        let outcome = caller
            .call_variant(model, prompt, credential)
            .await
            .and_then(|raw| match extract_markup(&raw) {
                Ok(markup) if !markup.is_empty() => Ok(markup),
                Ok(_) => Err(VariantFailure::Extraction(
                    "response JSON has no html field".into(),
                )),
                Err(e) => Err(VariantFailure::Extraction(format!(
                    "{e} (response length {})",
                    raw.len()
                ))),
            });

        match outcome {
            Ok(markup) => {
                info!(provider, model = %model, "Variant produced markup");
                return Ok(markup);
            }
            Err(VariantFailure::Auth(detail)) => {
                return Err(ProviderFailure::Auth(format!("{model}: {detail}")));
            }
            Err(failure) => {
                let detail = format!("{model}: {}", failure.detail());
                warn!(provider, detail = %detail, "Variant failed, falling through");
                last_detail = Some(detail);
            }
        }
    }

    Err(ProviderFailure::Exhausted(last_detail.unwrap_or_else(
        || format!("{provider}: no model variants configured"),
    )))
}

/// Tries backends in fixed priority order and returns the first markup,
/// or a composite failure naming what happened to every provider.
pub struct Orchestrator {
    composer: PromptComposer,
    backends: Vec<Box<dyn GenerationBackend>>,
}

impl Orchestrator {
    pub fn new(composer: PromptComposer, backends: Vec<Box<dyn GenerationBackend>>) -> Self {
        Self { composer, backends }
    }

    /// Standard chain in fixed priority order: Gemini, Anthropic, OpenAI,
    /// then Ollama if enabled. Hosted backends are always present — a
    /// request may carry a key the config does not.
    pub fn from_config(
        client: reqwest::Client,
        composer: PromptComposer,
        providers: &crate::config::ProvidersConfig,
    ) -> Self {
        let entry_models = |entry: &Option<crate::config::ProviderEntry>| {
            entry.as_ref().map(|e| e.models.clone()).unwrap_or_default()
        };
        let entry_base = |entry: &Option<crate::config::ProviderEntry>| {
            entry.as_ref().and_then(|e| e.api_base.clone())
        };

        let mut backends: Vec<Box<dyn GenerationBackend>> = vec![
            Box::new(gemini::GeminiBackend::new(
                client.clone(),
                entry_base(&providers.gemini).as_deref(),
                entry_models(&providers.gemini),
            )),
            Box::new(anthropic::AnthropicBackend::new(
                client.clone(),
                entry_base(&providers.anthropic).as_deref(),
                entry_models(&providers.anthropic),
            )),
            Box::new(openai::OpenAiBackend::new(
                client.clone(),
                entry_base(&providers.openai).as_deref(),
                entry_models(&providers.openai),
            )),
        ];

        if let Some(ollama) = providers.ollama.as_ref().filter(|o| o.enabled) {
            backends.push(Box::new(ollama::OllamaBackend::new(
                client,
                &ollama.endpoint,
                &ollama.model,
            )));
        }

        Self::new(composer, backends)
    }

    /// Run the full fallback chain for one request.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerateError> {
        let prompt = self.composer.compose(
            &request.source_text,
            request.slide_count,
            request.bg_image_url.as_deref(),
        );

        let mut diagnostics: Vec<String> = Vec::new();
        let mut any_usable = false;

        for backend in &self.backends {
            let name = backend.name();
            let credential = request.credentials.get(name);
            if credential.is_some() || !backend.requires_credential() {
                any_usable = true;
            }

            match backend.attempt(&prompt, credential).await {
                Ok(markup) => {
                    info!(provider = name, "Markup generated");
                    return Ok(markup);
                }
                Err(failure) => {
                    warn!(provider = name, detail = %failure, "Provider did not produce markup");
                    diagnostics.push(format!("{name}: {failure}"));
                }
            }
        }

        if !any_usable {
            return Err(GenerateError::NoCredentials);
        }
        Err(GenerateError::AllProvidersFailed(diagnostics.join(" | ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::StudioAssets;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Scripted backend for orchestration tests: counts calls and plays
    /// back a fixed outcome.
    struct Scripted {
        name: &'static str,
        outcome: fn() -> Result<String, ProviderFailure>,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(name: &'static str, outcome: fn() -> Result<String, ProviderFailure>) -> Self {
            Self {
                name,
                outcome,
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl GenerationBackend for Scripted {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn attempt(
            &self,
            _prompt: &str,
            credential: Option<&str>,
        ) -> Result<String, ProviderFailure> {
            if credential.is_none() {
                return Err(ProviderFailure::CredentialAbsent);
            }
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.outcome)()
        }
    }

    fn orchestrator(backends: Vec<Box<dyn GenerationBackend>>) -> Orchestrator {
        Orchestrator::new(PromptComposer::new(StudioAssets::default()), backends)
    }

    #[tokio::test]
    async fn first_success_short_circuits() {
        let winner = Box::new(Scripted::new("gemini", || Ok("<div>G</div>".into())));
        let never = Box::new(Scripted::new("openai", || {
            panic!("later providers must not be attempted")
        }));

        let orch = orchestrator(vec![winner, never]);
        let mut req = GenerationRequest::new("topic", 5);
        req.credentials.insert("gemini", "g-key");
        req.credentials.insert("openai", "o-key");

        assert_eq!(orch.generate(&req).await.unwrap(), "<div>G</div>");
    }

    #[tokio::test]
    async fn auth_failure_falls_through_to_next_provider() {
        let missing = Box::new(Scripted::new("gemini", || Ok(String::new())));
        let rejected = Box::new(Scripted::new("anthropic", || {
            Err(ProviderFailure::Auth("HTTP 401".into()))
        }));
        let winner = Box::new(Scripted::new("openai", || Ok("<div>O</div>".into())));

        let orch = orchestrator(vec![missing, rejected, winner]);
        let mut req = GenerationRequest::new("topic", 5);
        // gemini key deliberately absent
        req.credentials.insert("anthropic", "a-key");
        req.credentials.insert("openai", "o-key");

        assert_eq!(orch.generate(&req).await.unwrap(), "<div>O</div>");
    }

    #[tokio::test]
    async fn composite_error_names_every_provider() {
        let a = Box::new(Scripted::new("gemini", || {
            Err(ProviderFailure::Exhausted("gemini-1.5-flash: HTTP 503".into()))
        }));
        let b = Box::new(Scripted::new("anthropic", || Ok(String::new())));

        let orch = orchestrator(vec![a, b]);
        let mut req = GenerationRequest::new("topic", 5);
        req.credentials.insert("gemini", "g-key");
        // anthropic key absent

        let err = orch.generate(&req).await.unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("gemini: gemini-1.5-flash: HTTP 503"));
        assert!(msg.contains("anthropic: no API key configured"));
    }

    #[tokio::test]
    async fn zero_credentials_is_distinct_failure() {
        let a = Box::new(Scripted::new("gemini", || Ok(String::new())));
        let b = Box::new(Scripted::new("openai", || Ok(String::new())));

        let orch = orchestrator(vec![a, b]);
        let req = GenerationRequest::new("topic", 5);

        assert!(matches!(
            orch.generate(&req).await,
            Err(GenerateError::NoCredentials)
        ));
    }

    /// Scripted variant caller: plays back one outcome per call.
    struct ScriptedVariants {
        outcomes: std::sync::Mutex<Vec<Result<String, VariantFailure>>>,
        calls: AtomicU32,
    }

    impl ScriptedVariants {
        fn new(outcomes: Vec<Result<String, VariantFailure>>) -> Self {
            Self {
                outcomes: std::sync::Mutex::new(outcomes),
                calls: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl VariantCall for ScriptedVariants {
        async fn call_variant(
            &self,
            _model: &str,
            _prompt: &str,
            _credential: Option<&str>,
        ) -> Result<String, VariantFailure> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.outcomes.lock().unwrap().remove(0)
        }
    }

    fn variants(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn auth_rejection_stops_the_variant_loop() {
        let caller = ScriptedVariants::new(vec![
            Err(VariantFailure::Auth("HTTP 401".into())),
            Ok(r#"{"html": "never reached"}"#.into()),
        ]);
        let models = variants(&["model-a", "model-b"]);

        let err = run_variants(&caller, "gemini", &models, "p", Some("key"))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderFailure::Auth(_)));
        // Exactly one request: variants after an auth failure are skipped.
        assert_eq!(caller.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn second_variant_succeeds_after_transport_failure() {
        let caller = ScriptedVariants::new(vec![
            Err(VariantFailure::Transport("HTTP 503 - overloaded".into())),
            Ok(r#"{"html": "<div>B</div>"}"#.into()),
        ]);
        let models = variants(&["model-a", "model-b"]);

        let markup = run_variants(&caller, "gemini", &models, "p", Some("key"))
            .await
            .unwrap();
        assert_eq!(markup, "<div>B</div>");
        assert_eq!(caller.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn exhaustion_keeps_the_last_diagnostic() {
        let caller = ScriptedVariants::new(vec![
            Err(VariantFailure::Transport("HTTP 500".into())),
            Err(VariantFailure::EmptyResponse("finishReason=MAX_TOKENS".into())),
        ]);
        let models = variants(&["model-a", "model-b"]);

        let err = run_variants(&caller, "gemini", &models, "p", Some("key"))
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("model-b"));
        assert!(msg.contains("finishReason=MAX_TOKENS"));
    }

    #[tokio::test]
    async fn unextractable_output_becomes_the_diagnostic() {
        let caller = ScriptedVariants::new(vec![Ok("I cannot produce JSON today.".into())]);
        let models = variants(&["model-a"]);

        let err = run_variants(&caller, "anthropic", &models, "p", Some("key"))
            .await
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("model-a"));
        assert!(msg.contains("no JSON object found"));
    }

    #[tokio::test]
    async fn empty_markup_falls_through_to_next_variant() {
        let caller = ScriptedVariants::new(vec![
            Ok(r#"{"markdown": "wrong field"}"#.into()),
            Ok(r#"{"html": "<div>ok</div>"}"#.into()),
        ]);
        let models = variants(&["model-a", "model-b"]);

        let markup = run_variants(&caller, "openai", &models, "p", Some("key"))
            .await
            .unwrap();
        assert_eq!(markup, "<div>ok</div>");
    }

    #[test]
    fn empty_credential_is_absent() {
        let mut creds = CredentialSet::new();
        creds.insert("gemini", "   ");
        assert!(creds.get("gemini").is_none());
        assert!(creds.is_empty());
    }

    #[test]
    fn slide_count_floor_is_one() {
        assert_eq!(GenerationRequest::new("t", 0).slide_count, 1);
    }
}
