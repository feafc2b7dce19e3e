//! Error types for the generation pipeline.
//!
//! Two levels of failure exist:
//!
//! * [`ProviderFailure`] — the outcome of one provider adapter. A missing
//!   credential, a rejected key, or an exhausted variant list. Absorbed by
//!   the orchestrator and turned into a per-provider diagnostic line.
//!
//! * [`GenerateError`] — terminal: every configured provider was skipped
//!   or failed. Carries the full diagnostic trail so operators can tell
//!   "bad key" from "provider outage" from "quota exhausted".
//!
//! Failures at the model-variant level (a 500, an empty body, unparseable
//! output) never surface individually; they only feed the diagnostic that
//! the adapter reports when its whole variant list is used up.

use thiserror::Error;

/// Why a single provider could not produce markup.
#[derive(Debug, Error)]
pub enum ProviderFailure {
    /// No API key was configured for this provider. The provider was
    /// skipped without any network call; informational, not an error.
    #[error("no API key configured")]
    CredentialAbsent,

    /// The provider rejected the key (HTTP 401/403). Fatal for the whole
    /// provider: further model variants would fail identically.
    #[error("authentication failed — check the API key ({0})")]
    Auth(String),

    /// Every model variant was tried and none yielded usable markup.
    /// Carries the diagnostic of the *last* variant, not a generic
    /// message.
    #[error("{0}")]
    Exhausted(String),
}

/// Failure of one request to one model variant. Internal to the adapters;
/// everything except `Auth` triggers fallback to the next variant.
#[derive(Debug)]
pub enum VariantFailure {
    /// Network error, timeout, or a non-2xx status other than 401/403.
    Transport(String),
    /// HTTP 401/403 — propagated as [`ProviderFailure::Auth`].
    Auth(String),
    /// 2xx but no usable text in the response body.
    EmptyResponse(String),
    /// Response text present but no markup could be extracted from it.
    Extraction(String),
}

impl VariantFailure {
    /// Diagnostic detail, regardless of variant-failure kind.
    pub fn detail(&self) -> &str {
        match self {
            VariantFailure::Transport(d)
            | VariantFailure::Auth(d)
            | VariantFailure::EmptyResponse(d)
            | VariantFailure::Extraction(d) => d,
        }
    }
}

/// Raw model output could not be reduced to a well-formed JSON payload.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// No `{...}` object could be located in the text at all.
    #[error("no JSON object found in model output")]
    NoJsonObject,

    /// A candidate substring was located but did not parse as a JSON
    /// object (bad syntax, truncation, or a non-object root).
    #[error("model output is not valid JSON: {0}")]
    InvalidJson(String),
}

/// Terminal failure of one generation call.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// Not a single provider had a credential (and no local model is
    /// configured). Distinct from exhaustion so the user-facing message
    /// can say "add an API key" instead of "everything failed".
    #[error("no AI provider API keys are configured — add one in settings")]
    NoCredentials,

    /// Every configured provider failed. The detail joins one diagnostic
    /// line per provider, in priority order.
    #[error("all AI providers failed [{0}]")]
    AllProvidersFailed(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exhausted_carries_last_diagnostic_verbatim() {
        let e = ProviderFailure::Exhausted("gemini-1.5-flash: HTTP 503 - overloaded".into());
        assert_eq!(e.to_string(), "gemini-1.5-flash: HTTP 503 - overloaded");
    }

    #[test]
    fn all_providers_failed_display() {
        let e = GenerateError::AllProvidersFailed(
            "gemini: no API key configured | openai: HTTP 429".into(),
        );
        let msg = e.to_string();
        assert!(msg.contains("gemini: no API key configured"));
        assert!(msg.contains("openai: HTTP 429"));
    }

    #[test]
    fn no_credentials_is_distinct_message() {
        let msg = GenerateError::NoCredentials.to_string();
        assert!(msg.contains("no AI provider API keys"));
        assert!(!msg.contains("failed ["));
    }
}
