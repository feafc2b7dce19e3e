//! Configuration module for cardforge.
//!
//! Loads typed configuration from `~/.cardforge/config.json`.
//! All fields use `serde` for zero-boilerplate deserialization; request
//! payloads may override the provider keys stored here.

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub providers: ProvidersConfig,
    pub server: ServerConfig,
    pub generation: GenerationConfig,
    pub render: RenderConfig,
    pub trends: TrendsConfig,
}

impl Config {
    /// Load configuration from the default path (`~/.cardforge/config.json`).
    pub fn load() -> anyhow::Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Config::default())
        }
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Get the default config file path.
    pub fn default_path() -> PathBuf {
        Self::config_dir().join("config.json")
    }

    /// Get the default config directory path.
    pub fn config_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".cardforge")
    }

    /// Resolved workspace directory (history, slides, uploads, vault key).
    pub fn workspace_path(&self) -> PathBuf {
        let raw = &self.generation.workspace;
        if raw.starts_with("~/") || raw.starts_with("~\\") {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(&raw[2..])
        } else {
            PathBuf::from(raw)
        }
    }

    /// Resolved studio-assets directory.
    pub fn assets_path(&self) -> PathBuf {
        let raw = &self.generation.assets_dir;
        if raw.starts_with("~/") || raw.starts_with("~\\") {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(&raw[2..])
        } else {
            PathBuf::from(raw)
        }
    }

    /// Write the default config template to disk.
    pub fn write_default_template() -> anyhow::Result<PathBuf> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let template = serde_json::json!({
            "providers": {
                "gemini": { "apiKey": "YOUR_GEMINI_KEY_HERE" }
            },
            "server": {
                "host": "127.0.0.1",
                "port": 8899
            }
        });

        std::fs::write(&path, serde_json::to_string_pretty(&template)?)?;
        Ok(path)
    }

    /// Validate the configuration, returning every problem found.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.generation.default_slide_count == 0 {
            errors.push("generation.defaultSlideCount must be at least 1".to_string());
        }
        for (name, entry) in [
            ("gemini", &self.providers.gemini),
            ("anthropic", &self.providers.anthropic),
            ("openai", &self.providers.openai),
        ] {
            if let Some(e) = entry {
                if e.api_key.contains("YOUR_") {
                    errors.push(format!(
                        "providers.{name}.apiKey still holds the placeholder value"
                    ));
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

// ── Provider Configuration ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProviderEntry {
    pub api_key: String,
    pub api_base: Option<String>,
    /// Model-variant override, priority order. Empty = adapter defaults.
    pub models: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OllamaEntry {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
}

impl Default for OllamaEntry {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "http://localhost:11434".into(),
            model: "qwen2.5-coder:14b".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub gemini: Option<ProviderEntry>,
    pub anthropic: Option<ProviderEntry>,
    pub openai: Option<ProviderEntry>,
    pub ollama: Option<OllamaEntry>,
}

impl ProvidersConfig {
    /// Default credential for a hosted provider, if configured with a
    /// non-empty key.
    pub fn default_key(&self, provider: &str) -> Option<&str> {
        let entry = match provider {
            "gemini" => self.gemini.as_ref(),
            "anthropic" => self.anthropic.as_ref(),
            "openai" => self.openai.as_ref(),
            _ => None,
        };
        entry
            .map(|e| e.api_key.as_str())
            .filter(|k| !k.trim().is_empty())
    }
}

// ── Generation Configuration ────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationConfig {
    pub workspace: String,
    pub assets_dir: String,
    pub default_slide_count: u32,
    /// Cap on kept history entries, newest first.
    pub history_limit: usize,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            workspace: "~/.cardforge/workspace".into(),
            assets_dir: "~/.cardforge/assets".into(),
            default_slide_count: 5,
            history_limit: 20,
        }
    }
}

// ── Render Configuration ────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderConfig {
    /// Capture command invoked as `<command> --input <html>`; the
    /// headless-browser automation lives outside this process.
    pub capture_command: String,
    pub timeout_seconds: u64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            capture_command: "cardforge-capture".into(),
            timeout_seconds: 120,
        }
    }
}

// ── Trends Configuration ────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TrendsConfig {
    /// Geo code for the Google Trends daily RSS feed.
    pub geo: String,
    pub max_items: usize,
}

impl Default for TrendsConfig {
    fn default() -> Self {
        Self {
            geo: "US".into(),
            max_items: 15,
        }
    }
}

// ── Server Configuration ────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Public base URL used when handing upload/slide URLs to clients.
    pub public_url: String,
    /// Issued auth-token lifetime.
    pub token_ttl_seconds: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 8899,
            public_url: "http://localhost:8899".into(),
            token_ttl_seconds: 60 * 60 * 24,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.port, 8899);
        assert_eq!(config.generation.default_slide_count, 5);
        assert_eq!(config.generation.history_limit, 20);
        assert!(config.providers.gemini.is_none());
    }

    #[test]
    fn test_deserialize_minimal_json() {
        let json = r#"{"providers": {"gemini": {"apiKey": "test-key"}}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        let entry = config.providers.gemini.unwrap();
        assert_eq!(entry.api_key, "test-key");
        assert!(entry.models.is_empty());
    }

    #[test]
    fn test_default_key_lookup() {
        let json = r#"{"providers": {"openai": {"apiKey": "sk-xxx"}, "gemini": {"apiKey": "  "}}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.providers.default_key("openai"), Some("sk-xxx"));
        // Whitespace-only keys count as absent.
        assert_eq!(config.providers.default_key("gemini"), None);
        assert_eq!(config.providers.default_key("anthropic"), None);
    }

    #[test]
    fn test_validate_flags_placeholder_keys() {
        let json = r#"{"providers": {"gemini": {"apiKey": "YOUR_GEMINI_KEY_HERE"}}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 1);
        assert!(errors[0].contains("gemini"));
    }

    #[test]
    fn test_ollama_defaults() {
        let json = r#"{"providers": {"ollama": {"enabled": true}}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        let ollama = config.providers.ollama.unwrap();
        assert!(ollama.enabled);
        assert_eq!(ollama.endpoint, "http://localhost:11434");
    }
}
