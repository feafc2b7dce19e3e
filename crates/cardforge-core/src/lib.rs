//! cardforge-core: Core library for the cardforge card-news studio.
//!
//! This crate contains all the building blocks for turning a topic into
//! a set of Instagram-format card-news slides:
//!
//! - [`config`] — Typed configuration loading from JSON
//! - [`assets`] — Studio design assets fed into the prompt
//! - [`prompt`] — Deterministic prompt composition
//! - [`provider`] — Generation backends (Gemini, Anthropic, OpenAI, Ollama) and the fallback orchestrator
//! - [`extract`] — Payload extraction from raw model output
//! - [`research`] — Search-grounded topic enrichment
//! - [`trends`] — Trending-topic discovery with static fallback
//! - [`render`] — Slide capture via an external command
//! - [`history`] — Capped generation history
//! - [`settings`] / [`vault`] — Per-user API keys, encrypted at rest
//!
//! # Quick Start
//!
//! ```no_run
//! use cardforge_core::assets::StudioAssets;
//! use cardforge_core::config::Config;
//! use cardforge_core::prompt::PromptComposer;
//! use cardforge_core::provider::{GenerationRequest, Orchestrator};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let client = reqwest::Client::new();
//!
//! let assets = StudioAssets::load(&config.assets_path());
//! let composer = PromptComposer::new(assets);
//! let orchestrator = Orchestrator::from_config(client, composer, &config.providers);
//!
//! let mut request = GenerationRequest::new("Why index funds win", 5);
//! if let Some(key) = config.providers.default_key("gemini") {
//!     request.credentials.insert("gemini", key);
//! }
//!
//! let markup = orchestrator.generate(&request).await?;
//! # let _ = markup;
//! # Ok(())
//! # }
//! ```

pub mod assets;
pub mod config;
pub mod error;
pub mod extract;
pub mod history;
pub mod prompt;
pub mod provider;
pub mod render;
pub mod research;
pub mod settings;
pub mod trends;
pub mod vault;
