//! cardforge CLI — card-news generation, server, and studio commands.
//!
//! Usage:
//!   cardforge serve         — Start the HTTP API server
//!   cardforge generate      — Generate a card set from the terminal
//!   cardforge trends        — Show current trending topics
//!   cardforge history       — List recent generations
//!   cardforge onboard       — Create a default configuration
//!   cardforge status        — Show current configuration and health

mod auth;
mod server;

use anyhow::Result;
use clap::{Parser, Subcommand};

use cardforge_core::assets::StudioAssets;
use cardforge_core::config::Config;
use cardforge_core::history::HistoryStore;
use cardforge_core::prompt::PromptComposer;
use cardforge_core::provider::{GenerationRequest, Orchestrator};
use cardforge_core::research::ResearchEnricher;
use cardforge_core::trends::TrendSource;

#[derive(Parser)]
#[command(
    name = "cardforge",
    version,
    about = "Turn a short topic into an Instagram-ready card news image set",
    long_about = "cardforge — card-news studio in a single binary.\n\nComposes a design-aware prompt, walks a provider fallback chain (Gemini, Anthropic, OpenAI, local Ollama), and captures the result as slide images."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Bind host (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Bind port (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Generate card markup for a topic
    Generate {
        /// Topic or source text
        text: String,

        /// Number of slides (default from config)
        #[arg(short, long)]
        slides: Option<u32>,

        /// Output file (default: ./cards.html)
        #[arg(short, long, default_value = "cards.html")]
        output: String,

        /// Skip search-grounded topic research
        #[arg(long)]
        no_research: bool,
    },

    /// Show current trending topics
    Trends,

    /// List recent generations
    History,

    /// Create or reset the default configuration
    Onboard,

    /// Show configuration status and health
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Serve { host, port }) => cmd_serve(host, port).await?,
        Some(Commands::Generate {
            text,
            slides,
            output,
            no_research,
        }) => cmd_generate(&text, slides, &output, no_research).await?,
        Some(Commands::Trends) => cmd_trends().await?,
        Some(Commands::History) => cmd_history()?,
        Some(Commands::Onboard) => cmd_onboard()?,
        Some(Commands::Status) => cmd_status()?,
        None => cmd_serve(None, None).await?,
    }

    Ok(())
}

// ── Serve Command ───────────────────────────────────────────────────

async fn cmd_serve(host: Option<String>, port: Option<u16>) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(host) = host {
        config.server.host = host;
    }
    if let Some(port) = port {
        config.server.port = port;
    }

    if let Err(problems) = config.validate() {
        for problem in &problems {
            eprintln!("  ⚠️  {problem}");
        }
    }

    server::run(config).await
}

// ── Generate Command ────────────────────────────────────────────────

async fn cmd_generate(
    text: &str,
    slides: Option<u32>,
    output: &str,
    no_research: bool,
) -> Result<()> {
    let config = Config::load()?;
    let client = reqwest::Client::new();

    let assets = StudioAssets::load(&config.assets_path());
    let composer = PromptComposer::new(assets);
    let orchestrator = Orchestrator::from_config(client.clone(), composer, &config.providers);

    let slide_count = slides.unwrap_or(config.generation.default_slide_count).max(1);

    let gemini_key = config.providers.default_key("gemini");
    let source_text = if no_research {
        text.to_string()
    } else {
        let gemini = config.providers.gemini.as_ref();
        let enricher = ResearchEnricher::new(
            client,
            gemini.and_then(|e| e.api_base.as_deref()),
            gemini.map(|e| e.models.clone()).unwrap_or_default(),
        );
        enricher.enrich(text, gemini_key).await
    };

    let mut request = GenerationRequest::new(source_text, slide_count);
    for provider in ["gemini", "anthropic", "openai"] {
        if let Some(key) = config.providers.default_key(provider) {
            request.credentials.insert(provider, key);
        }
    }

    println!();
    println!("  🎨 Generating {slide_count} slides for: {text}");

    let html = orchestrator.generate(&request).await?;
    std::fs::write(output, &html)?;

    let history = HistoryStore::new(&config.workspace_path(), config.generation.history_limit);
    if let Err(e) = history.append(text, slide_count, &html) {
        tracing::warn!(error = %e, "Failed to append history entry");
    }

    println!("  ✅ Markup written to {output}");
    println!("     Run `cardforge serve` and POST /api/convert to capture slide images.");
    println!();
    Ok(())
}

// ── Trends Command ──────────────────────────────────────────────────

async fn cmd_trends() -> Result<()> {
    let config = Config::load()?;
    let source = TrendSource::new(
        reqwest::Client::new(),
        &config.trends.geo,
        config.trends.max_items,
    );

    let (topics, origin) = source.fetch().await;

    println!();
    println!("  📈 Trending topics ({})", origin.as_str());
    println!("  ─────────────────────────────────────");
    for (i, topic) in topics.iter().enumerate() {
        println!("  {:>2}. {}", i + 1, topic);
    }
    println!();
    Ok(())
}

// ── History Command ─────────────────────────────────────────────────

fn cmd_history() -> Result<()> {
    let config = Config::load()?;
    let history = HistoryStore::new(&config.workspace_path(), config.generation.history_limit);
    let entries = history.load();

    if entries.is_empty() {
        println!("  No generations yet.");
        return Ok(());
    }

    println!();
    for entry in entries {
        println!(
            "  🗂️  {} — {} ({} slides)",
            entry.timestamp, entry.text, entry.slide_count
        );
    }
    println!();
    Ok(())
}

// ── Onboard Command ─────────────────────────────────────────────────

fn cmd_onboard() -> Result<()> {
    let path = Config::write_default_template()?;
    println!();
    println!("  ✅ Configuration created at:");
    println!("     {}", path.display());
    println!();
    println!("  Next steps:");
    println!("  1. Edit the config file and add at least one provider API key");
    println!("  2. Run `cardforge serve` or `cardforge generate \"your topic\"`");
    println!();
    Ok(())
}

// ── Status Command ──────────────────────────────────────────────────

fn cmd_status() -> Result<()> {
    let config_path = Config::default_path();
    let config = Config::load()?;

    println!();
    println!("  🎨 cardforge status");
    println!("  ─────────────────────────────────────");

    if config_path.exists() {
        println!("  Config:     {}", config_path.display());
    } else {
        println!("  Config:     ❌ Not found (run `cardforge onboard`)");
        return Ok(());
    }

    for provider in ["gemini", "anthropic", "openai"] {
        let mark = if config.providers.default_key(provider).is_some() {
            "✅ key configured"
        } else {
            "—"
        };
        println!("  {:<11} {}", format!("{provider}:"), mark);
    }
    match config.providers.ollama.as_ref().filter(|o| o.enabled) {
        Some(o) => println!("  ollama:     ✅ {} @ {}", o.model, o.endpoint),
        None => println!("  ollama:     —"),
    }

    let ws = config.workspace_path();
    println!(
        "  Workspace:  {} {}",
        ws.display(),
        if ws.exists() { "✅" } else { "⚠️  (will be created)" }
    );

    let assets_dir = config.assets_path();
    let assets = StudioAssets::load(&assets_dir);
    println!(
        "  Assets:     {} ({})",
        assets_dir.display(),
        assets.summary()
    );

    let history = HistoryStore::new(&ws, config.generation.history_limit);
    println!("  History:    {} saved", history.load().len());

    if let Err(problems) = config.validate() {
        println!();
        for problem in problems {
            println!("  ⚠️  {problem}");
        }
    }

    println!();
    Ok(())
}
