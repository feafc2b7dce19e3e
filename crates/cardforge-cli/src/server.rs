//! HTTP surface for the card-news studio.
//!
//! One axum router serves the web client: trends, per-user settings,
//! generation, render-and-slice, and the produced slide images. Raw
//! provider diagnostics stay in the logs; known failure shapes map to
//! messages a non-operator can act on.

use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use cardforge_core::assets::StudioAssets;
use cardforge_core::config::Config;
use cardforge_core::error::GenerateError;
use cardforge_core::history::{HistoryEntry, HistoryStore};
use cardforge_core::prompt::PromptComposer;
use cardforge_core::provider::{CredentialSet, GenerationRequest, Orchestrator};
use cardforge_core::render::{CaptureCommandRenderer, SlideRenderer};
use cardforge_core::research::ResearchEnricher;
use cardforge_core::settings::{SettingsStore, UserSettings};
use cardforge_core::trends::TrendSource;

use crate::auth::TokenStore;

/// Background images come straight off a phone camera roll.
const MAX_UPLOAD_BYTES: usize = 20 * 1024 * 1024;

// ── State ───────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct AppState {
    inner: Arc<Inner>,
}

struct Inner {
    config: Config,
    orchestrator: Orchestrator,
    enricher: ResearchEnricher,
    trends: TrendSource,
    settings: SettingsStore,
    history: HistoryStore,
    renderer: CaptureCommandRenderer,
    tokens: TokenStore,
}

impl AppState {
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let client = reqwest::Client::new();
        let workspace = config.workspace_path();
        std::fs::create_dir_all(workspace.join("uploads"))?;

        let assets = StudioAssets::load(&config.assets_path());
        let composer = PromptComposer::new(assets);
        let orchestrator =
            Orchestrator::from_config(client.clone(), composer, &config.providers);

        let gemini = config.providers.gemini.as_ref();
        let enricher = ResearchEnricher::new(
            client.clone(),
            gemini.and_then(|e| e.api_base.as_deref()),
            gemini.map(|e| e.models.clone()).unwrap_or_default(),
        );

        let trends = TrendSource::new(client, &config.trends.geo, config.trends.max_items);
        let settings = SettingsStore::new(&workspace);
        let history = HistoryStore::new(&workspace, config.generation.history_limit);
        let renderer = CaptureCommandRenderer::new(
            &config.render.capture_command,
            &workspace,
            config.render.timeout_seconds,
        );
        let tokens = TokenStore::new(config.server.token_ttl_seconds);

        Ok(Self {
            inner: Arc::new(Inner {
                config,
                orchestrator,
                enricher,
                trends,
                settings,
                history,
                renderer,
                tokens,
            }),
        })
    }
}

// ── Error responses ─────────────────────────────────────────────────

pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

/// Map a generation failure to a user-facing message. The raw
/// diagnostic has already been logged by the caller.
fn generate_error_response(err: &GenerateError) -> ApiError {
    match err {
        GenerateError::NoCredentials => ApiError::bad_request(err.to_string()),
        GenerateError::AllProvidersFailed(detail) => {
            let lower = detail.to_lowercase();
            let message = if lower.contains("resource_exhausted")
                || lower.contains("quota")
                || lower.contains("429")
            {
                "Provider quota or rate limit reached. Check your plan and billing, or try again in a few minutes.".to_string()
            } else if lower.contains("timed out") || lower.contains("timeout") {
                "The model took too long to respond. Try again, or lower the slide count.".to_string()
            } else {
                format!("Card generation failed: {detail}")
            };
            ApiError::new(StatusCode::BAD_GATEWAY, message)
        }
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct GenerateBody {
    text: String,
    slide_count: Option<u32>,
    bg_image_url: Option<String>,
    /// Search-grounded topic enrichment before generation; on by default.
    research: Option<bool>,
    gemini_api_key: Option<String>,
    anthropic_api_key: Option<String>,
    openai_api_key: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    id: String,
    html: String,
    slide_count: u32,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConvertBody {
    html: String,
}

#[derive(Serialize)]
struct ConvertResponse {
    slides: Vec<String>,
}

#[derive(Serialize)]
struct TrendsResponse {
    topics: Vec<String>,
    source: &'static str,
}

#[derive(Serialize)]
struct HistoryResponse {
    history: Vec<HistoryEntry>,
}

// ── Router ──────────────────────────────────────────────────────────

pub fn build_router(state: AppState) -> Router {
    let slides_dir = state.inner.renderer.slides_dir();
    let uploads_dir = state.inner.config.workspace_path().join("uploads");

    Router::new()
        .route("/api/health", get(health))
        .route("/api/trends", get(trends))
        .route("/api/auth/token", post(create_token))
        .route("/api/user/settings", get(get_settings).post(save_settings))
        .route("/api/generate", post(generate))
        .route("/api/convert", post(convert))
        .route("/api/history", get(get_history))
        .route("/api/upload", post(upload))
        .nest_service("/api/slides", ServeDir::new(slides_dir))
        .nest_service("/api/uploads", ServeDir::new(uploads_dir))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind and serve until ctrl-c.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let state = AppState::from_config(config)?;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("cardforge server listening on http://{addr}");

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Shutdown signal received");
            shutdown.cancel();
        }
    });

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await?;
    Ok(())
}

// ── Handlers ────────────────────────────────────────────────────────

static START_TIME: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();

async fn health() -> Json<serde_json::Value> {
    let start = START_TIME.get_or_init(std::time::Instant::now);
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": start.elapsed().as_secs(),
    }))
}

async fn trends(State(state): State<AppState>) -> Json<TrendsResponse> {
    let (topics, origin) = state.inner.trends.fetch().await;
    Json(TrendsResponse {
        topics,
        source: origin.as_str(),
    })
}

async fn create_token(State(state): State<AppState>) -> Json<serde_json::Value> {
    let token = state.inner.tokens.issue();
    Json(serde_json::json!({
        "token": token,
        "expiresInSeconds": state.inner.config.server.token_ttl_seconds,
    }))
}

async fn get_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<UserSettings>, ApiError> {
    require_bearer(&state, &headers)?;
    let user = user_id(&headers);
    Ok(Json(state.inner.settings.get(&user)))
}

async fn save_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(settings): Json<UserSettings>,
) -> Result<Json<serde_json::Value>, ApiError> {
    require_bearer(&state, &headers)?;
    let user = user_id(&headers);
    state.inner.settings.save(&user, &settings).map_err(|e| {
        error!(user, error = %e, "Failed to persist settings");
        ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to save settings")
    })?;
    Ok(Json(serde_json::json!({ "saved": true })))
}

async fn generate(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(body): Json<GenerateBody>,
) -> Result<Json<GenerateResponse>, ApiError> {
    if body.text.trim().is_empty() {
        return Err(ApiError::bad_request("text is required"));
    }

    let user = user_id(&headers);
    let stored = state.inner.settings.get(&user);
    let credentials = resolve_credentials(&body, &stored, &state.inner.config);

    let slide_count = body
        .slide_count
        .unwrap_or(state.inner.config.generation.default_slide_count)
        .max(1);

    let source_text = if body.research.unwrap_or(true) {
        state
            .inner
            .enricher
            .enrich(&body.text, credentials.get("gemini"))
            .await
    } else {
        body.text.clone()
    };

    let mut request = GenerationRequest::new(source_text, slide_count);
    request.bg_image_url = body.bg_image_url.clone();
    request.credentials = credentials;

    let html = state.inner.orchestrator.generate(&request).await.map_err(|e| {
        error!(user, error = %e, "Generation failed");
        generate_error_response(&e)
    })?;

    // History is a convenience view; a persistence hiccup must not fail
    // the request that just paid for a generation.
    let id = match state.inner.history.append(&body.text, slide_count, &html) {
        Ok(entry) => entry.id,
        Err(e) => {
            warn!(error = %e, "Failed to append history entry");
            String::new()
        }
    };

    Ok(Json(GenerateResponse {
        id,
        html,
        slide_count,
    }))
}

async fn convert(
    State(state): State<AppState>,
    Json(body): Json<ConvertBody>,
) -> Result<Json<ConvertResponse>, ApiError> {
    if body.html.trim().is_empty() {
        return Err(ApiError::bad_request("html is required"));
    }

    let files = state.inner.renderer.render(&body.html).await.map_err(|e| {
        error!(error = %e, "Slide capture failed");
        ApiError::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Slide capture failed. Check that the capture command is installed.",
        )
    })?;

    let base = state.inner.config.server.public_url.trim_end_matches('/');
    let slides = files
        .iter()
        .filter_map(|p| p.file_name().and_then(|n| n.to_str()))
        .map(|name| format!("{base}/api/slides/{name}"))
        .collect();

    Ok(Json(ConvertResponse { slides }))
}

async fn get_history(State(state): State<AppState>) -> Json<HistoryResponse> {
    Json(HistoryResponse {
        history: state.inner.history.load(),
    })
}

/// Accept a background image and hand back the URL the generate call
/// can pass as `bgImageUrl`.
async fn upload(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("invalid multipart body: {e}")))?
    {
        if field.file_name().is_none() {
            continue;
        }
        let name = upload_file_name(field.file_name());
        let data = field
            .bytes()
            .await
            .map_err(|e| ApiError::bad_request(format!("failed to read upload: {e}")))?;
        if data.is_empty() {
            return Err(ApiError::bad_request("uploaded file is empty"));
        }

        let dir = state.inner.config.workspace_path().join("uploads");
        std::fs::create_dir_all(&dir)
            .and_then(|_| std::fs::write(dir.join(&name), &data))
            .map_err(|e| {
                error!(error = %e, "Failed to store uploaded image");
                ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, "Failed to store upload")
            })?;

        info!(file = %name, bytes = data.len(), "Background image uploaded");
        let base = state.inner.config.server.public_url.trim_end_matches('/');
        return Ok(Json(serde_json::json!({
            "url": format!("{base}/api/uploads/{name}")
        })));
    }

    Err(ApiError::bad_request("no file field in upload"))
}

// ── Helpers ─────────────────────────────────────────────────────────

fn require_bearer(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .unwrap_or_default();

    if state.inner.tokens.validate(token) {
        Ok(())
    } else {
        Err(ApiError::new(
            StatusCode::UNAUTHORIZED,
            "Missing or expired token",
        ))
    }
}

/// Caller identity for settings storage. Single-user deployments never
/// send the header and share the default bucket.
fn user_id(headers: &HeaderMap) -> String {
    headers
        .get("x-user-id")
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .unwrap_or("default")
        .to_string()
}

/// Timestamped name for a stored upload. Only the extension of the
/// client's filename survives, and only when it is plain alphanumeric.
fn upload_file_name(original: Option<&str>) -> String {
    let ext = original
        .and_then(|n| std::path::Path::new(n).extension())
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "png".to_string());
    format!("bg_{}.{ext}", chrono::Local::now().format("%Y%m%d%H%M%S%3f"))
}

/// Per-provider key resolution: request body beats stored settings
/// beats config defaults.
fn resolve_credentials(
    body: &GenerateBody,
    stored: &UserSettings,
    config: &Config,
) -> CredentialSet {
    let mut credentials = CredentialSet::new();
    let sources = [
        ("gemini", &body.gemini_api_key, &stored.gemini_api_key),
        ("anthropic", &body.anthropic_api_key, &stored.anthropic_api_key),
        ("openai", &body.openai_api_key, &stored.openai_api_key),
    ];

    for (provider, from_body, from_settings) in sources {
        let key = from_body
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .or_else(|| from_settings.as_deref().filter(|k| !k.trim().is_empty()))
            .or_else(|| config.providers.default_key(provider));
        if let Some(key) = key {
            credentials.insert(provider, key);
        }
    }
    credentials
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body_with_key(key: &str) -> GenerateBody {
        GenerateBody {
            text: "topic".into(),
            gemini_api_key: Some(key.into()),
            ..Default::default()
        }
    }

    #[test]
    fn request_key_beats_settings_and_config() {
        let json = r#"{"providers": {"gemini": {"apiKey": "config-key"}}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        let stored = UserSettings {
            gemini_api_key: Some("stored-key".into()),
            ..Default::default()
        };

        let creds = resolve_credentials(&body_with_key("body-key"), &stored, &config);
        assert_eq!(creds.get("gemini"), Some("body-key"));
    }

    #[test]
    fn blank_request_key_falls_back_to_settings() {
        let config = Config::default();
        let stored = UserSettings {
            gemini_api_key: Some("stored-key".into()),
            anthropic_api_key: Some("a-key".into()),
            ..Default::default()
        };

        let creds = resolve_credentials(&body_with_key("  "), &stored, &config);
        assert_eq!(creds.get("gemini"), Some("stored-key"));
        assert_eq!(creds.get("anthropic"), Some("a-key"));
        assert_eq!(creds.get("openai"), None);
    }

    #[test]
    fn config_default_is_last_resort() {
        let json = r#"{"providers": {"openai": {"apiKey": "sk-config"}}}"#;
        let config: Config = serde_json::from_str(json).unwrap();

        let creds = resolve_credentials(&GenerateBody::default(), &UserSettings::default(), &config);
        assert_eq!(creds.get("openai"), Some("sk-config"));
        assert_eq!(creds.get("gemini"), None);
    }

    #[test]
    fn quota_failures_get_a_friendly_message() {
        let err = GenerateError::AllProvidersFailed(
            "gemini: gpt: HTTP 429 - RESOURCE_EXHAUSTED".into(),
        );
        let response = generate_error_response(&err);
        assert_eq!(response.status, StatusCode::BAD_GATEWAY);
        assert!(response.message.contains("quota or rate limit"));
    }

    #[test]
    fn timeout_failures_get_a_friendly_message() {
        let err =
            GenerateError::AllProvidersFailed("ollama: model: request timed out".into());
        let response = generate_error_response(&err);
        assert!(response.message.contains("took too long"));
    }

    #[test]
    fn unknown_failures_keep_the_diagnostic() {
        let err = GenerateError::AllProvidersFailed("gemini: HTTP 500 - boom".into());
        let response = generate_error_response(&err);
        assert!(response.message.contains("HTTP 500 - boom"));
    }

    #[test]
    fn upload_name_keeps_a_clean_extension_only() {
        assert!(upload_file_name(Some("holiday photo.JPEG")).ends_with(".jpeg"));
        assert!(upload_file_name(Some("../../etc/passwd")).ends_with(".png"));
        assert!(upload_file_name(Some("noextension")).ends_with(".png"));
        assert!(upload_file_name(None).ends_with(".png"));
        assert!(upload_file_name(Some("x.tar.gz")).ends_with(".gz"));
    }

    #[tokio::test]
    async fn history_route_serves_stored_entries() {
        let dir = tempfile::tempdir().unwrap();
        let json = format!(
            r#"{{"generation": {{"workspace": "{}"}}}}"#,
            dir.path().display()
        );
        let config: Config = serde_json::from_str(&json).unwrap();

        HistoryStore::new(dir.path(), 20)
            .append("first topic", 5, "<div/>")
            .unwrap();

        let state = AppState::from_config(config).unwrap();
        let response = get_history(State(state)).await;
        assert_eq!(response.0.history.len(), 1);
        assert_eq!(response.0.history[0].text, "first topic");
    }

    #[test]
    fn missing_user_header_uses_default_bucket() {
        assert_eq!(user_id(&HeaderMap::new()), "default");

        let mut headers = HeaderMap::new();
        headers.insert("x-user-id", "alice@example.com".parse().unwrap());
        assert_eq!(user_id(&headers), "alice@example.com");
    }
}
