use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod blog;
pub mod content;
pub mod preview;
pub mod startup_checks;
pub mod static_files;
pub mod templating;

use blog::BlogConfig;
use content::{ContentError, ContentSourceConfig, DynContentSource};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerConfig,
    pub app: AppConfig,
    pub templates: TemplateConfig,
    pub static_files: StaticConfig,
    #[serde(default)]
    pub content: ContentSourceConfig,
    #[serde(default)]
    pub blog: BlogConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    pub name: String,
    pub log_level: String,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Key for signing the preview cookie.
    pub preview_secret: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TemplateConfig {
    pub directory: PathBuf,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StaticConfig {
    pub directory: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 3000,
            },
            app: AppConfig {
                name: "spacetraveling".to_string(),
                log_level: "info".to_string(),
                base_url: None,
                preview_secret: "change-me-in-production".to_string(),
            },
            templates: TemplateConfig {
                directory: PathBuf::from("templates"),
            },
            static_files: StaticConfig {
                directory: PathBuf::from("static"),
            },
            content: ContentSourceConfig::default(),
            blog: BlogConfig::default(),
        }
    }
}

use axum::{
    Router,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::IntoResponse,
};
use serde::de::IgnoredAny;
use std::{collections::HashMap, sync::Arc};
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub template_engine: Arc<templating::TemplateEngine>,
    pub static_handler: static_files::StaticFileHandler,
    pub listing: Arc<blog::ListingController>,
    pub detail: Arc<blog::DetailController>,
    pub config: Config,
}

impl AppState {
    pub async fn new(config: Config, source: DynContentSource) -> Self {
        let template_engine = Arc::new(templating::TemplateEngine::new(
            config.templates.directory.clone(),
        ));

        let static_handler =
            static_files::StaticFileHandler::new(config.static_files.directory.clone());
        static_handler.refresh_file_versions().await;

        let listing = Arc::new(blog::ListingController::new(
            source.clone(),
            config.blog.clone(),
        ));
        let detail = Arc::new(blog::DetailController::new(source, config.blog.clone()));

        Self {
            template_engine,
            static_handler,
            listing,
            detail,
            config,
        }
    }
}

async fn static_file_handler(
    State(app_state): State<AppState>,
    Path(path): Path<String>,
    Query(query): Query<HashMap<String, IgnoredAny>>,
    headers: HeaderMap,
) -> impl IntoResponse {
    let has_version = query.contains_key("v");
    app_state
        .static_handler
        .serve(&path, has_version, &headers)
        .await
}

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/", axum::routing::get(blog::handlers::index_handler))
        .route(
            "/api/posts",
            axum::routing::get(blog::handlers::load_more_handler),
        )
        .route(
            "/post/{slug}",
            axum::routing::get(blog::handlers::post_handler),
        )
        .route("/api/preview", axum::routing::get(preview::preview_handler))
        .route(
            "/api/exit-preview",
            axum::routing::get(preview::exit_preview_handler),
        )
        .route("/static/{*path}", axum::routing::get(static_file_handler))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    let method = request.method();
                    let uri = request.uri();
                    let matched_path = request
                        .extensions()
                        .get::<axum::extract::MatchedPath>()
                        .map(|matched_path| matched_path.as_str());

                    tracing::info_span!(
                        "http_request",
                        method = %method,
                        uri = %uri,
                        matched_path,
                    )
                })
                .on_request(|request: &axum::http::Request<_>, _span: &tracing::Span| {
                    let headers = request.headers();
                    let user_agent = headers
                        .get("user-agent")
                        .and_then(|h| h.to_str().ok())
                        .unwrap_or("-");
                    let referer = headers
                        .get("referer")
                        .and_then(|h| h.to_str().ok())
                        .unwrap_or("-");

                    // Query strings carry preview tokens, so only the path is logged.
                    tracing::info!(
                        target: "access_log",
                        method = %request.method(),
                        path = %request.uri().path(),
                        user_agent = %user_agent,
                        referer = %referer,
                        "request"
                    );
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        let size = response
                            .headers()
                            .get("content-length")
                            .and_then(|h| h.to_str().ok())
                            .unwrap_or("-");

                        tracing::info!(
                            target: "access_log",
                            status = %response.status(),
                            size = %size,
                            latency_ms = %latency.as_millis(),
                            "response"
                        );
                    },
                ),
        )
        .with_state(app_state)
}

/// Builds the content source named by `config.content` and the router on
/// top of it.
pub async fn create_app(config: Config) -> Result<Router, ContentError> {
    let source = content::create_source(&config.content).await?;
    tracing::info!("Using content source: {}", source.name());

    let app_state = AppState::new(config, source).await;
    Ok(create_router(app_state))
}
