mod docs;
mod handlers;
mod metrics;
mod routes;

use academy_common::config::Settings;
use academy_common::content::{ContentCatalog, ContentStore};
use academy_engine::{Executor, ProcessEngine, Validator};
use docs::{DocFetcher, DocsService, HttpFetcher};
use anyhow::Context;
use axum::http::HeaderValue;
use axum::Router;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

pub struct AppState {
    pub settings: Settings,
    pub content: Arc<dyn ContentStore>,
    pub executor: Executor,
    pub validator: Validator,
    pub docs: DocsService,
}

/// Wire the engine to the content store; one `ProcessEngine` is shared by both services
pub fn build_state(
    settings: Settings,
    content: Arc<dyn ContentStore>,
    doc_fetcher: Arc<dyn DocFetcher>,
) -> anyhow::Result<AppState> {
    let engine = Arc::new(ProcessEngine::new(&settings.engine));
    let executor = Executor::new(engine.clone(), settings.engine.preamble.clone());
    let validator = Validator::new(
        engine,
        content.clone(),
        settings.engine.preamble.clone(),
        settings.engine.validation_timeout_secs,
    );
    let docs = DocsService::new(&settings.docs, doc_fetcher)?;

    Ok(AppState {
        settings,
        content,
        executor,
        validator,
        docs,
    })
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    if std::env::var("LOG_FORMAT").map(|f| f == "json").unwrap_or(false) {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init();
    }
}

fn cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let parsed: Result<Vec<HeaderValue>, _> = origins.iter().map(|o| o.parse()).collect();
    match parsed {
        Ok(origins) => CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any),
        Err(e) => {
            warn!(error = %e, "Invalid CORS origin; allowing any origin");
            CorsLayer::permissive()
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    info!("Academy API booting...");

    let settings = Settings::from_env().context("Failed to load settings")?;

    let catalog = ContentCatalog::load_dir(&settings.content_dir)
        .with_context(|| format!("Failed to load content from {}", settings.content_dir.display()))?;
    info!(
        modules = catalog.len(),
        content_dir = %settings.content_dir.display(),
        "Content loaded"
    );

    info!(
        python = %settings.engine.python_bin,
        max_timeout_secs = settings.engine.max_timeout_secs,
        validation_timeout_secs = settings.engine.validation_timeout_secs,
        "Execution engine configured"
    );

    info!(
        base_url = %settings.docs.base_url,
        cache_ttl_secs = settings.docs.cache_ttl_secs,
        "Documentation lookup configured"
    );

    let addr = settings.bind_addr();
    let cors = cors_layer(&settings.cors_origins);
    let fetcher = HttpFetcher::new(Duration::from_secs(settings.docs.fetch_timeout_secs))?;
    let state = Arc::new(build_state(settings, Arc::new(catalog), Arc::new(fetcher))?);

    let app = Router::new()
        .merge(routes::routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Academy API stopped");
    Ok(())
}
