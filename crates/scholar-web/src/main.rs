use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;
use tracing_subscriber::EnvFilter;

use scholar_core::generation::backend_from_config;
use scholar_core::{Actions, CapabilityInvoker, config_file};

mod handlers;
mod models;
mod state;
mod upload;

#[cfg(test)]
mod tests;

use state::AppState;

/// Build the application router. Routes are relative to the site root.
pub fn build_router(state: Arc<AppState>) -> Router {
    let body_limit = DefaultBodyLimit::max(state.max_upload_bytes);

    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/api/extract", post(handlers::extract::extract))
        .route(
            "/api/summarize",
            post(handlers::capabilities::summarize),
        )
        .route(
            "/api/suggest-formatting",
            post(handlers::capabilities::suggest_formatting),
        )
        .route("/api/reformat", post(handlers::capabilities::reformat))
        .route("/api/chat", post(handlers::capabilities::chat))
        .route("/api/export", post(handlers::export::export))
        .layer(body_limit)
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let file = config_file::load_config();
    let config = config_file::resolve(&file).map_err(anyhow::Error::msg)?;
    let backend = backend_from_config(&config)?;
    tracing::info!(
        backend = backend.name(),
        model = %config.model,
        "generation backend ready"
    );

    let state = Arc::new(AppState {
        actions: Actions::new(CapabilityInvoker::new(backend, &config)),
        max_upload_bytes: config.max_upload_bytes(),
    });
    let app = build_router(state);

    let addr: SocketAddr = config.bind_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}
