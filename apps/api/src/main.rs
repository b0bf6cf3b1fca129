mod config;
mod db;
mod engine_client;
mod errors;
mod models;
mod profile;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::http::{header, HeaderName, HeaderValue, Method};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, StoreBackend};
use crate::db::create_pool;
use crate::engine_client::HttpRoadmapEngine;
use crate::profile::handlers::{IDENTITY_EMAIL_HEADER, IDENTITY_NAME_HEADER};
use crate::profile::store::{MemoryProfileStore, PgProfileStore, ProfileStore};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails fast on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting career API v{}", env!("CARGO_PKG_VERSION"));

    let store = build_store(&config).await?;

    let engine = HttpRoadmapEngine::new(config.engine_url.clone(), config.engine_timeout_secs)?;
    info!(
        "Engine client initialized ({}, timeout {}s)",
        engine.url(),
        config.engine_timeout_secs
    );

    let state = AppState {
        store,
        engine: Arc::new(engine),
    };

    let app = build_router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(build_cors(&config)?),
    );

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn build_store(config: &Config) -> Result<Arc<dyn ProfileStore>> {
    match config.store_backend {
        StoreBackend::Postgres => {
            let url = config
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres store")?;
            let pool = create_pool(url).await?;
            Ok(Arc::new(PgProfileStore::new(pool)))
        }
        StoreBackend::Memory => {
            info!("Using in-memory profile store; data is lost on restart");
            Ok(Arc::new(MemoryProfileStore::new()))
        }
    }
}

/// Single-origin CORS for the browser client. Credentials are allowed, so
/// methods and headers are listed explicitly.
fn build_cors(config: &Config) -> Result<CorsLayer> {
    let origin: HeaderValue = config
        .frontend_url
        .parse()
        .with_context(|| format!("FRONTEND_URL '{}' is not a valid origin", config.frontend_url))?;

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(IDENTITY_NAME_HEADER),
            HeaderName::from_static(IDENTITY_EMAIL_HEADER),
        ]))
}
