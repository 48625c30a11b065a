mod aggregation;
mod cache;
mod config;
mod dashboard;
mod db;
mod errors;
mod geo;
mod models;
mod normalize;
mod persistence;
mod rate_limit;
mod routes;
mod state;
mod upstream;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cache::{
    ResponseCache, SystemClock, DASHBOARD_CACHE_CAPACITY, DASHBOARD_CACHE_TTL,
    SEARCH_CACHE_CAPACITY, SEARCH_CACHE_TTL,
};
use crate::config::Config;
use crate::db::create_pool;
use crate::persistence::postgres::PgPriceRepository;
use crate::rate_limit::{RateLimiter, LIMIT, WINDOW};
use crate::routes::build_router;
use crate::state::AppState;
use crate::upstream::PriceApiClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting FarmaRadar API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let pool = create_pool(&config.database_url).await?;
    let repo = Arc::new(PgPriceRepository::new(pool));

    // Initialize upstream pricing client
    let searcher = Arc::new(PriceApiClient::new(config.price_api_base_url.clone()));
    info!("Upstream client initialized ({})", config.price_api_base_url);

    // Caches and rate limiter are process-local by policy; the clock is
    // injected so tests can drive expiry deterministically.
    let clock = Arc::new(SystemClock);
    let search_cache = Arc::new(ResponseCache::new(
        SEARCH_CACHE_CAPACITY,
        SEARCH_CACHE_TTL,
        clock.clone(),
    ));
    let dashboard_cache = Arc::new(ResponseCache::new(
        DASHBOARD_CACHE_CAPACITY,
        DASHBOARD_CACHE_TTL,
        clock.clone(),
    ));
    let rate_limiter = Arc::new(RateLimiter::new(LIMIT, WINDOW, clock));
    info!("Response caches and rate limiter initialized");

    // Build app state
    let state = AppState {
        repo,
        searcher,
        search_cache,
        dashboard_cache,
        rate_limiter,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
