use std::sync::Arc;

use crate::cache::ResponseCache;
use crate::config::Config;
use crate::persistence::PriceRepository;
use crate::rate_limit::RateLimiter;
use crate::upstream::ProductSearcher;

/// Shared application state injected into all route handlers via Axum extractors.
///
/// The cache and rate-limiter instances live here, passed explicitly through
/// the pipeline's entry points — no process-wide singletons.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn PriceRepository>,
    /// Upstream pricing API, behind its trait so tests can fake it.
    pub searcher: Arc<dyn ProductSearcher>,
    /// Raw upstream responses, 15 min TTL.
    pub search_cache: Arc<ResponseCache>,
    /// Joined dashboard summaries, 5 min TTL — deliberately separate from
    /// the search cache.
    pub dashboard_cache: Arc<ResponseCache>,
    pub rate_limiter: Arc<RateLimiter>,
    pub config: Config,
}
