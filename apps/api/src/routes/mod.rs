pub mod competitors;
pub mod dashboard;
pub mod health;
pub mod monitor;
pub mod prices;
pub mod profiles;

use axum::{
    routing::{get, post},
    Router,
};

use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Public aggregation endpoint, action-dispatched
        .route(
            "/api/v1/precos",
            get(prices::handle_search).post(prices::handle_snapshot),
        )
        // Monitoring pass over the user's products
        .route("/api/v1/monitor", post(monitor::handle_monitor))
        // Dashboard summary
        .route("/api/v1/dashboard", get(dashboard::handle_dashboard))
        // Batch competitor scoring
        .route(
            "/api/v1/concorrentes/pontuacao",
            post(competitors::handle_recompute_scores),
        )
        // Search profile activation
        .route(
            "/api/v1/perfis/:id/ativar",
            post(profiles::handle_activate_profile),
        )
        .with_state(state)
}
