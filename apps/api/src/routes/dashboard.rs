use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::dashboard::{DashboardBuilder, DashboardSummary};
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct DashboardQuery {
    pub user_id: Uuid,
    #[serde(default)]
    pub refresh: bool,
}

/// GET /api/v1/dashboard
pub async fn handle_dashboard(
    State(state): State<AppState>,
    Query(query): Query<DashboardQuery>,
) -> Result<Json<DashboardSummary>, AppError> {
    let builder = DashboardBuilder::new(
        state.repo.clone(),
        state.dashboard_cache.clone(),
        state.config.janela_volatilidade_dias,
    );
    let summary = builder.build(query.user_id, query.refresh).await;
    Ok(Json(summary))
}
