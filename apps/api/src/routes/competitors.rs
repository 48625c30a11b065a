use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::aggregation::scoring::ScoringEngine;
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub user_id: Uuid,
}

/// POST /api/v1/concorrentes/pontuacao
///
/// Triggers the batch aggressiveness scoring pass for one user. Runs a
/// full historical scan per competitor, which is why it is an explicit
/// endpoint and never part of a dashboard read.
pub async fn handle_recompute_scores(
    State(state): State<AppState>,
    Json(req): Json<ScoreRequest>,
) -> Result<Json<Value>, AppError> {
    let engine = ScoringEngine::new(state.repo.clone(), state.config.janela_pontuacao_dias);
    let concorrentes = engine.recompute(req.user_id).await?;

    Ok(Json(json!({
        "total": concorrentes.len(),
        "concorrentes": concorrentes,
    })))
}
