use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ActivateProfileRequest {
    pub user_id: Uuid,
}

/// POST /api/v1/perfis/:id/ativar
///
/// Activation is transactional at the storage layer: afterwards exactly
/// one of the user's profiles is active, whatever was active before.
pub async fn handle_activate_profile(
    State(state): State<AppState>,
    Path(profile_id): Path<Uuid>,
    Json(req): Json<ActivateProfileRequest>,
) -> Result<StatusCode, AppError> {
    state.repo.activate_profile(req.user_id, profile_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
