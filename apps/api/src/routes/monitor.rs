use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::aggregation::monitor::{MonitorEngine, ProductMonitorResult};
use crate::errors::AppError;
use crate::normalize::Coordenadas;
use crate::state::AppState;

const DEFAULT_RAIO_KM: u32 = 10;

#[derive(Debug, Deserialize)]
pub struct MonitorRequest {
    pub user_id: Uuid,
    /// Subset of products to monitor; absent means every product the user
    /// registered.
    pub produto_ids: Option<Vec<Uuid>>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub raio: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct MonitorResponse {
    pub resultados: Vec<ProductMonitorResult>,
    pub total: usize,
    pub degradados: usize,
}

/// POST /api/v1/monitor
///
/// Location and radius fall back to the caller's active search profile,
/// then to the configured reference point.
pub async fn handle_monitor(
    State(state): State<AppState>,
    Json(req): Json<MonitorRequest>,
) -> Result<Json<MonitorResponse>, AppError> {
    let profile = state.repo.active_profile(req.user_id).await?;

    let center = match (req.lat, req.lon) {
        (Some(lat), Some(lon)) => Coordenadas { lat, lon },
        _ => profile
            .as_ref()
            .map(|p| Coordenadas { lat: p.lat, lon: p.lon })
            .unwrap_or(Coordenadas {
                lat: state.config.default_lat,
                lon: state.config.default_lon,
            }),
    };
    let raio = req
        .raio
        .or_else(|| profile.as_ref().map(|p| p.raio_km as u32))
        .unwrap_or(DEFAULT_RAIO_KM)
        .clamp(1, 50);

    let products = match &req.produto_ids {
        Some(ids) if !ids.is_empty() => state.repo.products_by_ids(req.user_id, ids).await?,
        _ => state.repo.list_products(req.user_id).await?,
    };

    let engine = MonitorEngine::new(
        state.searcher.clone(),
        state.search_cache.clone(),
        state.repo.clone(),
        (state.config.default_lat, state.config.default_lon),
    );
    let resultados = engine.run(req.user_id, &products, center, raio).await;

    let degradados = resultados.iter().filter(|r| r.degradado).count();
    Ok(Json(MonitorResponse {
        total: resultados.len(),
        degradados,
        resultados,
    }))
}
