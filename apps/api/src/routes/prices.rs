//! Public aggregation endpoint, action-dispatched:
//! `GET /api/v1/precos?action=categories|products|fuel` and
//! `POST /api/v1/precos?action=snapshot`.
//!
//! Always best-effort: validation problems are 400s with a readable
//! message, quota exhaustion is a 429, upstream failure after retries a
//! 500. Empty upstream results are a normal response with a message field.

use std::collections::HashMap;

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    Json,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::aggregation::metrics::{positive_prices, resumo};
use crate::aggregation::snapshot::build_snapshot;
use crate::cache::cache_key;
use crate::errors::AppError;
use crate::geo;
use crate::normalize::{normalize_all, CanonicalRecord, Coordenadas};
use crate::state::AppState;
use crate::upstream::{CategoryQuery, FuelQuery, FuelType, ProductQuery, SearchOrder};

const DEFAULT_RAIO_KM: u32 = 10;
const MIN_RAIO_KM: u32 = 1;
const MAX_RAIO_KM: u32 = 50;
const ANONYMOUS_IDENTITY: &str = "anonimo";
const EMPTY_MESSAGE: &str = "Nenhum resultado encontrado para a busca informada";

/// GET /api/v1/precos
pub async fn handle_search(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<Value>, AppError> {
    check_rate_limit(&state, &headers)?;

    let action = params
        .get("action")
        .ok_or_else(|| AppError::Validation("parâmetro 'action' é obrigatório".to_string()))?;

    match action.as_str() {
        "categories" => search_categories(&state, &params).await,
        "products" => search_products(&state, &params).await,
        "fuel" => search_fuel(&state, &params).await,
        other => Err(AppError::Validation(format!("ação desconhecida: '{other}'"))),
    }
}

#[derive(Debug, Deserialize)]
pub struct SnapshotRequest {
    pub termos: Vec<String>,
    pub raio: Option<u32>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// POST /api/v1/precos?action=snapshot
pub async fn handle_snapshot(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    Json(req): Json<SnapshotRequest>,
) -> Result<Json<Value>, AppError> {
    check_rate_limit(&state, &headers)?;

    if params.get("action").map(String::as_str) != Some("snapshot") {
        return Err(AppError::Validation(
            "parâmetro 'action' deve ser 'snapshot'".to_string(),
        ));
    }
    if req.termos.is_empty() {
        return Err(AppError::Validation(
            "o corpo deve trazer ao menos um termo em 'termos'".to_string(),
        ));
    }

    let center = req
        .lat
        .zip(req.lon)
        .map(|(lat, lon)| Coordenadas { lat, lon })
        .unwrap_or_else(|| default_center(&state));
    let raio = req
        .raio
        .unwrap_or(DEFAULT_RAIO_KM)
        .clamp(MIN_RAIO_KM, MAX_RAIO_KM);

    let estabelecimentos = build_snapshot(
        &state.searcher,
        &state.search_cache,
        &req.termos,
        center,
        raio,
        fallback_location(&state),
    )
    .await;

    let mut body = json!({
        "estabelecimentos": estabelecimentos,
        "geohash": spatial_key_for(&state, center),
    });
    if body["estabelecimentos"].as_array().is_some_and(|a| a.is_empty()) {
        body["mensagem"] = json!(EMPTY_MESSAGE);
    }
    Ok(Json(body))
}

async fn search_categories(
    state: &AppState,
    params: &HashMap<String, String>,
) -> Result<Json<Value>, AppError> {
    let termo = require_param(params, "termo")?;
    let raio = parse_raio(params)?;
    let center = parse_center(state, params);
    let local = spatial_key_for(state, center);

    let key = cache_key(
        "categories",
        &[
            ("local", local.clone()),
            ("termo", termo.clone()),
            ("raio", raio.to_string()),
        ],
    );
    let payload = match state.search_cache.get(&key) {
        Some(cached) => cached,
        None => {
            let fresh = state
                .searcher
                .search_categories(&CategoryQuery {
                    local: local.clone(),
                    termo,
                    raio,
                })
                .await?;
            state.search_cache.set(&key, fresh.clone());
            fresh
        }
    };

    let categorias = payload
        .get("categorias")
        .cloned()
        .unwrap_or_else(|| json!([]));
    let produtos = normalized_list(&payload, "produtos", center);
    let summary = resumo(&positive_prices(&produtos));
    let vazio = produtos.is_empty();

    let mut body = json!({
        "categorias": categorias,
        "produtos": produtos,
        "resumo": summary,
        "geohash": local,
    });
    if vazio {
        body["mensagem"] = json!(EMPTY_MESSAGE);
    }
    Ok(Json(body))
}

async fn search_products(
    state: &AppState,
    params: &HashMap<String, String>,
) -> Result<Json<Value>, AppError> {
    let termo = params.get("termo").cloned().unwrap_or_default();
    let categoria = params.get("categoria").cloned().filter(|c| !c.is_empty());
    if termo.is_empty() && categoria.is_none() {
        return Err(AppError::Validation(
            "informe 'termo' ou 'categoria' para buscar produtos".to_string(),
        ));
    }
    let ordem = parse_ordem(params)?;
    let raio = parse_raio(params)?;
    let center = parse_center(state, params);
    let local = spatial_key_for(state, center);

    let mut key_params = vec![
        ("local", local.clone()),
        ("termo", termo.clone()),
        ("raio", raio.to_string()),
        ("ordem", ordem.as_flag().to_string()),
    ];
    if let Some(categoria) = &categoria {
        key_params.push(("categoria", categoria.clone()));
    }
    let key = cache_key("products", &key_params);

    let payload = match state.search_cache.get(&key) {
        Some(cached) => cached,
        None => {
            let fresh = state
                .searcher
                .search_products(&ProductQuery {
                    local: local.clone(),
                    termo,
                    raio,
                    ordem,
                    categoria,
                })
                .await?;
            state.search_cache.set(&key, fresh.clone());
            fresh
        }
    };

    let mut produtos = normalized_list(&payload, "produtos", center);
    sort_records(&mut produtos, ordem);
    let summary = resumo(&positive_prices(&produtos));
    let vazio = produtos.is_empty();

    let mut body = json!({
        "produtos": produtos,
        "resumo": summary,
        "geohash": local,
    });
    if vazio {
        body["mensagem"] = json!(EMPTY_MESSAGE);
    }
    Ok(Json(body))
}

async fn search_fuel(
    state: &AppState,
    params: &HashMap<String, String>,
) -> Result<Json<Value>, AppError> {
    let tipo_raw = require_param(params, "tipo")?;
    let tipo = tipo_raw
        .parse::<u8>()
        .ok()
        .and_then(FuelType::from_code)
        .ok_or_else(|| {
            AppError::Validation(format!(
                "parâmetro 'tipo' deve estar entre 1 e 4, recebido '{tipo_raw}'"
            ))
        })?;
    let raio = parse_raio(params)?;
    let center = parse_center(state, params);
    let local = spatial_key_for(state, center);

    let key = cache_key(
        "fuel",
        &[
            ("local", local.clone()),
            ("tipo", tipo.code().to_string()),
            ("raio", raio.to_string()),
        ],
    );
    let payload = match state.search_cache.get(&key) {
        Some(cached) => cached,
        None => {
            let fresh = state
                .searcher
                .search_fuel(&FuelQuery {
                    local: local.clone(),
                    tipo,
                    raio,
                })
                .await?;
            state.search_cache.set(&key, fresh.clone());
            fresh
        }
    };

    let postos = normalized_list(&payload, "postos", center);
    let summary = resumo(&positive_prices(&postos));
    let vazio = postos.is_empty();

    let mut body = json!({
        "postos": postos,
        "tipo": tipo.label(),
        "resumo": summary,
        "geohash": local,
    });
    if vazio {
        body["mensagem"] = json!(EMPTY_MESSAGE);
    }
    Ok(Json(body))
}

fn check_rate_limit(state: &AppState, headers: &HeaderMap) -> Result<(), AppError> {
    let identity = headers
        .get("x-client-id")
        .and_then(|v| v.to_str().ok())
        .unwrap_or(ANONYMOUS_IDENTITY);
    if !state.rate_limiter.try_acquire(identity) {
        return Err(AppError::RateLimited);
    }
    Ok(())
}

fn require_param(params: &HashMap<String, String>, name: &str) -> Result<String, AppError> {
    params
        .get(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::Validation(format!("parâmetro '{name}' é obrigatório")))
}

fn parse_raio(params: &HashMap<String, String>) -> Result<u32, AppError> {
    match params.get("raio") {
        None => Ok(DEFAULT_RAIO_KM),
        Some(raw) => raw
            .trim()
            .parse::<u32>()
            .map(|r| r.clamp(MIN_RAIO_KM, MAX_RAIO_KM))
            .map_err(|_| {
                AppError::Validation(format!("parâmetro 'raio' inválido: '{raw}'"))
            }),
    }
}

fn parse_ordem(params: &HashMap<String, String>) -> Result<SearchOrder, AppError> {
    match params.get("ordem").map(String::as_str) {
        None | Some("preco") => Ok(SearchOrder::Preco),
        Some("distancia") => Ok(SearchOrder::Distancia),
        Some(other) => Err(AppError::Validation(format!(
            "parâmetro 'ordem' deve ser 'preco' ou 'distancia', recebido '{other}'"
        ))),
    }
}

/// Lat/lon are best-effort: absent or unparseable values fall back to the
/// configured reference point rather than failing the request.
fn parse_center(state: &AppState, params: &HashMap<String, String>) -> Coordenadas {
    let lat = params.get("lat").and_then(|v| v.trim().parse::<f64>().ok());
    let lon = params.get("lon").and_then(|v| v.trim().parse::<f64>().ok());
    match (lat, lon) {
        (Some(lat), Some(lon)) => Coordenadas { lat, lon },
        _ => default_center(state),
    }
}

fn default_center(state: &AppState) -> Coordenadas {
    Coordenadas {
        lat: state.config.default_lat,
        lon: state.config.default_lon,
    }
}

fn fallback_location(state: &AppState) -> (f64, f64) {
    (state.config.default_lat, state.config.default_lon)
}

fn spatial_key_for(state: &AppState, center: Coordenadas) -> String {
    geo::spatial_key(
        center.lat,
        center.lon,
        geo::DEFAULT_PRECISION,
        fallback_location(state),
    )
}

fn normalized_list(payload: &Value, field: &str, center: Coordenadas) -> Vec<CanonicalRecord> {
    let raw_list = payload
        .get(field)
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    normalize_all(&raw_list, Some(center), Utc::now())
}

fn sort_records(records: &mut [CanonicalRecord], ordem: SearchOrder) {
    match ordem {
        SearchOrder::Preco => records.sort_by(|a, b| {
            // Records without a valid price sink to the end.
            price_sort_key(a)
                .partial_cmp(&price_sort_key(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        }),
        SearchOrder::Distancia => records.sort_by(|a, b| {
            distance_sort_key(a)
                .partial_cmp(&distance_sort_key(b))
                .unwrap_or(std::cmp::Ordering::Equal)
        }),
    }
}

fn price_sort_key(record: &CanonicalRecord) -> (u8, f64) {
    if record.has_valid_price() {
        (0, record.preco)
    } else {
        (1, 0.0)
    }
}

fn distance_sort_key(record: &CanonicalRecord) -> (u8, f64) {
    match record.distancia {
        Some(d) => (0, d),
        None => (1, 0.0),
    }
}
