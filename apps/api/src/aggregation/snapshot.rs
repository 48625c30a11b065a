//! Multi-term snapshot: fetches several search terms around one point and
//! regroups the combined results by establishment, so the user sees each
//! nearby pharmacy's basket at a glance.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::aggregation::metrics::round2;
use crate::cache::{cache_key, ResponseCache};
use crate::errors::AppError;
use crate::geo;
use crate::normalize::{normalize_all, CanonicalRecord, Coordenadas, Estabelecimento};
use crate::upstream::{ProductQuery, ProductSearcher, SearchOrder};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotItem {
    pub termo: String,
    pub descricao: String,
    pub preco: f64,
    pub atualizado: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EstablishmentSnapshot {
    pub estabelecimento: Estabelecimento,
    pub distancia: Option<f64>,
    pub itens: Vec<SnapshotItem>,
    pub total_itens: usize,
    pub media: Option<f64>,
}

/// Fetches every term concurrently (settle-all: a failed term contributes
/// nothing and is logged, it never fails the snapshot) and groups the
/// flattened records by establishment name, ordered by name.
pub async fn build_snapshot(
    searcher: &Arc<dyn ProductSearcher>,
    cache: &ResponseCache,
    termos: &[String],
    center: Coordenadas,
    raio: u32,
    fallback: (f64, f64),
) -> Vec<EstablishmentSnapshot> {
    let local = geo::spatial_key(center.lat, center.lon, geo::DEFAULT_PRECISION, fallback);

    let fetches = join_all(termos.iter().map(|termo| {
        let local = local.clone();
        async move {
            fetch_term(searcher, cache, &local, termo, center, raio)
                .await
                .map(|records| (termo.clone(), records))
        }
    }))
    .await;

    let mut grouped: BTreeMap<String, EstablishmentSnapshot> = BTreeMap::new();

    for outcome in fetches {
        let (termo, records) = match outcome {
            Ok(pair) => pair,
            Err(e) => {
                warn!("termo do snapshot falhou: {e}");
                continue;
            }
        };

        for record in records {
            let nome = record.estabelecimento.nome.trim().to_string();
            if nome.is_empty() {
                continue;
            }
            let entry = grouped
                .entry(nome)
                .or_insert_with(|| EstablishmentSnapshot {
                    estabelecimento: record.estabelecimento.clone(),
                    distancia: record.distancia,
                    itens: Vec::new(),
                    total_itens: 0,
                    media: None,
                });
            entry.itens.push(SnapshotItem {
                termo: termo.clone(),
                descricao: record.descricao.clone(),
                preco: record.preco,
                atualizado: record.atualizado.clone(),
            });
        }
    }

    grouped
        .into_values()
        .map(|mut snapshot| {
            snapshot.total_itens = snapshot.itens.len();
            let positivos: Vec<f64> = snapshot
                .itens
                .iter()
                .map(|i| i.preco)
                .filter(|p| *p > 0.0)
                .collect();
            snapshot.media = if positivos.is_empty() {
                None
            } else {
                Some(round2(positivos.iter().sum::<f64>() / positivos.len() as f64))
            };
            snapshot
        })
        .collect()
}

async fn fetch_term(
    searcher: &Arc<dyn ProductSearcher>,
    cache: &ResponseCache,
    local: &str,
    termo: &str,
    center: Coordenadas,
    raio: u32,
) -> Result<Vec<CanonicalRecord>, AppError> {
    let key = cache_key(
        "products",
        &[
            ("local", local.to_string()),
            ("termo", termo.to_string()),
            ("raio", raio.to_string()),
            ("ordem", SearchOrder::Preco.as_flag().to_string()),
        ],
    );

    let payload = match cache.get(&key) {
        Some(cached) => cached,
        None => {
            let fresh = searcher
                .search_products(&ProductQuery {
                    local: local.to_string(),
                    termo: termo.to_string(),
                    raio,
                    ordem: SearchOrder::Preco,
                    categoria: None,
                })
                .await?;
            cache.set(&key, fresh.clone());
            fresh
        }
    };

    let raw_list = payload
        .get("produtos")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    Ok(normalize_all(&raw_list, Some(center), Utc::now()))
}
