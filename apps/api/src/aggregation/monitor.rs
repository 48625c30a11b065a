//! Per-product monitoring pass: one upstream round trip per monitored
//! product, joined against the user's own price.
//!
//! Products are fetched concurrently and joined settle-all: every product
//! yields a result, a failed fetch yields a degraded placeholder instead of
//! poisoning its siblings. The caller-visible list preserves input product
//! order regardless of completion order.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::aggregation::metrics::{
    classify_status, compute_trend, positive_prices, resumo, volatility, PriceStatus, Resumo,
    Trend,
};
use crate::cache::{cache_key, ResponseCache};
use crate::errors::AppError;
use crate::geo;
use crate::models::observation::NewObservation;
use crate::models::product::Product;
use crate::normalize::{normalize_all, CanonicalRecord, Coordenadas};
use crate::persistence::{CompetitorDetails, PriceRepository};
use crate::upstream::{ProductQuery, ProductSearcher, SearchOrder};

/// Source tag stamped on observations created by this pass.
const OBSERVATION_SOURCE: &str = "api_precos";

/// One competitor's price for one product, as shown to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompetitorPrice {
    pub nome: String,
    pub preco: f64,
    pub distancia: Option<f64>,
    pub atualizado: String,
}

/// Monitoring outcome for one product. `degradado` marks a placeholder
/// produced after the product's fetch failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductMonitorResult {
    pub product_id: Uuid,
    pub nome: String,
    pub preco_proprio: Option<f64>,
    pub resumo: Resumo,
    pub volatilidade: f64,
    pub status: PriceStatus,
    pub tendencia: Trend,
    pub variacao: f64,
    pub concorrentes: Vec<CompetitorPrice>,
    pub degradado: bool,
}

pub struct MonitorEngine {
    searcher: Arc<dyn ProductSearcher>,
    cache: Arc<ResponseCache>,
    repo: Arc<dyn PriceRepository>,
    fallback_location: (f64, f64),
}

impl MonitorEngine {
    pub fn new(
        searcher: Arc<dyn ProductSearcher>,
        cache: Arc<ResponseCache>,
        repo: Arc<dyn PriceRepository>,
        fallback_location: (f64, f64),
    ) -> Self {
        Self {
            searcher,
            cache,
            repo,
            fallback_location,
        }
    }

    /// Runs one monitoring pass over `products` around `center`. Always
    /// returns exactly one result per input product, in input order.
    pub async fn run(
        &self,
        user_id: Uuid,
        products: &[Product],
        center: Coordenadas,
        raio: u32,
    ) -> Vec<ProductMonitorResult> {
        let outcomes = join_all(
            products
                .iter()
                .map(|product| self.monitor_one(user_id, product, center, raio)),
        )
        .await;

        outcomes
            .into_iter()
            .zip(products)
            .map(|(outcome, product)| match outcome {
                Ok(result) => result,
                Err(e) => {
                    warn!("monitoramento de '{}' falhou: {e}", product.nome);
                    degraded_result(product)
                }
            })
            .collect()
    }

    async fn monitor_one(
        &self,
        user_id: Uuid,
        product: &Product,
        center: Coordenadas,
        raio: u32,
    ) -> Result<ProductMonitorResult, AppError> {
        let local = geo::spatial_key(
            center.lat,
            center.lon,
            geo::DEFAULT_PRECISION,
            self.fallback_location,
        );

        let key = cache_key(
            "products",
            &[
                ("local", local.clone()),
                ("termo", product.nome.clone()),
                ("raio", raio.to_string()),
                ("ordem", SearchOrder::Preco.as_flag().to_string()),
            ],
        );

        let payload = match self.cache.get(&key) {
            Some(cached) => cached,
            None => {
                let fresh = self
                    .searcher
                    .search_products(&ProductQuery {
                        local,
                        termo: product.nome.clone(),
                        raio,
                        ordem: SearchOrder::Preco,
                        categoria: None,
                    })
                    .await?;
                self.cache.set(&key, fresh.clone());
                fresh
            }
        };

        let now = Utc::now();
        let raw_list = payload
            .get("produtos")
            .and_then(|v| v.as_array())
            .cloned()
            .unwrap_or_default();
        let records = normalize_all(&raw_list, Some(center), now);

        let distinct = distinct_by_establishment(&records);
        self.persist_observations(user_id, product.id, &distinct).await;

        let prices = positive_prices(&records);
        let summary = resumo(&prices);
        let volatilidade = volatility(&summary);
        let status = classify_status(product.preco_proprio, summary.media, summary.maior);
        let (tendencia, variacao) = compute_trend(product.preco_proprio, summary.media);

        Ok(ProductMonitorResult {
            product_id: product.id,
            nome: product.nome.clone(),
            preco_proprio: product.preco_proprio,
            resumo: summary,
            volatilidade,
            status,
            tendencia,
            variacao,
            concorrentes: distinct
                .iter()
                .map(|r| CompetitorPrice {
                    nome: r.estabelecimento.nome.clone(),
                    preco: r.preco,
                    distancia: r.distancia,
                    atualizado: r.atualizado.clone(),
                })
                .collect(),
            degradado: false,
        })
    }

    /// Appends one observation per distinct competitor, lazily creating
    /// registry rows on first sight of a name. Write failures are logged
    /// and skipped per item: the user-facing comparison must succeed even
    /// when background persistence partially fails.
    async fn persist_observations(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        records: &[CanonicalRecord],
    ) {
        let now = Utc::now();
        for record in records {
            let nome = &record.estabelecimento.nome;
            let details = CompetitorDetails {
                cnpj: record.estabelecimento.cnpj.clone(),
                endereco: record.estabelecimento.endereco.clone(),
                lat: record.coordenadas.map(|c| c.lat),
                lon: record.coordenadas.map(|c| c.lon),
            };

            let competitor = match self.repo.find_or_create_competitor(user_id, nome, &details).await
            {
                Ok(c) => c,
                Err(e) => {
                    warn!("registro do concorrente '{nome}' falhou: {e}");
                    continue;
                }
            };

            let obs = NewObservation {
                competitor_id: competitor.id,
                product_id,
                preco: record.preco,
                coletado_em: record.coletado_em.unwrap_or(now),
                fonte: OBSERVATION_SOURCE.to_string(),
                disponivel: record.has_valid_price(),
            };
            if let Err(e) = self.repo.insert_observation(&obs).await {
                warn!("observação de preço de '{nome}' não gravada: {e}");
            }
        }
    }
}

/// First record per distinct establishment name; empty names are skipped
/// (no identity to register).
fn distinct_by_establishment(records: &[CanonicalRecord]) -> Vec<CanonicalRecord> {
    let mut seen = HashSet::new();
    records
        .iter()
        .filter(|r| {
            let nome = r.estabelecimento.nome.trim();
            !nome.is_empty() && seen.insert(nome.to_string())
        })
        .cloned()
        .collect()
}

fn degraded_result(product: &Product) -> ProductMonitorResult {
    ProductMonitorResult {
        product_id: product.id,
        nome: product.nome.clone(),
        preco_proprio: product.preco_proprio,
        resumo: Resumo::empty(),
        volatilidade: 0.0,
        status: PriceStatus::NoPrice,
        tendencia: Trend::Neutral,
        variacao: 0.0,
        concorrentes: Vec::new(),
        degradado: true,
    }
}
