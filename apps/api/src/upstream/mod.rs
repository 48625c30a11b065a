//! Upstream pricing API client — the single point of contact with the
//! third-party price-comparison service.
//!
//! Every request is timeout-bounded and retried a fixed number of times
//! with exponential backoff. The client knows nothing about caching or
//! rate limiting; those wrap it from the outside.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

const REQUEST_TIMEOUT_SECS: u64 = 30;
/// One initial attempt plus two retries.
const MAX_ATTEMPTS: u32 = 3;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("upstream returned status {status}: {message}")]
    Api { status: u16, message: String },
}

/// Result ordering accepted by the upstream product search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOrder {
    Preco,
    Distancia,
}

impl SearchOrder {
    pub fn as_flag(self) -> &'static str {
        match self {
            SearchOrder::Preco => "0",
            SearchOrder::Distancia => "1",
        }
    }
}

/// Fuel kinds exposed by the upstream fuel endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FuelType {
    Etanol,
    Gasolina,
    Diesel,
    Gnv,
}

impl FuelType {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(FuelType::Etanol),
            2 => Some(FuelType::Gasolina),
            3 => Some(FuelType::Diesel),
            4 => Some(FuelType::Gnv),
            _ => None,
        }
    }

    pub fn code(self) -> u8 {
        match self {
            FuelType::Etanol => 1,
            FuelType::Gasolina => 2,
            FuelType::Diesel => 3,
            FuelType::Gnv => 4,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            FuelType::Etanol => "etanol",
            FuelType::Gasolina => "gasolina",
            FuelType::Diesel => "diesel",
            FuelType::Gnv => "gnv",
        }
    }
}

/// Parameters for a product search: spatial key, free-text term, radius in
/// km and ordering, plus an optional upstream category filter.
#[derive(Debug, Clone)]
pub struct ProductQuery {
    pub local: String,
    pub termo: String,
    pub raio: u32,
    pub ordem: SearchOrder,
    pub categoria: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CategoryQuery {
    pub local: String,
    pub termo: String,
    pub raio: u32,
}

#[derive(Debug, Clone)]
pub struct FuelQuery {
    pub local: String,
    pub tipo: FuelType,
    pub raio: u32,
}

/// Seam between the aggregation pipeline and the wire. The production
/// implementation is [`PriceApiClient`]; tests substitute deterministic
/// fakes, including always-failing ones.
#[async_trait]
pub trait ProductSearcher: Send + Sync {
    async fn search_products(&self, query: &ProductQuery) -> Result<Value, UpstreamError>;
    async fn search_categories(&self, query: &CategoryQuery) -> Result<Value, UpstreamError>;
    async fn search_fuel(&self, query: &FuelQuery) -> Result<Value, UpstreamError>;
}

/// Reqwest-backed client for the public pricing API.
#[derive(Clone)]
pub struct PriceApiClient {
    http: Client,
    base_url: String,
}

impl PriceApiClient {
    pub fn new(base_url: String) -> Self {
        Self {
            http: Client::builder()
                .timeout(std::time::Duration::from_secs(REQUEST_TIMEOUT_SECS))
                .build()
                .expect("Failed to build HTTP client"),
            base_url,
        }
    }

    /// Issues one GET with bounded retries. Any non-2xx status, network
    /// error or timeout counts as a failed attempt; after the last attempt
    /// the final error is surfaced. A 2xx with an empty result set is a
    /// valid response and is never retried.
    async fn fetch_json(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<Value, UpstreamError> {
        let url = format!("{}/{path}", self.base_url.trim_end_matches('/'));
        let mut last_error: Option<UpstreamError> = None;

        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                // Backoff: 1s, then 2s between attempts.
                let delay = std::time::Duration::from_secs(1 << (attempt - 1));
                warn!(
                    "upstream call to {path} failed (attempt {attempt}), retrying in {}s",
                    delay.as_secs()
                );
                tokio::time::sleep(delay).await;
            }

            let response = match self.http.get(&url).query(params).send().await {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(UpstreamError::Http(e));
                    continue;
                }
            };

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                last_error = Some(UpstreamError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            match response.json::<Value>().await {
                Ok(payload) => {
                    debug!("upstream call to {path} succeeded on attempt {attempt}");
                    return Ok(payload);
                }
                Err(e) => {
                    last_error = Some(UpstreamError::Http(e));
                    continue;
                }
            }
        }

        Err(last_error.unwrap_or(UpstreamError::Api {
            status: 0,
            message: "upstream retries exhausted".to_string(),
        }))
    }
}

#[async_trait]
impl ProductSearcher for PriceApiClient {
    async fn search_products(&self, query: &ProductQuery) -> Result<Value, UpstreamError> {
        let mut params = vec![
            ("local", query.local.clone()),
            ("termo", query.termo.clone()),
            ("raio", query.raio.to_string()),
            ("ordem", query.ordem.as_flag().to_string()),
        ];
        if let Some(categoria) = &query.categoria {
            params.push(("categoria", categoria.clone()));
        }
        self.fetch_json("produtos", &params).await
    }

    async fn search_categories(&self, query: &CategoryQuery) -> Result<Value, UpstreamError> {
        let params = vec![
            ("local", query.local.clone()),
            ("termo", query.termo.clone()),
            ("raio", query.raio.to_string()),
        ];
        self.fetch_json("categorias", &params).await
    }

    async fn search_fuel(&self, query: &FuelQuery) -> Result<Value, UpstreamError> {
        let params = vec![
            ("local", query.local.clone()),
            ("tipo", query.tipo.code().to_string()),
            ("raio", query.raio.to_string()),
        ];
        self.fetch_json("combustiveis", &params).await
    }
}
