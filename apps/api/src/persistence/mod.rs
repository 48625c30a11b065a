//! Persistence adapter boundary. The pipeline consumes a record-oriented
//! repository; any store with equivalent read/write/filter capability
//! suffices. Production uses [`postgres::PgPriceRepository`]; tests use the
//! in-memory double in [`memory`].

pub mod postgres;

#[cfg(test)]
pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::competitor::Competitor;
use crate::models::observation::NewObservation;
use crate::models::product::Product;
use crate::models::profile::SearchProfile;

/// Establishment details observed alongside a price, used to enrich a
/// lazily created competitor row.
#[derive(Debug, Clone, Default)]
pub struct CompetitorDetails {
    pub cnpj: Option<String>,
    pub endereco: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
}

/// Per-competitor aggregates over the scoring window.
#[derive(Debug, Clone, FromRow)]
pub struct CompetitorWindowStats {
    pub competitor_id: Uuid,
    pub nome: String,
    pub media: Option<f64>,
    pub dias_ativos: i64,
}

/// Per-product price aggregates over the volatility window.
#[derive(Debug, Clone, FromRow)]
pub struct ProductWindowStats {
    pub product_id: Uuid,
    pub nome: String,
    pub preco_proprio: Option<f64>,
    pub menor: Option<f64>,
    pub maior: Option<f64>,
    pub media: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct DashboardKpis {
    pub produtos_monitorados: i64,
    pub concorrentes: i64,
    pub observacoes_janela: i64,
}

impl DashboardKpis {
    pub fn zeroed() -> Self {
        Self {
            produtos_monitorados: 0,
            concorrentes: 0,
            observacoes_janela: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrendPoint {
    pub dia: NaiveDate,
    pub media_mercado: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InsightRow {
    pub id: Uuid,
    pub texto: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RankedCompetitor {
    pub id: Uuid,
    pub nome: String,
    pub pontuacao: f64,
    pub ranking: i32,
}

/// Record-oriented storage operations the pipeline depends on.
///
/// Competitor identity resolution lives entirely behind
/// [`find_or_create_competitor`](PriceRepository::find_or_create_competitor):
/// today it matches on exact name within one user's set, and a stronger
/// (name, address)- or tax-id-keyed matcher can replace it without touching
/// the aggregation code.
#[async_trait]
pub trait PriceRepository: Send + Sync {
    async fn list_products(&self, user_id: Uuid) -> Result<Vec<Product>, AppError>;

    async fn products_by_ids(
        &self,
        user_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<Product>, AppError>;

    async fn find_or_create_competitor(
        &self,
        user_id: Uuid,
        nome: &str,
        details: &CompetitorDetails,
    ) -> Result<Competitor, AppError>;

    async fn insert_observation(&self, obs: &NewObservation) -> Result<(), AppError>;

    async fn competitor_window_stats(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<CompetitorWindowStats>, AppError>;

    async fn market_average(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Option<f64>, AppError>;

    async fn save_score(
        &self,
        competitor_id: Uuid,
        pontuacao: f64,
        ranking: i32,
    ) -> Result<(), AppError>;

    async fn activate_profile(&self, user_id: Uuid, profile_id: Uuid) -> Result<(), AppError>;

    async fn active_profile(&self, user_id: Uuid) -> Result<Option<SearchProfile>, AppError>;

    async fn kpis(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<DashboardKpis, AppError>;

    async fn product_window_stats(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<ProductWindowStats>, AppError>;

    async fn top_competitors(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<RankedCompetitor>, AppError>;

    async fn daily_market_averages(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<TrendPoint>, AppError>;

    async fn recent_insights(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<InsightRow>, AppError>;
}
