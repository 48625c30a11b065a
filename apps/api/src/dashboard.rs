//! Dashboard summary builder: fans out the independent dashboard queries,
//! joins them into one response object and caches the joined result under
//! the short-TTL dashboard policy.
//!
//! Absence of data is a normal empty state: any leg that fails or returns
//! no rows is replaced by its zero/empty default, never surfaced as an
//! error.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::aggregation::metrics::{self, Resumo};
use crate::cache::{cache_key, ResponseCache};
use crate::persistence::{
    DashboardKpis, InsightRow, PriceRepository, RankedCompetitor, TrendPoint,
};

const TOP_VOLATILE: usize = 5;
const TOP_COMPETITORS: i64 = 5;
const RECENT_INSIGHTS: i64 = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolatileProduct {
    pub product_id: Uuid,
    pub nome: String,
    pub volatilidade: f64,
    pub media: Option<f64>,
    pub preco_proprio: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardSummary {
    pub kpis: DashboardKpis,
    pub mais_volateis: Vec<VolatileProduct>,
    pub top_concorrentes: Vec<RankedCompetitor>,
    pub tendencia: Vec<TrendPoint>,
    pub insights: Vec<InsightRow>,
}

pub struct DashboardBuilder {
    repo: Arc<dyn PriceRepository>,
    cache: Arc<ResponseCache>,
    window_days: i64,
}

impl DashboardBuilder {
    pub fn new(repo: Arc<dyn PriceRepository>, cache: Arc<ResponseCache>, window_days: i64) -> Self {
        Self {
            repo,
            cache,
            window_days,
        }
    }

    /// Builds the joined summary. `refresh` bypasses the cache read but
    /// still writes the fresh result through.
    pub async fn build(&self, user_id: Uuid, refresh: bool) -> DashboardSummary {
        let key = cache_key("dashboard", &[("user", user_id.to_string())]);

        if !refresh {
            if let Some(cached) = self.cache.get(&key) {
                if let Ok(summary) = serde_json::from_value::<DashboardSummary>(cached) {
                    return summary;
                }
            }
        }

        let since = Utc::now() - Duration::days(self.window_days);

        let (kpis, product_stats, top_concorrentes, tendencia, insights) = tokio::join!(
            self.repo.kpis(user_id, since),
            self.repo.product_window_stats(user_id, since),
            self.repo.top_competitors(user_id, TOP_COMPETITORS),
            self.repo.daily_market_averages(user_id, since),
            self.repo.recent_insights(user_id, RECENT_INSIGHTS),
        );

        let kpis = kpis.unwrap_or_else(|e| {
            warn!("consulta de KPIs falhou: {e}");
            DashboardKpis::zeroed()
        });
        let product_stats = product_stats.unwrap_or_else(|e| {
            warn!("estatísticas de produtos falharam: {e}");
            Vec::new()
        });
        let top_concorrentes = top_concorrentes.unwrap_or_else(|e| {
            warn!("ranking de concorrentes falhou: {e}");
            Vec::new()
        });
        let tendencia = tendencia.unwrap_or_else(|e| {
            warn!("série de tendência falhou: {e}");
            Vec::new()
        });
        let insights = insights.unwrap_or_else(|e| {
            warn!("insights recentes falharam: {e}");
            Vec::new()
        });

        let mut mais_volateis: Vec<VolatileProduct> = product_stats
            .into_iter()
            .filter(|s| s.media.is_some())
            .map(|s| {
                let resumo = Resumo {
                    quantidade: 0,
                    menor: s.menor,
                    maior: s.maior,
                    media: s.media,
                };
                VolatileProduct {
                    product_id: s.product_id,
                    nome: s.nome,
                    volatilidade: metrics::volatility(&resumo),
                    media: s.media.map(metrics::round2),
                    preco_proprio: s.preco_proprio,
                }
            })
            .collect();
        mais_volateis.sort_by(|a, b| {
            b.volatilidade
                .partial_cmp(&a.volatilidade)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        mais_volateis.truncate(TOP_VOLATILE);

        let summary = DashboardSummary {
            kpis,
            mais_volateis,
            top_concorrentes,
            tendencia,
            insights,
        };

        if let Ok(value) = serde_json::to_value(&summary) {
            self.cache.set(&key, value);
        }
        summary
    }
}
