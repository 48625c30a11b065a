//! In-memory [`PriceRepository`] double for pipeline tests. Mirrors the
//! storage semantics the Postgres implementation promises, including the
//! transactional single-active-profile invariant.

use std::collections::BTreeSet;
use std::sync::Mutex;

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::competitor::Competitor;
use crate::models::observation::{NewObservation, PriceObservation};
use crate::models::product::Product;
use crate::models::profile::{SearchProfile, ORIGEM_GPS};

use super::{
    CompetitorDetails, CompetitorWindowStats, DashboardKpis, InsightRow, PriceRepository,
    ProductWindowStats, RankedCompetitor, TrendPoint,
};

#[derive(Default)]
struct MemoryState {
    products: Vec<Product>,
    competitors: Vec<Competitor>,
    observations: Vec<PriceObservation>,
    profiles: Vec<SearchProfile>,
    insights: Vec<(Uuid, InsightRow)>,
    fail_observation_inserts: bool,
    fail_dashboard_queries: bool,
}

#[derive(Default)]
pub struct MemoryRepository {
    state: Mutex<MemoryState>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_product(&self, user_id: Uuid, nome: &str, preco_proprio: Option<f64>) -> Product {
        let product = Product {
            id: Uuid::new_v4(),
            user_id,
            nome: nome.to_string(),
            principio_ativo: None,
            categoria_id: None,
            preco_proprio,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.state.lock().unwrap().products.push(product.clone());
        product
    }

    pub fn add_competitor(&self, user_id: Uuid, nome: &str, propria: bool) -> Competitor {
        let competitor = Competitor {
            id: Uuid::new_v4(),
            user_id,
            nome: nome.to_string(),
            cnpj: None,
            endereco: None,
            lat: None,
            lon: None,
            propria,
            pontuacao: None,
            ranking: None,
            created_at: Utc::now(),
        };
        self.state.lock().unwrap().competitors.push(competitor.clone());
        competitor
    }

    pub fn add_profile(
        &self,
        user_id: Uuid,
        nome: &str,
        ativo: bool,
        lat: f64,
        lon: f64,
        raio_km: i32,
    ) -> SearchProfile {
        let profile = SearchProfile {
            id: Uuid::new_v4(),
            user_id,
            nome: nome.to_string(),
            origem: ORIGEM_GPS.to_string(),
            lat,
            lon,
            raio_km,
            ativo,
            created_at: Utc::now(),
        };
        self.state.lock().unwrap().profiles.push(profile.clone());
        profile
    }

    pub fn add_observation(
        &self,
        competitor_id: Uuid,
        product_id: Uuid,
        preco: f64,
        coletado_em: DateTime<Utc>,
    ) {
        self.state.lock().unwrap().observations.push(PriceObservation {
            id: Uuid::new_v4(),
            competitor_id,
            product_id,
            preco,
            coletado_em,
            fonte: "teste".to_string(),
            disponivel: true,
        });
    }

    pub fn add_insight(&self, user_id: Uuid, texto: &str) {
        self.state.lock().unwrap().insights.push((
            user_id,
            InsightRow {
                id: Uuid::new_v4(),
                texto: texto.to_string(),
                created_at: Utc::now(),
            },
        ));
    }

    pub fn set_fail_observation_inserts(&self, fail: bool) {
        self.state.lock().unwrap().fail_observation_inserts = fail;
    }

    pub fn set_fail_dashboard_queries(&self, fail: bool) {
        self.state.lock().unwrap().fail_dashboard_queries = fail;
    }

    pub fn observations(&self) -> Vec<PriceObservation> {
        self.state.lock().unwrap().observations.clone()
    }

    pub fn competitors(&self) -> Vec<Competitor> {
        self.state.lock().unwrap().competitors.clone()
    }

    pub fn profiles(&self) -> Vec<SearchProfile> {
        self.state.lock().unwrap().profiles.clone()
    }
}

#[async_trait]
impl PriceRepository for MemoryRepository {
    async fn list_products(&self, user_id: Uuid) -> Result<Vec<Product>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .products
            .iter()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn products_by_ids(
        &self,
        user_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<Product>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .products
            .iter()
            .filter(|p| p.user_id == user_id && ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn find_or_create_competitor(
        &self,
        user_id: Uuid,
        nome: &str,
        details: &CompetitorDetails,
    ) -> Result<Competitor, AppError> {
        let mut state = self.state.lock().unwrap();
        if let Some(existing) = state
            .competitors
            .iter()
            .find(|c| c.user_id == user_id && c.nome == nome)
        {
            return Ok(existing.clone());
        }

        let competitor = Competitor {
            id: Uuid::new_v4(),
            user_id,
            nome: nome.to_string(),
            cnpj: details.cnpj.clone(),
            endereco: details.endereco.clone(),
            lat: details.lat,
            lon: details.lon,
            propria: false,
            pontuacao: None,
            ranking: None,
            created_at: Utc::now(),
        };
        state.competitors.push(competitor.clone());
        Ok(competitor)
    }

    async fn insert_observation(&self, obs: &NewObservation) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_observation_inserts {
            return Err(AppError::Internal(anyhow!("insert de observação simulando falha")));
        }
        state.observations.push(PriceObservation {
            id: Uuid::new_v4(),
            competitor_id: obs.competitor_id,
            product_id: obs.product_id,
            preco: obs.preco,
            coletado_em: obs.coletado_em,
            fonte: obs.fonte.clone(),
            disponivel: obs.disponivel,
        });
        Ok(())
    }

    async fn competitor_window_stats(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<CompetitorWindowStats>, AppError> {
        let state = self.state.lock().unwrap();
        let stats = state
            .competitors
            .iter()
            .filter(|c| c.user_id == user_id && !c.propria)
            .map(|c| {
                let obs: Vec<&PriceObservation> = state
                    .observations
                    .iter()
                    .filter(|o| o.competitor_id == c.id && o.coletado_em >= since)
                    .collect();
                let positivos: Vec<f64> =
                    obs.iter().filter(|o| o.preco > 0.0).map(|o| o.preco).collect();
                let media = if positivos.is_empty() {
                    None
                } else {
                    Some(positivos.iter().sum::<f64>() / positivos.len() as f64)
                };
                let dias: BTreeSet<_> = obs.iter().map(|o| o.coletado_em.date_naive()).collect();
                CompetitorWindowStats {
                    competitor_id: c.id,
                    nome: c.nome.clone(),
                    media,
                    dias_ativos: dias.len() as i64,
                }
            })
            .collect();
        Ok(stats)
    }

    async fn market_average(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Option<f64>, AppError> {
        let state = self.state.lock().unwrap();
        let competitor_ids: Vec<Uuid> = state
            .competitors
            .iter()
            .filter(|c| c.user_id == user_id && !c.propria)
            .map(|c| c.id)
            .collect();
        let precos: Vec<f64> = state
            .observations
            .iter()
            .filter(|o| {
                competitor_ids.contains(&o.competitor_id)
                    && o.preco > 0.0
                    && o.coletado_em >= since
            })
            .map(|o| o.preco)
            .collect();
        if precos.is_empty() {
            return Ok(None);
        }
        Ok(Some(precos.iter().sum::<f64>() / precos.len() as f64))
    }

    async fn save_score(
        &self,
        competitor_id: Uuid,
        pontuacao: f64,
        ranking: i32,
    ) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        if let Some(c) = state.competitors.iter_mut().find(|c| c.id == competitor_id) {
            c.pontuacao = Some(pontuacao);
            c.ranking = Some(ranking);
        }
        Ok(())
    }

    async fn activate_profile(&self, user_id: Uuid, profile_id: Uuid) -> Result<(), AppError> {
        let mut state = self.state.lock().unwrap();
        if !state
            .profiles
            .iter()
            .any(|p| p.id == profile_id && p.user_id == user_id)
        {
            return Err(AppError::NotFound(format!("Perfil {profile_id} não encontrado")));
        }
        for profile in state.profiles.iter_mut().filter(|p| p.user_id == user_id) {
            profile.ativo = profile.id == profile_id;
        }
        Ok(())
    }

    async fn active_profile(&self, user_id: Uuid) -> Result<Option<SearchProfile>, AppError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .profiles
            .iter()
            .find(|p| p.user_id == user_id && p.ativo)
            .cloned())
    }

    async fn kpis(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<DashboardKpis, AppError> {
        let state = self.state.lock().unwrap();
        if state.fail_dashboard_queries {
            return Err(AppError::Internal(anyhow!("consulta de KPI simulando falha")));
        }
        let competitor_ids: Vec<Uuid> = state
            .competitors
            .iter()
            .filter(|c| c.user_id == user_id)
            .map(|c| c.id)
            .collect();
        Ok(DashboardKpis {
            produtos_monitorados: state
                .products
                .iter()
                .filter(|p| p.user_id == user_id)
                .count() as i64,
            concorrentes: state
                .competitors
                .iter()
                .filter(|c| c.user_id == user_id && !c.propria)
                .count() as i64,
            observacoes_janela: state
                .observations
                .iter()
                .filter(|o| competitor_ids.contains(&o.competitor_id) && o.coletado_em >= since)
                .count() as i64,
        })
    }

    async fn product_window_stats(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<ProductWindowStats>, AppError> {
        let state = self.state.lock().unwrap();
        if state.fail_dashboard_queries {
            return Err(AppError::Internal(anyhow!("consulta de produtos simulando falha")));
        }
        let stats = state
            .products
            .iter()
            .filter(|p| p.user_id == user_id)
            .map(|p| {
                let precos: Vec<f64> = state
                    .observations
                    .iter()
                    .filter(|o| o.product_id == p.id && o.preco > 0.0 && o.coletado_em >= since)
                    .map(|o| o.preco)
                    .collect();
                let (menor, maior, media) = if precos.is_empty() {
                    (None, None, None)
                } else {
                    (
                        Some(precos.iter().copied().fold(f64::INFINITY, f64::min)),
                        Some(precos.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
                        Some(precos.iter().sum::<f64>() / precos.len() as f64),
                    )
                };
                ProductWindowStats {
                    product_id: p.id,
                    nome: p.nome.clone(),
                    preco_proprio: p.preco_proprio,
                    menor,
                    maior,
                    media,
                }
            })
            .collect();
        Ok(stats)
    }

    async fn top_competitors(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<RankedCompetitor>, AppError> {
        let state = self.state.lock().unwrap();
        if state.fail_dashboard_queries {
            return Err(AppError::Internal(anyhow!("consulta de ranking simulando falha")));
        }
        let mut ranked: Vec<RankedCompetitor> = state
            .competitors
            .iter()
            .filter(|c| c.user_id == user_id && !c.propria)
            .filter_map(|c| {
                Some(RankedCompetitor {
                    id: c.id,
                    nome: c.nome.clone(),
                    pontuacao: c.pontuacao?,
                    ranking: c.ranking?,
                })
            })
            .collect();
        ranked.sort_by_key(|c| c.ranking);
        ranked.truncate(limit as usize);
        Ok(ranked)
    }

    async fn daily_market_averages(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<TrendPoint>, AppError> {
        let state = self.state.lock().unwrap();
        if state.fail_dashboard_queries {
            return Err(AppError::Internal(anyhow!("consulta de tendência simulando falha")));
        }
        let competitor_ids: Vec<Uuid> = state
            .competitors
            .iter()
            .filter(|c| c.user_id == user_id)
            .map(|c| c.id)
            .collect();
        let mut by_day: std::collections::BTreeMap<chrono::NaiveDate, Vec<f64>> =
            std::collections::BTreeMap::new();
        for obs in state.observations.iter().filter(|o| {
            competitor_ids.contains(&o.competitor_id) && o.preco > 0.0 && o.coletado_em >= since
        }) {
            by_day.entry(obs.coletado_em.date_naive()).or_default().push(obs.preco);
        }
        Ok(by_day
            .into_iter()
            .map(|(dia, precos)| TrendPoint {
                dia,
                media_mercado: precos.iter().sum::<f64>() / precos.len() as f64,
            })
            .collect())
    }

    async fn recent_insights(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<InsightRow>, AppError> {
        let state = self.state.lock().unwrap();
        if state.fail_dashboard_queries {
            return Err(AppError::Internal(anyhow!("consulta de insights simulando falha")));
        }
        let mut insights: Vec<InsightRow> = state
            .insights
            .iter()
            .filter(|(uid, _)| *uid == user_id)
            .map(|(_, row)| row.clone())
            .collect();
        insights.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        insights.truncate(limit as usize);
        Ok(insights)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_activation_leaves_exactly_one_active_profile() {
        let repo = MemoryRepository::new();
        let user_id = Uuid::new_v4();
        let a = repo.add_profile(user_id, "Perfil A", true, -25.4, -49.2, 10);
        let b = repo.add_profile(user_id, "Perfil B", false, -23.5, -46.6, 20);

        repo.activate_profile(user_id, b.id).await.unwrap();

        let ativos: Vec<_> = repo.profiles().into_iter().filter(|p| p.ativo).collect();
        assert_eq!(ativos.len(), 1);
        assert_eq!(ativos[0].id, b.id);
        assert!(!repo.profiles().iter().find(|p| p.id == a.id).unwrap().ativo);
    }

    #[tokio::test]
    async fn test_activation_of_unknown_profile_changes_nothing() {
        let repo = MemoryRepository::new();
        let user_id = Uuid::new_v4();
        let a = repo.add_profile(user_id, "Perfil A", true, -25.4, -49.2, 10);

        let result = repo.activate_profile(user_id, Uuid::new_v4()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));

        let active = repo.active_profile(user_id).await.unwrap().unwrap();
        assert_eq!(active.id, a.id);
    }

    #[tokio::test]
    async fn test_competitor_names_are_isolated_per_user() {
        let repo = MemoryRepository::new();
        let user_a = Uuid::new_v4();
        let user_b = Uuid::new_v4();
        let details = CompetitorDetails::default();

        let first = repo
            .find_or_create_competitor(user_a, "Drogasil", &details)
            .await
            .unwrap();
        let second = repo
            .find_or_create_competitor(user_b, "Drogasil", &details)
            .await
            .unwrap();
        let repeat = repo
            .find_or_create_competitor(user_a, "Drogasil", &details)
            .await
            .unwrap();

        // Same name under two users is two rows; under one user it is one.
        assert_ne!(first.id, second.id);
        assert_eq!(first.id, repeat.id);
    }
}
