//! Competitor aggressiveness scoring — a batch pass, decoupled from the
//! per-request monitoring pass because it scans each competitor's trailing
//! history and must not block interactive requests.
//!
//! Score: 50 baseline, plus up to 30 for pricing below the cross-product
//! market average, plus 2 per distinct day with at least one observation
//! in the window, clamped to [0, 100].

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::aggregation::metrics::round1;
use crate::errors::AppError;
use crate::persistence::PriceRepository;

const BASELINE: f64 = 50.0;
const BELOW_MARKET_WEIGHT: f64 = 30.0;
const ACTIVE_DAY_BONUS: f64 = 2.0;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredCompetitor {
    pub competitor_id: Uuid,
    pub nome: String,
    pub pontuacao: f64,
    pub ranking: i32,
}

/// 0–100 heuristic rating of one competitor's pricing and update behavior.
/// Being below market is rewarded proportionally; frequent updates are
/// rewarded per distinct active day.
pub fn aggressiveness_score(
    market_media: Option<f64>,
    competitor_media: Option<f64>,
    dias_ativos: i64,
) -> f64 {
    let mut score = BASELINE;

    if let (Some(market), Some(media)) = (market_media, competitor_media) {
        if market > 0.0 && media < market {
            score += (market - media) / market * BELOW_MARKET_WEIGHT;
        }
    }

    score += ACTIVE_DAY_BONUS * dias_ativos as f64;
    round1(score.clamp(0.0, 100.0))
}

/// Sorts by descending score and assigns sequential 1-based ranks. The sort
/// is stable, so ties keep their incoming order — deterministic, nothing
/// stronger promised.
fn rank(mut scored: Vec<ScoredCompetitor>) -> Vec<ScoredCompetitor> {
    scored.sort_by(|a, b| {
        b.pontuacao
            .partial_cmp(&a.pontuacao)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    for (i, competitor) in scored.iter_mut().enumerate() {
        competitor.ranking = i as i32 + 1;
    }
    scored
}

pub struct ScoringEngine {
    repo: Arc<dyn PriceRepository>,
    window_days: i64,
}

impl ScoringEngine {
    pub fn new(repo: Arc<dyn PriceRepository>, window_days: i64) -> Self {
        Self { repo, window_days }
    }

    /// Scores and ranks every non-own competitor of `user_id` over the
    /// trailing window, persisting the results on the registry rows.
    /// A failed save is logged and skipped; the computed list is still
    /// returned.
    pub async fn recompute(&self, user_id: Uuid) -> Result<Vec<ScoredCompetitor>, AppError> {
        let since = Utc::now() - Duration::days(self.window_days);

        let stats = self.repo.competitor_window_stats(user_id, since).await?;
        let market_media = self.repo.market_average(user_id, since).await?;

        let scored = rank(
            stats
                .into_iter()
                .map(|s| ScoredCompetitor {
                    competitor_id: s.competitor_id,
                    nome: s.nome,
                    pontuacao: aggressiveness_score(market_media, s.media, s.dias_ativos),
                    ranking: 0,
                })
                .collect(),
        );

        for competitor in &scored {
            if let Err(e) = self
                .repo
                .save_score(competitor.competitor_id, competitor.pontuacao, competitor.ranking)
                .await
            {
                warn!("pontuação de '{}' não gravada: {e}", competitor.nome);
            }
        }

        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::memory::MemoryRepository;

    #[test]
    fn test_baseline_score_without_history() {
        assert_eq!(aggressiveness_score(None, None, 0), 50.0);
    }

    #[test]
    fn test_below_market_reward() {
        // (10 - 8) / 10 * 30 = 6 points over baseline.
        assert_eq!(aggressiveness_score(Some(10.0), Some(8.0), 0), 56.0);
    }

    #[test]
    fn test_above_market_gets_no_price_adjustment() {
        assert_eq!(aggressiveness_score(Some(10.0), Some(12.0), 0), 50.0);
    }

    #[test]
    fn test_active_days_bonus() {
        assert_eq!(aggressiveness_score(None, None, 5), 60.0);
    }

    #[test]
    fn test_score_clamped_to_100() {
        // 50 + ~29.7 + 2*30 would exceed 100.
        assert_eq!(aggressiveness_score(Some(100.0), Some(1.0), 30), 100.0);
    }

    #[test]
    fn test_rank_descending_with_stable_ties() {
        let scored = rank(vec![
            ScoredCompetitor {
                competitor_id: Uuid::new_v4(),
                nome: "a".into(),
                pontuacao: 70.0,
                ranking: 0,
            },
            ScoredCompetitor {
                competitor_id: Uuid::new_v4(),
                nome: "b".into(),
                pontuacao: 80.0,
                ranking: 0,
            },
            ScoredCompetitor {
                competitor_id: Uuid::new_v4(),
                nome: "c".into(),
                pontuacao: 70.0,
                ranking: 0,
            },
        ]);
        let order: Vec<(&str, i32)> = scored
            .iter()
            .map(|s| (s.nome.as_str(), s.ranking))
            .collect();
        // "a" ties "c" and came first, so it stays ahead.
        assert_eq!(order, vec![("b", 1), ("a", 2), ("c", 3)]);
    }

    #[tokio::test]
    async fn test_recompute_scores_and_persists() {
        let user_id = Uuid::new_v4();
        let repo = Arc::new(MemoryRepository::new());
        let product = repo.add_product(user_id, "dipirona", Some(10.0));

        let barata = repo.add_competitor(user_id, "Farmácia Barata", false);
        let cara = repo.add_competitor(user_id, "Farmácia Cara", false);
        repo.add_competitor(user_id, "Minha Farmácia", true);

        let now = Utc::now();
        repo.add_observation(barata.id, product.id, 8.0, now);
        repo.add_observation(cara.id, product.id, 12.0, now);

        let engine = ScoringEngine::new(repo.clone(), 30);
        let scored = engine.recompute(user_id).await.unwrap();

        // Own pharmacy never enters the scoring pass.
        assert_eq!(scored.len(), 2);
        assert_eq!(scored[0].nome, "Farmácia Barata");
        assert_eq!(scored[0].ranking, 1);
        assert!(scored[0].pontuacao > scored[1].pontuacao);

        let competitors = repo.competitors();
        let own = competitors.iter().find(|c| c.propria).unwrap();
        assert!(own.pontuacao.is_none());
        let saved = competitors.iter().find(|c| c.id == barata.id).unwrap();
        assert_eq!(saved.pontuacao, Some(scored[0].pontuacao));
        assert_eq!(saved.ranking, Some(1));
    }
}
