//! sqlx-backed implementation of [`PriceRepository`].
//!
//! The single-active-profile invariant is enforced here, inside one
//! transaction, not as advisory application-level locking.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::AppError;
use crate::models::competitor::Competitor;
use crate::models::observation::NewObservation;
use crate::models::product::Product;
use crate::models::profile::SearchProfile;

use super::{
    CompetitorDetails, CompetitorWindowStats, DashboardKpis, InsightRow, PriceRepository,
    ProductWindowStats, RankedCompetitor, TrendPoint,
};

pub struct PgPriceRepository {
    pool: PgPool,
}

impl PgPriceRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PriceRepository for PgPriceRepository {
    async fn list_products(&self, user_id: Uuid) -> Result<Vec<Product>, AppError> {
        let products = sqlx::query_as(
            "SELECT * FROM produtos WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    async fn products_by_ids(
        &self,
        user_id: Uuid,
        ids: &[Uuid],
    ) -> Result<Vec<Product>, AppError> {
        let products = sqlx::query_as(
            "SELECT * FROM produtos WHERE user_id = $1 AND id = ANY($2) ORDER BY created_at",
        )
        .bind(user_id)
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(products)
    }

    async fn find_or_create_competitor(
        &self,
        user_id: Uuid,
        nome: &str,
        details: &CompetitorDetails,
    ) -> Result<Competitor, AppError> {
        // Lazy registry creation: first sight of (user, nome) inserts a row,
        // later sights reuse it and backfill details the first pass missed.
        let competitor = sqlx::query_as(
            r#"
            INSERT INTO concorrentes (id, user_id, nome, cnpj, endereco, lat, lon, propria)
            VALUES ($1, $2, $3, $4, $5, $6, $7, false)
            ON CONFLICT (user_id, nome) DO UPDATE SET
                cnpj = COALESCE(concorrentes.cnpj, EXCLUDED.cnpj),
                endereco = COALESCE(concorrentes.endereco, EXCLUDED.endereco),
                lat = COALESCE(concorrentes.lat, EXCLUDED.lat),
                lon = COALESCE(concorrentes.lon, EXCLUDED.lon)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(nome)
        .bind(&details.cnpj)
        .bind(&details.endereco)
        .bind(details.lat)
        .bind(details.lon)
        .fetch_one(&self.pool)
        .await?;
        Ok(competitor)
    }

    async fn insert_observation(&self, obs: &NewObservation) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO observacoes_precos
                (id, competitor_id, product_id, preco, coletado_em, fonte, disponivel)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(obs.competitor_id)
        .bind(obs.product_id)
        .bind(obs.preco)
        .bind(obs.coletado_em)
        .bind(&obs.fonte)
        .bind(obs.disponivel)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn competitor_window_stats(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<CompetitorWindowStats>, AppError> {
        let stats = sqlx::query_as(
            r#"
            SELECT c.id AS competitor_id,
                   c.nome,
                   AVG(o.preco) FILTER (WHERE o.preco > 0) AS media,
                   COUNT(DISTINCT DATE(o.coletado_em)) AS dias_ativos
            FROM concorrentes c
            LEFT JOIN observacoes_precos o
                   ON o.competitor_id = c.id AND o.coletado_em >= $2
            WHERE c.user_id = $1 AND c.propria = false
            GROUP BY c.id, c.nome
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(stats)
    }

    async fn market_average(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Option<f64>, AppError> {
        let media: Option<f64> = sqlx::query_scalar(
            r#"
            SELECT AVG(o.preco)
            FROM observacoes_precos o
            JOIN concorrentes c ON c.id = o.competitor_id
            WHERE c.user_id = $1 AND c.propria = false
              AND o.preco > 0 AND o.coletado_em >= $2
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(media)
    }

    async fn save_score(
        &self,
        competitor_id: Uuid,
        pontuacao: f64,
        ranking: i32,
    ) -> Result<(), AppError> {
        sqlx::query("UPDATE concorrentes SET pontuacao = $2, ranking = $3 WHERE id = $1")
            .bind(competitor_id)
            .bind(pontuacao)
            .bind(ranking)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn activate_profile(&self, user_id: Uuid, profile_id: Uuid) -> Result<(), AppError> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("UPDATE perfis_busca SET ativo = false WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        let updated =
            sqlx::query("UPDATE perfis_busca SET ativo = true WHERE id = $1 AND user_id = $2")
                .bind(profile_id)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;

        if updated.rows_affected() == 0 {
            // Dropping the transaction rolls the deactivation back.
            return Err(AppError::NotFound(format!("Perfil {profile_id} não encontrado")));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn active_profile(&self, user_id: Uuid) -> Result<Option<SearchProfile>, AppError> {
        let profile = sqlx::query_as(
            "SELECT * FROM perfis_busca WHERE user_id = $1 AND ativo = true LIMIT 1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn kpis(&self, user_id: Uuid, since: DateTime<Utc>) -> Result<DashboardKpis, AppError> {
        let kpis = sqlx::query_as(
            r#"
            SELECT
                (SELECT COUNT(*) FROM produtos WHERE user_id = $1) AS produtos_monitorados,
                (SELECT COUNT(*) FROM concorrentes
                  WHERE user_id = $1 AND propria = false) AS concorrentes,
                (SELECT COUNT(*) FROM observacoes_precos o
                  JOIN concorrentes c ON c.id = o.competitor_id
                  WHERE c.user_id = $1 AND o.coletado_em >= $2) AS observacoes_janela
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;
        Ok(kpis)
    }

    async fn product_window_stats(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<ProductWindowStats>, AppError> {
        let stats = sqlx::query_as(
            r#"
            SELECT p.id AS product_id,
                   p.nome,
                   p.preco_proprio,
                   MIN(o.preco) FILTER (WHERE o.preco > 0) AS menor,
                   MAX(o.preco) FILTER (WHERE o.preco > 0) AS maior,
                   AVG(o.preco) FILTER (WHERE o.preco > 0) AS media
            FROM produtos p
            LEFT JOIN observacoes_precos o
                   ON o.product_id = p.id AND o.coletado_em >= $2
            WHERE p.user_id = $1
            GROUP BY p.id, p.nome, p.preco_proprio
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(stats)
    }

    async fn top_competitors(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<RankedCompetitor>, AppError> {
        let competitors = sqlx::query_as(
            r#"
            SELECT id, nome, pontuacao, ranking
            FROM concorrentes
            WHERE user_id = $1 AND propria = false
              AND pontuacao IS NOT NULL AND ranking IS NOT NULL
            ORDER BY ranking
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(competitors)
    }

    async fn daily_market_averages(
        &self,
        user_id: Uuid,
        since: DateTime<Utc>,
    ) -> Result<Vec<TrendPoint>, AppError> {
        let points = sqlx::query_as(
            r#"
            SELECT DATE(o.coletado_em) AS dia, AVG(o.preco) AS media_mercado
            FROM observacoes_precos o
            JOIN concorrentes c ON c.id = o.competitor_id
            WHERE c.user_id = $1 AND o.preco > 0 AND o.coletado_em >= $2
            GROUP BY DATE(o.coletado_em)
            ORDER BY dia
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        Ok(points)
    }

    async fn recent_insights(
        &self,
        user_id: Uuid,
        limit: i64,
    ) -> Result<Vec<InsightRow>, AppError> {
        let insights = sqlx::query_as(
            r#"
            SELECT id, texto, created_at
            FROM insights
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(insights)
    }
}
