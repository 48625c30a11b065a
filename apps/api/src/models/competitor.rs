use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Competitor (pharmacy) registry entry. Rows are created lazily the first
/// time a name is observed for a user; the match key is exact name equality
/// within that user's own set, so two users' "Drogasil" rows stay distinct.
///
/// `propria` marks the user's own pharmacy — own rows never receive a
/// computed `pontuacao`/`ranking`; those are recomputed by the batch scoring
/// pass, not on every read.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Competitor {
    pub id: Uuid,
    pub user_id: Uuid,
    pub nome: String,
    pub cnpj: Option<String>,
    pub endereco: Option<String>,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub propria: bool,
    pub pontuacao: Option<f64>,
    pub ranking: Option<i32>,
    pub created_at: DateTime<Utc>,
}
