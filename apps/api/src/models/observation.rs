#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One immutable price fact. Append-only: observations are inserted once
/// per successful fetch and never updated or deduplicated — trend and
/// volatility need the full intra-day distribution.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PriceObservation {
    pub id: Uuid,
    pub competitor_id: Uuid,
    pub product_id: Uuid,
    pub preco: f64,
    pub coletado_em: DateTime<Utc>,
    pub fonte: String,
    pub disponivel: bool,
}

/// Insert payload for a new observation.
#[derive(Debug, Clone)]
pub struct NewObservation {
    pub competitor_id: Uuid,
    pub product_id: Uuid,
    pub preco: f64,
    pub coletado_em: DateTime<Utc>,
    pub fonte: String,
    pub disponivel: bool,
}
