use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A product the user monitors. `preco_proprio` is the user-declared own
/// price — nullable ("not yet priced"), mutable by the user only, never
/// written by the aggregation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Product {
    pub id: Uuid,
    pub user_id: Uuid,
    pub nome: String,
    pub principio_ativo: Option<String>,
    pub categoria_id: Option<Uuid>,
    pub preco_proprio: Option<f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
