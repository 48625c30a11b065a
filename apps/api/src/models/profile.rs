#![allow(dead_code)]

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Named search configuration: a pinned location (device GPS fix, reference
/// city or a postal code resolved once to coordinates — `origem` records
/// which), a radius in km (1–50) and a set of monitored products.
///
/// At most one profile per user is `ativo`; activating one deactivates the
/// rest inside a single transaction at the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SearchProfile {
    pub id: Uuid,
    pub user_id: Uuid,
    pub nome: String,
    pub origem: String,
    pub lat: f64,
    pub lon: f64,
    pub raio_km: i32,
    pub ativo: bool,
    pub created_at: DateTime<Utc>,
}

/// Location source tags stored in `origem`.
pub const ORIGEM_GPS: &str = "gps";
pub const ORIGEM_CIDADE: &str = "cidade";
pub const ORIGEM_CEP: &str = "cep";
