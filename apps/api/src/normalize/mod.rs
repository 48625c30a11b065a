//! Response normalizer — maps the upstream's heterogeneous product records
//! into one canonical shape the aggregation engine can consume.
//!
//! The function is total over well-formed JSON objects: missing fields
//! degrade to nulls, zeros or sentinels, never to an error. Only a
//! non-object input is rejected.

pub mod fields;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::geo;
use fields::*;

/// Emitted when no timestamp-like field is present or none of them parse.
pub const HORARIO_NAO_INFORMADO: &str = "horário não informado";

const EARTH_RADIUS_KM: f64 = 6371.0;

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordenadas {
    pub lat: f64,
    pub lon: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Estabelecimento {
    pub nome: String,
    pub cnpj: Option<String>,
    pub endereco: Option<String>,
}

/// The upstream-shape-independent representation of one competitor price
/// observation. Pipeline-internal; the persistence layer stores a projection
/// of it, never the raw upstream record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalRecord {
    pub id: String,
    pub descricao: String,
    pub preco: f64,
    pub estabelecimento: Estabelecimento,
    pub coordenadas: Option<Coordenadas>,
    pub distancia: Option<f64>,
    pub atualizado: String,
    pub coletado_em: Option<DateTime<Utc>>,
}

impl CanonicalRecord {
    /// A price of zero or below means "no valid price": the record stays in
    /// the result list but is excluded from statistical aggregation.
    pub fn has_valid_price(&self) -> bool {
        self.preco > 0.0
    }
}

/// Normalizes one raw upstream record. `origin` is the query center, used
/// to derive a distance when the upstream omits one; `now` anchors the
/// human-readable recency label.
pub fn normalize(
    raw: &Value,
    origin: Option<Coordenadas>,
    now: DateTime<Utc>,
) -> Result<CanonicalRecord, NormalizeError> {
    let obj = raw
        .as_object()
        .ok_or_else(|| NormalizeError::NotAnObject(json_type_name(raw)))?;

    let coordenadas = extract_coordinates(obj);
    let distancia = first_f64(obj, DISTANCE_FIELDS).or_else(|| match (origin, coordenadas) {
        (Some(a), Some(b)) => Some(haversine_km(a, b)),
        _ => None,
    });

    let coletado_em = extract_timestamp(obj);
    let atualizado = match coletado_em {
        Some(ts) => relative_label(ts, now),
        None => HORARIO_NAO_INFORMADO.to_string(),
    };

    Ok(CanonicalRecord {
        id: first_scalar_string(obj, ID_FIELDS).unwrap_or_default(),
        descricao: first_string(obj, DESCRIPTION_FIELDS).unwrap_or_default(),
        preco: first_f64(obj, PRICE_FIELDS).unwrap_or(0.0),
        estabelecimento: Estabelecimento {
            nome: first_string(obj, NAME_FIELDS).unwrap_or_default(),
            cnpj: first_scalar_string(obj, TAX_ID_FIELDS),
            endereco: first_string(obj, ADDRESS_FIELDS),
        },
        coordenadas,
        distancia,
        atualizado,
        coletado_em,
    })
}

/// Normalizes a whole upstream result list, dropping entries that are not
/// objects (the upstream occasionally interleaves nulls).
pub fn normalize_all(
    raw_list: &[Value],
    origin: Option<Coordenadas>,
    now: DateTime<Utc>,
) -> Vec<CanonicalRecord> {
    raw_list
        .iter()
        .filter_map(|raw| normalize(raw, origin, now).ok())
        .collect()
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn first_string(obj: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| {
        obj.get(*name)
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    })
}

/// Like [`first_string`] but also accepts numbers (GTINs and tax ids show
/// up both quoted and bare).
fn first_scalar_string(obj: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| match obj.get(*name) {
        Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Numeric-ish read: a JSON number, or a string that parses as f64.
fn first_f64(obj: &Map<String, Value>, names: &[&str]) -> Option<f64> {
    names.iter().find_map(|name| match obj.get(*name) {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

/// Coordinate extraction fallback chain: combined "lat,lon" string, then
/// separate numeric-ish fields, then a decoded spatial hash, then `None`.
/// A record with no coordinates is valid and flows through the pipeline;
/// downstream treats a null distance as "unknown", not as an error.
fn extract_coordinates(obj: &Map<String, Value>) -> Option<Coordenadas> {
    for name in COMBINED_COORD_FIELDS {
        if let Some(s) = obj.get(*name).and_then(Value::as_str) {
            if let Some((lat_s, lon_s)) = s.split_once(',') {
                if let (Ok(lat), Ok(lon)) =
                    (lat_s.trim().parse::<f64>(), lon_s.trim().parse::<f64>())
                {
                    return Some(Coordenadas { lat, lon });
                }
            }
        }
    }

    if let (Some(lat), Some(lon)) = (first_f64(obj, LAT_FIELDS), first_f64(obj, LON_FIELDS)) {
        return Some(Coordenadas { lat, lon });
    }

    for name in GEOHASH_FIELDS {
        if let Some(hash) = obj.get(*name).and_then(Value::as_str) {
            if let Some((lat, lon)) = geo::decode(hash) {
                return Some(Coordenadas { lat, lon });
            }
        }
    }

    None
}

fn extract_timestamp(obj: &Map<String, Value>) -> Option<DateTime<Utc>> {
    TIMESTAMP_FIELDS
        .iter()
        .find_map(|name| obj.get(*name).and_then(parse_timestamp))
}

fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                return Some(dt.with_timezone(&Utc));
            }
            if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
                return Some(naive.and_utc());
            }
            None
        }
        Value::Number(n) => n
            .as_i64()
            .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        _ => None,
    }
}

/// "há N min/h/dias" relative to `now`. Future or sub-minute timestamps
/// collapse to "agora mesmo".
fn relative_label(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let secs = (now - then).num_seconds();
    if secs < 60 {
        return "agora mesmo".to_string();
    }
    let mins = secs / 60;
    if mins < 60 {
        return format!("há {mins} min");
    }
    let hours = mins / 60;
    if hours < 24 {
        return format!("há {hours} h");
    }
    let days = hours / 24;
    if days == 1 {
        "há 1 dia".to_string()
    } else {
        format!("há {days} dias")
    }
}

fn haversine_km(a: Coordenadas, b: Coordenadas) -> f64 {
    let dlat = (b.lat - a.lat).to_radians();
    let dlon = (b.lon - a.lon).to_radians();
    let h = (dlat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().asin()
}
