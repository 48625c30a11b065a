//! Derived-metric math for the monitoring pass: price summaries,
//! volatility, status classification and trend.
//!
//! Volatility is deliberately spread-over-mean, `(max-min)/avg*100` — not a
//! variance statistic. Dashboards built on it expect exactly this number.

use serde::{Deserialize, Serialize};

use crate::normalize::CanonicalRecord;

/// Percentage band around the competitor average inside which the trend is
/// forced to neutral, suppressing sub-2% noise.
pub const TREND_DEAD_ZONE_PCT: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Resumo {
    pub quantidade: usize,
    pub menor: Option<f64>,
    pub maior: Option<f64>,
    pub media: Option<f64>,
}

impl Resumo {
    pub fn empty() -> Self {
        Self {
            quantidade: 0,
            menor: None,
            maior: None,
            media: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceStatus {
    NoPrice,
    Competitive,
    Moderate,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Up,
    Down,
    Neutral,
}

/// Extracts the positive prices from a normalized result list. Zero and
/// negative prices mean "no valid price" and never enter the statistics.
pub fn positive_prices(records: &[CanonicalRecord]) -> Vec<f64> {
    records
        .iter()
        .filter(|r| r.has_valid_price())
        .map(|r| r.preco)
        .collect()
}

/// Count, min, max and mean (2 decimals) over the positive entries of
/// `prices`. All aggregates are `None` when nothing positive remains.
pub fn resumo(prices: &[f64]) -> Resumo {
    let positivos: Vec<f64> = prices.iter().copied().filter(|p| *p > 0.0).collect();
    if positivos.is_empty() {
        return Resumo::empty();
    }

    let menor = positivos.iter().copied().fold(f64::INFINITY, f64::min);
    let maior = positivos.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let media = positivos.iter().sum::<f64>() / positivos.len() as f64;

    Resumo {
        quantidade: positivos.len(),
        menor: Some(menor),
        maior: Some(maior),
        media: Some(round2(media)),
    }
}

/// `(max - min) / average * 100`, one decimal. Zero when the average is
/// absent or non-positive.
pub fn volatility(resumo: &Resumo) -> f64 {
    match (resumo.menor, resumo.maior, resumo.media) {
        (Some(menor), Some(maior), Some(media)) if media > 0.0 => {
            round1((maior - menor) / media * 100.0)
        }
        _ => 0.0,
    }
}

/// Classifies the user's own price against the competitor field:
/// `no_price` when either side is missing, `competitive` below the average,
/// `high` above the highest competitor price (average when no highest),
/// `moderate` in between.
pub fn classify_status(
    own: Option<f64>,
    media: Option<f64>,
    maior: Option<f64>,
) -> PriceStatus {
    let (own, media) = match (own, media) {
        (Some(o), Some(m)) => (o, m),
        _ => return PriceStatus::NoPrice,
    };

    if own < media {
        return PriceStatus::Competitive;
    }
    if own > maior.unwrap_or(media) {
        return PriceStatus::High;
    }
    PriceStatus::Moderate
}

/// Percentage gap between own price and the competitor average, with a
/// ±2% dead zone forced to neutral. `up` means own price above market —
/// a losing-ground signal from the user's perspective.
pub fn compute_trend(own: Option<f64>, media: Option<f64>) -> (Trend, f64) {
    let (own, media) = match (own, media) {
        (Some(o), Some(m)) if m > 0.0 => (o, m),
        _ => return (Trend::Neutral, 0.0),
    };

    let pct = (own - media) / media * 100.0;
    if pct.abs() < TREND_DEAD_ZONE_PCT {
        return (Trend::Neutral, 0.0);
    }
    if pct > 0.0 {
        (Trend::Up, round2(pct))
    } else {
        (Trend::Down, round2(pct))
    }
}

pub fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
