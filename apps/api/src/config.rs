use anyhow::{Context, Result};

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub price_api_base_url: String,
    pub port: u16,
    pub rust_log: String,
    /// Reference point used when a request carries no usable coordinates
    /// (defaults to Curitiba).
    pub default_lat: f64,
    pub default_lon: f64,
    /// Trailing window for volatility/trend reads, in days.
    pub janela_volatilidade_dias: i64,
    /// Trailing window for the competitor scoring pass, in days.
    pub janela_pontuacao_dias: i64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        Ok(Config {
            database_url: require_env("DATABASE_URL")?,
            price_api_base_url: require_env("PRICE_API_BASE_URL")?,
            port: env_or("PORT", 8080)?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            default_lat: env_or("DEFAULT_LAT", -25.4284)?,
            default_lon: env_or("DEFAULT_LON", -49.2733)?,
            janela_volatilidade_dias: env_or("VOLATILITY_WINDOW_DAYS", 7)?,
            janela_pontuacao_dias: env_or("SCORING_WINDOW_DAYS", 30)?,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value")),
        Err(_) => Ok(default),
    }
}
