use anyhow::{anyhow, Result};
use std::net::SocketAddr;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub database_url: String,
    pub gateway_token: Option<String>,
    pub gateway_webhook_url: Option<String>,
    pub sweep_interval_seconds: u64,
    pub confirm_ttl_seconds: u64,
    pub appeal_cooldown_days: i64,
    pub page_size: i64,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr = env_or("HTTP_ADDR", "0.0.0.0:8080");
        let _parsed_http_addr = SocketAddr::from_str(&http_addr)
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;

        Ok(Self {
            http_addr,
            database_url: env_or("DATABASE_URL", "sqlite://warden.db"),
            gateway_token: std::env::var("GATEWAY_TOKEN").ok(),
            gateway_webhook_url: std::env::var("GATEWAY_WEBHOOK_URL").ok(),
            sweep_interval_seconds: env_or_parse("SWEEP_INTERVAL_SECONDS", "300")?,
            confirm_ttl_seconds: env_or_parse("CONFIRM_TTL_SECONDS", "30")?,
            appeal_cooldown_days: env_or_parse("APPEAL_COOLDOWN_DAYS", "7")?,
            page_size: env_or_parse("PAGE_SIZE", "10")?,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}
