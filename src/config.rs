//! Process configuration read from the environment

use crate::error::BotError;
use crate::models::UserId;
use crate::prices::provider::{ProviderConfig, DEFAULT_CHART_BASE_URL, DEFAULT_SIMPLE_PRICE_BASE_URL};
use crate::rate_limit::RateLimitConfig;
use crate::runtime::RuntimeConfig;
use crate::Result;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_DATA_DIR: &str = "./data";
pub const DEFAULT_SUPPORT_URL: &str = "https://t.me/Cash_LabBot";

#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Administrator: always premium, receives feedback, may call `/stats`.
    pub admin_id: UserId,
    pub data_dir: PathBuf,
    pub port: u16,
    pub support_url: String,
    pub provider: ProviderConfig,
    pub rate_limit: RateLimitConfig,
    pub runtime: RuntimeConfig,
}

impl BotConfig {
    /// Load from the process environment, after merging a `.env` file if one
    /// exists.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let admin_id = lookup("ADMIN_ID")
            .ok_or_else(|| BotError::Config("ADMIN_ID is not set".to_string()))
            .and_then(|raw| parse("ADMIN_ID", &raw))?;

        let port = match lookup("PORT").or_else(|| lookup("API_PORT")) {
            Some(raw) => parse("PORT", &raw)?,
            None => DEFAULT_PORT,
        };

        let mut rate_limit = RateLimitConfig::default();
        if let Some(raw) = lookup("RATE_LIMIT_MAX") {
            rate_limit.max_per_window = parse("RATE_LIMIT_MAX", &raw)?;
        }
        if let Some(raw) = lookup("RATE_LIMIT_WINDOW_MS") {
            rate_limit.window = Duration::from_millis(parse("RATE_LIMIT_WINDOW_MS", &raw)?);
        }

        let provider = ProviderConfig {
            chart_base_url: lookup("YAHOO_BASE_URL")
                .unwrap_or_else(|| DEFAULT_CHART_BASE_URL.to_string()),
            simple_price_base_url: lookup("COINGECKO_BASE_URL")
                .unwrap_or_else(|| DEFAULT_SIMPLE_PRICE_BASE_URL.to_string()),
            ..ProviderConfig::default()
        };

        Ok(Self {
            admin_id,
            data_dir: lookup("DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            port,
            support_url: lookup("SUPPORT_CHAT_URL")
                .unwrap_or_else(|| DEFAULT_SUPPORT_URL.to_string()),
            provider,
            rate_limit,
            runtime: RuntimeConfig::default(),
        })
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> Result<T> {
    raw.trim()
        .parse()
        .map_err(|_| BotError::Config(format!("{} has an invalid value: {:?}", key, raw)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<BotConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        BotConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("ADMIN_ID", "42")]).unwrap();

        assert_eq!(config.admin_id, 42);
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.support_url, DEFAULT_SUPPORT_URL);
        assert_eq!(config.rate_limit.max_per_window, 5);
        assert_eq!(config.rate_limit.window, Duration::from_millis(1000));
        assert_eq!(config.provider.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("ADMIN_ID", "7"),
            ("API_PORT", "8088"),
            ("RATE_LIMIT_MAX", "10"),
            ("RATE_LIMIT_WINDOW_MS", "2000"),
            ("YAHOO_BASE_URL", "http://127.0.0.1:9000"),
        ])
        .unwrap();

        assert_eq!(config.port, 8088);
        assert_eq!(config.rate_limit.max_per_window, 10);
        assert_eq!(config.rate_limit.window, Duration::from_secs(2));
        assert_eq!(config.provider.chart_base_url, "http://127.0.0.1:9000");
    }

    #[test]
    fn test_port_takes_precedence_over_api_port() {
        let config = load(&[("ADMIN_ID", "7"), ("PORT", "1"), ("API_PORT", "2")]).unwrap();
        assert_eq!(config.port, 1);
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(load(&[]), Err(BotError::Config(_))));
        assert!(matches!(
            load(&[("ADMIN_ID", "abc")]),
            Err(BotError::Config(_))
        ));
        assert!(matches!(
            load(&[("ADMIN_ID", "1"), ("PORT", "http")]),
            Err(BotError::Config(_))
        ));
    }
}
