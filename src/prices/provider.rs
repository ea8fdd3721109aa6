//! Upstream market-data sources
//!
//! Two HTTP APIs with different payload shapes, both normalized to
//! `PriceSnapshot`:
//! - chart API keyed by ticker: absolute price + previous close
//! - simple-price API keyed by asset slug: price + 24h percent change
//!
//! Every request is bounded by the configured timeout. A timeout, a non-2xx
//! status or a payload missing the expected fields is an `Upstream` error.

use crate::error::BotError;
use crate::models::{InstrumentClass, PriceSnapshot};
use crate::Result;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_CHART_BASE_URL: &str = "https://query1.finance.yahoo.com";
pub const DEFAULT_SIMPLE_PRICE_BASE_URL: &str = "https://api.coingecko.com";

/// Fetches a single instrument's current quote.
#[async_trait::async_trait]
pub trait PriceProvider: Send + Sync {
    async fn fetch(&self, class: InstrumentClass, instrument_id: &str) -> Result<PriceSnapshot>;
}

#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub chart_base_url: String,
    pub simple_price_base_url: String,
    pub timeout: Duration,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            chart_base_url: DEFAULT_CHART_BASE_URL.to_string(),
            simple_price_base_url: DEFAULT_SIMPLE_PRICE_BASE_URL.to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

// =============================
// Chart API payload
// =============================

#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    symbol: Option<String>,
    regular_market_price: Option<f64>,
    previous_close: Option<f64>,
    chart_previous_close: Option<f64>,
}

fn normalize_chart(instrument_id: &str, payload: ChartResponse) -> Result<PriceSnapshot> {
    let meta = payload
        .chart
        .result
        .and_then(|results| results.into_iter().next())
        .map(|r| r.meta)
        .ok_or_else(|| {
            BotError::Upstream(format!("Chart response for {} has no result", instrument_id))
        })?;

    let price = meta.regular_market_price.ok_or_else(|| {
        BotError::Upstream(format!("Chart response for {} has no price", instrument_id))
    })?;
    let previous = meta
        .previous_close
        .or(meta.chart_previous_close)
        .ok_or_else(|| {
            BotError::Upstream(format!(
                "Chart response for {} has no previous close",
                instrument_id
            ))
        })?;

    Ok(PriceSnapshot::from_reference(
        instrument_id,
        meta.symbol,
        price,
        previous,
    ))
}

// =============================
// Simple-price API payload
// =============================

fn normalize_simple_price(instrument_id: &str, payload: &Value) -> Result<PriceSnapshot> {
    let slug = instrument_id.to_lowercase();
    let entry = payload.get(&slug).ok_or_else(|| {
        BotError::Upstream(format!("Simple-price response has no entry for {}", slug))
    })?;

    let price = entry.get("usd").and_then(Value::as_f64).ok_or_else(|| {
        BotError::Upstream(format!("Simple-price response for {} has no usd price", slug))
    })?;
    let change_percent = entry
        .get("usd_24h_change")
        .and_then(Value::as_f64)
        .ok_or_else(|| {
            BotError::Upstream(format!("Simple-price response for {} has no 24h change", slug))
        })?;

    Ok(PriceSnapshot::from_percent(instrument_id, price, change_percent))
}

// =============================
// HTTP provider
// =============================

/// Reusable HTTP provider (connection-pooled) routing by instrument class.
pub struct HttpPriceProvider {
    client: Client,
    config: ProviderConfig,
}

impl HttpPriceProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .timeout(config.timeout)
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            config: ProviderConfig {
                chart_base_url: config.chart_base_url.trim_end_matches('/').to_string(),
                simple_price_base_url: config
                    .simple_price_base_url
                    .trim_end_matches('/')
                    .to_string(),
                timeout: config.timeout,
            },
        })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T> {
        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BotError::Upstream(format!("Request to {} timed out", url))
                } else {
                    BotError::Upstream(format!("Request to {} failed: {}", url, e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(BotError::Upstream(format!(
                "{} returned {}",
                url, status
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| BotError::Upstream(format!("Invalid JSON from {}: {}", url, e)))
    }

    async fn fetch_chart(&self, instrument_id: &str) -> Result<PriceSnapshot> {
        let url = format!(
            "{}/v8/finance/chart/{}",
            self.config.chart_base_url, instrument_id
        );
        let payload: ChartResponse = self.get_json(&url, &[]).await?;
        normalize_chart(instrument_id, payload)
    }

    async fn fetch_simple_price(&self, instrument_id: &str) -> Result<PriceSnapshot> {
        let url = format!("{}/api/v3/simple/price", self.config.simple_price_base_url);
        let slug = instrument_id.to_lowercase();
        let payload: Value = self
            .get_json(
                &url,
                &[
                    ("ids", slug.as_str()),
                    ("vs_currencies", "usd"),
                    ("include_24hr_change", "true"),
                ],
            )
            .await?;
        normalize_simple_price(instrument_id, &payload)
    }
}

#[async_trait::async_trait]
impl PriceProvider for HttpPriceProvider {
    async fn fetch(&self, class: InstrumentClass, instrument_id: &str) -> Result<PriceSnapshot> {
        debug!(class = %class, instrument_id, "Fetching upstream price");

        match class {
            InstrumentClass::Index | InstrumentClass::Stock => self.fetch_chart(instrument_id).await,
            InstrumentClass::Crypto => self.fetch_simple_price(instrument_id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{extract::Path, http::StatusCode, routing::get, Json, Router};
    use serde_json::json;

    async fn chart(Path(symbol): Path<String>) -> (StatusCode, Json<Value>) {
        match symbol.as_str() {
            "AAPL" => (
                StatusCode::OK,
                Json(json!({
                    "chart": {"result": [{"meta": {
                        "symbol": "AAPL",
                        "regularMarketPrice": 200.0,
                        "previousClose": 160.0
                    }}]}
                })),
            ),
            "EMPTY" => (StatusCode::OK, Json(json!({"chart": {"result": null}}))),
            _ => (StatusCode::NOT_FOUND, Json(json!({"error": "unknown"}))),
        }
    }

    async fn simple_price() -> Json<Value> {
        Json(json!({"bitcoin": {"usd": 65000.5, "usd_24h_change": -1.5}}))
    }

    async fn spawn_upstream() -> String {
        let app = Router::new()
            .route("/v8/finance/chart/:symbol", get(chart))
            .route("/api/v3/simple/price", get(simple_price));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn provider(base: &str) -> HttpPriceProvider {
        HttpPriceProvider::new(ProviderConfig {
            chart_base_url: base.to_string(),
            simple_price_base_url: format!("{}/", base),
            timeout: Duration::from_secs(5),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_chart_source_derives_change() {
        let base = spawn_upstream().await;
        let snap = provider(&base)
            .fetch(InstrumentClass::Stock, "AAPL")
            .await
            .unwrap();

        assert_eq!(snap.price, 200.0);
        assert_eq!(snap.change, Some(40.0));
        assert_eq!(snap.change_percent_label(), "+25.00%");
        assert_eq!(snap.name.as_deref(), Some("AAPL"));
    }

    #[tokio::test]
    async fn test_chart_source_errors_are_upstream() {
        let base = spawn_upstream().await;
        let p = provider(&base);

        let missing = p.fetch(InstrumentClass::Index, "EMPTY").await;
        assert!(matches!(missing, Err(BotError::Upstream(_))));

        let not_found = p.fetch(InstrumentClass::Index, "NOPE").await;
        assert!(matches!(not_found, Err(BotError::Upstream(_))));
    }

    #[tokio::test]
    async fn test_simple_price_source() {
        let base = spawn_upstream().await;
        let p = provider(&base);

        let snap = p.fetch(InstrumentClass::Crypto, "bitcoin").await.unwrap();
        assert_eq!(snap.price, 65000.5);
        assert_eq!(snap.change, None);
        assert_eq!(snap.change_percent, -1.5);

        let missing = p.fetch(InstrumentClass::Crypto, "dogecoin").await;
        assert!(matches!(missing, Err(BotError::Upstream(_))));
    }

    #[test]
    fn test_chart_falls_back_to_chart_previous_close() {
        let payload: ChartResponse = serde_json::from_value(json!({
            "chart": {"result": [{"meta": {
                "regularMarketPrice": 90.0,
                "chartPreviousClose": 100.0
            }}]}
        }))
        .unwrap();
        let snap = normalize_chart("^GSPC", payload).unwrap();
        assert_eq!(snap.change_percent_label(), "-10.00%");
    }
}
