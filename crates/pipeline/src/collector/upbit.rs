//! Upbit hourly candle client.
//!
//! Candles come from `/v1/candles/minutes/60`, newest first, at most 200
//! per request. The endpoint is unauthenticated but shares a request quota
//! per client IP, so one rate limiter guards every call made through a
//! client instance.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use coin_pulse_core::{CollectorConfig, PipelineError};
use governor::{Quota, RateLimiter};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::num::NonZeroU32;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use super::source::{CandlePage, SeriesPoint, SeriesSource, SourceError};

/// Default Upbit REST base URL.
pub const UPBIT_API_URL: &str = "https://api.upbit.com";

const CANDLE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

#[derive(Debug, Deserialize)]
struct MarketEntry {
    market: String,
}

/// Upbit REST client.
pub struct UpbitClient {
    http: Client,
    base_url: String,
    quote_currency: String,
    rate_limiter: Arc<
        RateLimiter<
            governor::state::NotKeyed,
            governor::state::InMemoryState,
            governor::clock::DefaultClock,
        >,
    >,
}

impl UpbitClient {
    /// Builds a client from the collector settings.
    ///
    /// # Errors
    /// Returns an error if the rate is zero or the HTTP client cannot be built.
    pub fn new(config: &CollectorConfig) -> Result<Self> {
        let per_second = NonZeroU32::new(config.requests_per_second).ok_or_else(|| {
            PipelineError::Config("collector.requests_per_second must be > 0".to_string())
        })?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            quote_currency: config.quote_currency.clone(),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
        })
    }

    /// Returns the base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Market code for a symbol, e.g. `KRW-BTC`.
    #[must_use]
    pub fn market_code(&self, symbol: &str) -> String {
        format!("{}-{}", self.quote_currency, symbol)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, SourceError> {
        self.rate_limiter.until_ready().await;

        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, ?query, "GET");

        let response = self
            .http
            .get(&url)
            .header("Accept", "application/json")
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SourceError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response.json::<T>().await.map_err(|e| {
            if e.is_decode() {
                SourceError::Malformed(e.to_string())
            } else {
                SourceError::Transport(e)
            }
        })
    }
}

#[async_trait]
impl SeriesSource for UpbitClient {
    async fn fetch_page(
        &self,
        symbol: &str,
        count: usize,
        to: Option<DateTime<Utc>>,
    ) -> Result<CandlePage, SourceError> {
        let mut query = vec![
            ("market", self.market_code(symbol)),
            ("count", count.to_string()),
        ];
        if let Some(to) = to {
            query.push(("to", to.format("%Y-%m-%dT%H:%M:%SZ").to_string()));
        }

        let records: Vec<serde_json::Value> = self.get("/v1/candles/minutes/60", &query).await?;

        let mut page = CandlePage::default();
        for record in &records {
            match parse_candle(record) {
                Some(point) => page.points.push(point),
                None => {
                    page.malformed += 1;
                    tracing::warn!(symbol, %record, "Skipping malformed candle");
                }
            }
        }

        Ok(page)
    }

    async fn list_markets(&self) -> Result<Vec<String>, SourceError> {
        let markets: Vec<MarketEntry> = self.get("/v1/market/all", &[]).await?;
        let prefix = format!("{}-", self.quote_currency);

        Ok(markets
            .into_iter()
            .filter_map(|m| m.market.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }

    fn name(&self) -> &str {
        "upbit"
    }
}

/// Parses one candle object; `None` if any field is missing or invalid.
fn parse_candle(record: &serde_json::Value) -> Option<SeriesPoint> {
    let period_start = record.get("candle_date_time_utc")?.as_str()?;
    let period_start = NaiveDateTime::parse_from_str(period_start, CANDLE_TIME_FORMAT)
        .ok()?
        .and_utc();

    Some(SeriesPoint {
        period_start,
        open: parse_decimal(record.get("opening_price")?)?,
        high: parse_decimal(record.get("high_price")?)?,
        low: parse_decimal(record.get("low_price")?)?,
        close: parse_decimal(record.get("trade_price")?)?,
        volume: parse_decimal(record.get("candle_acc_trade_volume")?)?,
    })
}

/// Parses a decimal from a JSON number or string, including exponent form.
fn parse_decimal(value: &serde_json::Value) -> Option<Decimal> {
    let text = match value {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        _ => return None,
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .ok()
}
