//! External candle source seam.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised by a candle source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Connection, timeout, or body read failure.
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success HTTP status.
    #[error("source returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, if readable.
        body: String,
    },

    /// The response could not be interpreted at all.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// One hourly OHLCV point as reported by the source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeriesPoint {
    pub period_start: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
}

/// One fetched page.
///
/// Records that could not be parsed are dropped but still counted, so a
/// full page with a bad record is not mistaken for the end of the series.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandlePage {
    pub points: Vec<SeriesPoint>,
    pub malformed: usize,
}

impl CandlePage {
    /// Number of records the source returned, parsed or not.
    #[must_use]
    pub fn fetched(&self) -> usize {
        self.points.len() + self.malformed
    }

    #[must_use]
    pub fn oldest(&self) -> Option<DateTime<Utc>> {
        self.points.iter().map(|p| p.period_start).min()
    }
}

/// A paginated, rate-limited source of hourly candles.
#[async_trait]
pub trait SeriesSource: Send + Sync {
    /// Fetches up to `count` candles ending strictly before `to`
    /// (or the latest candles when `to` is `None`).
    async fn fetch_page(
        &self,
        symbol: &str,
        count: usize,
        to: Option<DateTime<Utc>>,
    ) -> Result<CandlePage, SourceError>;

    /// Lists the symbols currently tradable on the source.
    async fn list_markets(&self) -> Result<Vec<String>, SourceError>;

    fn name(&self) -> &str;
}
