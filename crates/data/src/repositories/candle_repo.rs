//! Hourly candle repository.
//!
//! Provides first-write-wins batch inserts and bounds queries for
//! `coin_ohlcv`, plus the tracked-entity list the collector walks.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::{SeriesCandleRecord, TrackedEntity};
use crate::store::CandleStore;

/// Repository for candle data operations.
#[derive(Debug, Clone)]
pub struct CandleRepository {
    pool: PgPool,
}

impl CandleRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets the data bounds (earliest and latest timestamps) for an entity.
    ///
    /// # Returns
    /// A tuple of (earliest_timestamp, latest_timestamp), or None if no data exists.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    #[allow(clippy::type_complexity)]
    pub async fn get_data_bounds(
        &self,
        coin_id: i32,
    ) -> Result<Option<(DateTime<Utc>, DateTime<Utc>)>> {
        let row: Option<(Option<DateTime<Utc>>, Option<DateTime<Utc>>)> = sqlx::query_as(
            r#"
            SELECT MIN(timestamp), MAX(timestamp)
            FROM coin_ohlcv
            WHERE coin_id = $1
            "#,
        )
        .bind(coin_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to query data bounds")?;

        match row {
            Some((Some(min), Some(max))) => Ok(Some((min, max))),
            _ => Ok(None),
        }
    }

    /// Counts the number of candles for an entity.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn count_records(&self, coin_id: i32) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            SELECT COUNT(*)
            FROM coin_ohlcv
            WHERE coin_id = $1
            "#,
        )
        .bind(coin_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count records")?;

        Ok(row.0)
    }
}

#[async_trait]
impl CandleStore for CandleRepository {
    async fn list_entities(&self) -> Result<Vec<TrackedEntity>> {
        let entities = sqlx::query_as::<_, TrackedEntity>(
            r#"
            SELECT coin_id, coin_name, symbol
            FROM coins
            ORDER BY coin_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list coins")?;

        Ok(entities)
    }

    async fn insert_candles(&self, candles: &[SeriesCandleRecord]) -> Result<u64> {
        if candles.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;
        let mut inserted = 0u64;

        for candle in candles {
            let result = sqlx::query(
                r#"
                INSERT INTO coin_ohlcv (coin_id, timestamp, open, high, low, close, volume)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (coin_id, timestamp) DO NOTHING
                "#,
            )
            .bind(candle.coin_id)
            .bind(candle.timestamp)
            .bind(candle.open)
            .bind(candle.high)
            .bind(candle.low)
            .bind(candle.close)
            .bind(candle.volume)
            .execute(&mut *tx)
            .await
            .context("Failed to insert candle")?;

            inserted += result.rows_affected();
        }

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(inserted)
    }

    async fn latest_candle_timestamp(&self, coin_id: i32) -> Result<Option<DateTime<Utc>>> {
        let row: (Option<DateTime<Utc>>,) = sqlx::query_as(
            r#"
            SELECT MAX(timestamp)
            FROM coin_ohlcv
            WHERE coin_id = $1
            "#,
        )
        .bind(coin_id)
        .fetch_one(&self.pool)
        .await
        .context("Failed to query latest candle")?;

        Ok(row.0)
    }
}
