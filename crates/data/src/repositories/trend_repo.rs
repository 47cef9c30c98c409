//! Trend signal repository.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;

use crate::models::TrendSignalRecord;
use crate::store::TrendStore;

/// Repository for the `recommendations` log and mention-count windows.
#[derive(Debug, Clone)]
pub struct TrendSignalRepository {
    pool: PgPool,
}

impl TrendSignalRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets the most recent signals.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn get_recent(&self, limit: i64) -> Result<Vec<TrendSignalRecord>> {
        let records = sqlx::query_as::<_, TrendSignalRecord>(
            r#"
            SELECT coin_id, timestamp, direction, magnitude, reason
            FROM recommendations
            ORDER BY timestamp DESC, recommendation_id DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to query recent signals")?;

        Ok(records)
    }
}

#[async_trait]
impl TrendStore for TrendSignalRepository {
    async fn count_mentions(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HashMap<i32, i64>> {
        let rows: Vec<(i32, i64)> = sqlx::query_as(
            r#"
            SELECT coin_id, COUNT(*)
            FROM community_analysis_coins
            WHERE timestamp >= $1 AND timestamp < $2
            GROUP BY coin_id
            "#,
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .context("Failed to count mentions")?;

        Ok(rows.into_iter().collect())
    }

    async fn append_signals(&self, signals: &[TrendSignalRecord]) -> Result<u64> {
        if signals.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;
        let mut inserted = 0u64;

        for signal in signals {
            let result = sqlx::query(
                r#"
                INSERT INTO recommendations (coin_id, timestamp, direction, magnitude, reason)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(signal.coin_id)
            .bind(signal.timestamp)
            .bind(&signal.direction)
            .bind(signal.magnitude)
            .bind(&signal.reason)
            .execute(&mut *tx)
            .await
            .context("Failed to insert trend signal")?;

            inserted += result.rows_affected();
        }

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(inserted)
    }
}
