//! Raw community event repository.
//!
//! The pipeline only reads this table; inserts come from chat-export import.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::PgPool;

use super::TableSummary;
use crate::models::NewRawEvent;
use crate::store::EventStore;

/// Repository for raw community events.
#[derive(Debug, Clone)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns row count and time bounds.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn summary(&self) -> Result<TableSummary> {
        let summary = sqlx::query_as::<_, TableSummary>(
            r#"
            SELECT COUNT(*) AS rows, MIN(timestamp) AS earliest, MAX(timestamp) AS latest
            FROM community_reactions
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to summarize community_reactions")?;

        Ok(summary)
    }
}

#[async_trait]
impl EventStore for EventRepository {
    async fn insert_events(&self, events: &[NewRawEvent]) -> Result<u64> {
        if events.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;
        let mut inserted = 0u64;

        for event in events {
            let result = sqlx::query(
                r#"
                INSERT INTO community_reactions (timestamp, reaction_text, chat_name, sender, source)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (timestamp, chat_name, sender) DO NOTHING
                "#,
            )
            .bind(event.timestamp)
            .bind(&event.reaction_text)
            .bind(&event.chat_name)
            .bind(&event.sender)
            .bind(&event.source)
            .execute(&mut *tx)
            .await
            .context("Failed to insert community reaction")?;

            inserted += result.rows_affected();
        }

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(inserted)
    }
}
