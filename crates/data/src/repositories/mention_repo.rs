//! Entity alias and mention-link repository.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use std::collections::HashMap;
use uuid::Uuid;

use crate::models::{EntityAlias, EntityMentionRecord, EventKey};
use crate::store::MentionStore;

/// Repository for `coins`/`coin_aliases` reads and `community_analysis_coins` writes.
#[derive(Debug, Clone)]
pub struct MentionRepository {
    pool: PgPool,
}

impl MentionRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Counts mention rows.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn count(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM community_analysis_coins")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count mentions")?;

        Ok(row.0)
    }
}

#[async_trait]
impl MentionStore for MentionRepository {
    async fn load_aliases(&self) -> Result<Vec<EntityAlias>> {
        let aliases = sqlx::query_as::<_, EntityAlias>(
            r#"
            SELECT coin_id, coin_name AS alias FROM coins
            UNION
            SELECT coin_id, alias FROM coin_aliases
            ORDER BY coin_id, alias
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to load coin aliases")?;

        Ok(aliases)
    }

    async fn resolve_annotation_ids(&self, keys: &[EventKey]) -> Result<HashMap<EventKey, i64>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }

        let reaction_ids: Vec<Uuid> = keys.iter().map(|k| k.reaction_id).collect();
        let timestamps: Vec<DateTime<Utc>> = keys.iter().map(|k| k.timestamp).collect();

        let rows: Vec<(i64, Uuid, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT a.analysis_id, a.reaction_id, a.timestamp
            FROM community_analysis a
            JOIN UNNEST($1::uuid[], $2::timestamptz[]) AS k(reaction_id, timestamp)
              ON a.reaction_id = k.reaction_id AND a.timestamp = k.timestamp
            "#,
        )
        .bind(&reaction_ids)
        .bind(&timestamps)
        .fetch_all(&self.pool)
        .await
        .context("Failed to resolve annotation ids")?;

        Ok(rows
            .into_iter()
            .map(|(id, reaction_id, timestamp)| (EventKey::new(reaction_id, timestamp), id))
            .collect())
    }

    async fn insert_mentions(&self, mentions: &[EntityMentionRecord]) -> Result<u64> {
        if mentions.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;
        let mut inserted = 0u64;

        for mention in mentions {
            let result = sqlx::query(
                r#"
                INSERT INTO community_analysis_coins (analysis_id, timestamp, coin_id)
                VALUES ($1, $2, $3)
                ON CONFLICT DO NOTHING
                "#,
            )
            .bind(mention.analysis_id)
            .bind(mention.timestamp)
            .bind(mention.coin_id)
            .execute(&mut *tx)
            .await
            .context("Failed to insert mention")?;

            inserted += result.rows_affected();
        }

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(inserted)
    }
}
