//! Annotation repository.
//!
//! Holds the unprocessed-work queries (a set difference between raw events
//! and annotation projections) and the two upsert policies.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::models::{AnnotationKind, MorphologyRow, SentimentRow, WorkItem};
use crate::store::AnnotationStore;

/// Repository for `community_analysis` rows.
#[derive(Debug, Clone)]
pub struct AnnotationRepository {
    pool: PgPool,
}

impl AnnotationRepository {
    /// Creates a new repository instance.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Counts annotations with morphology and with sentiment.
    ///
    /// # Errors
    /// Returns an error if the database query fails.
    pub async fn coverage(&self) -> Result<(i64, i64)> {
        let row: (i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE nouns IS NOT NULL),
                COUNT(*) FILTER (WHERE sentiment IS NOT NULL)
            FROM community_analysis
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to count annotation coverage")?;

        Ok(row)
    }
}

/// Set-difference query for each annotation kind.
///
/// `$1` is an optional lower bound on the event timestamp.
fn unprocessed_query(kind: AnnotationKind) -> &'static str {
    match kind {
        AnnotationKind::Morphology => {
            r#"
            SELECT r.reaction_id, r.timestamp, r.reaction_text
            FROM community_reactions r
            WHERE ($1::timestamptz IS NULL OR r.timestamp > $1)
              AND NOT EXISTS (
                  SELECT 1 FROM community_analysis a
                  WHERE a.reaction_id = r.reaction_id
                    AND a.timestamp = r.timestamp
                    AND a.nouns IS NOT NULL
              )
            ORDER BY r.timestamp ASC
            "#
        }
        AnnotationKind::Sentiment => {
            r#"
            SELECT r.reaction_id, r.timestamp, r.reaction_text
            FROM community_reactions r
            WHERE ($1::timestamptz IS NULL OR r.timestamp > $1)
              AND NOT EXISTS (
                  SELECT 1 FROM community_analysis a
                  WHERE a.reaction_id = r.reaction_id
                    AND a.timestamp = r.timestamp
                    AND a.sentiment IS NOT NULL
              )
            ORDER BY r.timestamp ASC
            "#
        }
        AnnotationKind::MentionLink => {
            r#"
            SELECT r.reaction_id, r.timestamp, r.reaction_text
            FROM community_reactions r
            WHERE ($1::timestamptz IS NULL OR r.timestamp > $1)
              AND NOT EXISTS (
                  SELECT 1
                  FROM community_analysis a
                  JOIN community_analysis_coins c ON c.analysis_id = a.analysis_id
                  WHERE a.reaction_id = r.reaction_id
                    AND a.timestamp = r.timestamp
              )
            ORDER BY r.timestamp ASC
            "#
        }
    }
}

#[async_trait]
impl AnnotationStore for AnnotationRepository {
    async fn select_unprocessed(
        &self,
        kind: AnnotationKind,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<WorkItem>> {
        let items = sqlx::query_as::<_, WorkItem>(unprocessed_query(kind))
            .bind(since)
            .fetch_all(&self.pool)
            .await
            .with_context(|| format!("Failed to select unprocessed {} work", kind.as_str()))?;

        Ok(items)
    }

    async fn upsert_morphology(&self, rows: &[MorphologyRow]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;
        let mut written = 0u64;

        for row in rows {
            // A sentiment-only row may already exist; fill its word lists once
            let result = sqlx::query(
                r#"
                INSERT INTO community_analysis
                    (reaction_id, timestamp, nouns, adjectives, verbs, interjections)
                VALUES ($1, $2, $3, $4, $5, $6)
                ON CONFLICT (reaction_id, timestamp) DO UPDATE
                SET nouns = EXCLUDED.nouns,
                    adjectives = EXCLUDED.adjectives,
                    verbs = EXCLUDED.verbs,
                    interjections = EXCLUDED.interjections
                WHERE community_analysis.nouns IS NULL
                "#,
            )
            .bind(row.key.reaction_id)
            .bind(row.key.timestamp)
            .bind(&row.tags.nouns)
            .bind(&row.tags.adjectives)
            .bind(&row.tags.verbs)
            .bind(&row.tags.interjections)
            .execute(&mut *tx)
            .await
            .context("Failed to upsert morphology")?;

            written += result.rows_affected();
        }

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(written)
    }

    async fn upsert_sentiment(&self, rows: &[SentimentRow]) -> Result<u64> {
        if rows.is_empty() {
            return Ok(0);
        }

        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;
        let mut written = 0u64;

        for row in rows {
            let result = sqlx::query(
                r#"
                INSERT INTO community_analysis (reaction_id, timestamp, sentiment)
                VALUES ($1, $2, $3)
                ON CONFLICT (reaction_id, timestamp) DO UPDATE
                SET sentiment = EXCLUDED.sentiment
                "#,
            )
            .bind(row.key.reaction_id)
            .bind(row.key.timestamp)
            .bind(row.sentiment.as_str())
            .execute(&mut *tx)
            .await
            .context("Failed to upsert sentiment")?;

            written += result.rows_affected();
        }

        tx.commit().await.context("Failed to commit transaction")?;
        Ok(written)
    }
}
