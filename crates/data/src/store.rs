//! Storage seam between the pipeline and the record store.
//!
//! Every write method is idempotent under its documented conflict policy,
//! which is what makes overlapping runs of the same job safe.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::models::{
    AnnotationKind, EntityAlias, EntityMentionRecord, EventKey, MorphologyRow, NewRawEvent,
    SentimentRow, SeriesCandleRecord, TrackedEntity, TrendSignalRecord, WorkItem,
};

/// Raw event ingestion.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Inserts events, skipping any whose `(timestamp, chat_name, sender)` exists.
    ///
    /// Returns the number of rows actually inserted.
    async fn insert_events(&self, events: &[NewRawEvent]) -> Result<u64>;
}

#[async_trait]
pub trait AnnotationStore: Send + Sync {
    /// Returns raw events lacking a non-null result for `kind`, oldest first.
    ///
    /// `since` bounds the scan to events strictly newer than the instant.
    async fn select_unprocessed(
        &self,
        kind: AnnotationKind,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<WorkItem>>;

    /// Writes word-class lists. An existing morphology result is never replaced.
    async fn upsert_morphology(&self, rows: &[MorphologyRow]) -> Result<u64>;

    /// Writes sentiment labels, replacing any stale label for the same event.
    async fn upsert_sentiment(&self, rows: &[SentimentRow]) -> Result<u64>;
}

#[async_trait]
pub trait MentionStore: Send + Sync {
    /// Loads every `(entity, alias)` pair, canonical names included.
    async fn load_aliases(&self) -> Result<Vec<EntityAlias>>;

    /// Maps event keys to annotation ids. Keys without an annotation are absent.
    async fn resolve_annotation_ids(&self, keys: &[EventKey]) -> Result<HashMap<EventKey, i64>>;

    /// Inserts mention links, skipping duplicates.
    async fn insert_mentions(&self, mentions: &[EntityMentionRecord]) -> Result<u64>;
}

#[async_trait]
pub trait CandleStore: Send + Sync {
    async fn list_entities(&self) -> Result<Vec<TrackedEntity>>;

    /// Inserts candles; the first stored value for `(coin_id, timestamp)` wins.
    async fn insert_candles(&self, candles: &[SeriesCandleRecord]) -> Result<u64>;

    async fn latest_candle_timestamp(&self, coin_id: i32) -> Result<Option<DateTime<Utc>>>;
}

#[async_trait]
pub trait TrendStore: Send + Sync {
    /// Counts mention rows per entity over the half-open range `[start, end)`.
    async fn count_mentions(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HashMap<i32, i64>>;

    /// Appends signals in a single transaction. No deduplication.
    async fn append_signals(&self, signals: &[TrendSignalRecord]) -> Result<u64>;
}
