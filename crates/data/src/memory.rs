//! In-memory record store.
//!
//! Implements every storage trait with the same conflict policies as the
//! PostgreSQL repositories. Used by tests and by dry runs.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use uuid::Uuid;

use crate::models::{
    AnnotationKind, AnnotationRecord, EntityAlias, EntityMentionRecord, EventKey, MorphologyRow,
    NewRawEvent, RawEventRecord, SentimentRow, SeriesCandleRecord, TrackedEntity,
    TrendSignalRecord, WorkItem,
};
use crate::store::{AnnotationStore, CandleStore, EventStore, MentionStore, TrendStore};

#[derive(Debug, Default)]
struct State {
    events: Vec<RawEventRecord>,
    event_dedup: HashSet<(DateTime<Utc>, String, String)>,
    annotations: BTreeMap<EventKey, AnnotationRecord>,
    next_analysis_id: i64,
    mentions: BTreeSet<EntityMentionRecord>,
    entities: Vec<TrackedEntity>,
    aliases: Vec<EntityAlias>,
    candles: BTreeMap<(i32, DateTime<Utc>), SeriesCandleRecord>,
    signals: Vec<TrendSignalRecord>,
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a tracked entity. Its canonical name becomes an alias.
    pub fn add_entity(&self, entity: TrackedEntity, extra_aliases: &[&str]) {
        let mut state = self.state.lock();
        state
            .aliases
            .push(EntityAlias::new(entity.coin_id, entity.coin_name.clone()));
        for alias in extra_aliases {
            state.aliases.push(EntityAlias::new(entity.coin_id, *alias));
        }
        state.entities.push(entity);
    }

    /// Returns every stored event, in insertion order.
    #[must_use]
    pub fn events(&self) -> Vec<RawEventRecord> {
        self.state.lock().events.clone()
    }

    /// Returns every annotation row, ordered by event key.
    #[must_use]
    pub fn annotations(&self) -> Vec<AnnotationRecord> {
        self.state.lock().annotations.values().cloned().collect()
    }

    #[must_use]
    pub fn annotation(&self, key: &EventKey) -> Option<AnnotationRecord> {
        self.state.lock().annotations.get(key).cloned()
    }

    #[must_use]
    pub fn mentions(&self) -> Vec<EntityMentionRecord> {
        self.state.lock().mentions.iter().copied().collect()
    }

    #[must_use]
    pub fn candles(&self) -> Vec<SeriesCandleRecord> {
        self.state.lock().candles.values().cloned().collect()
    }

    #[must_use]
    pub fn signals(&self) -> Vec<TrendSignalRecord> {
        self.state.lock().signals.clone()
    }

    fn annotation_entry(state: &mut State, key: EventKey) -> &mut AnnotationRecord {
        let State {
            annotations,
            next_analysis_id,
            ..
        } = state;
        annotations.entry(key).or_insert_with(|| {
            *next_analysis_id += 1;
            AnnotationRecord {
                analysis_id: *next_analysis_id,
                reaction_id: key.reaction_id,
                timestamp: key.timestamp,
                nouns: None,
                adjectives: None,
                verbs: None,
                interjections: None,
                sentiment: None,
            }
        })
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn insert_events(&self, events: &[NewRawEvent]) -> Result<u64> {
        let mut state = self.state.lock();
        let mut inserted = 0u64;

        for event in events {
            let natural_key = (event.timestamp, event.chat_name.clone(), event.sender.clone());
            if !state.event_dedup.insert(natural_key) {
                continue;
            }
            state.events.push(RawEventRecord {
                reaction_id: Uuid::new_v4(),
                timestamp: event.timestamp,
                reaction_text: event.reaction_text.clone(),
                chat_name: event.chat_name.clone(),
                sender: event.sender.clone(),
                source: event.source.clone(),
            });
            inserted += 1;
        }

        Ok(inserted)
    }
}

#[async_trait]
impl AnnotationStore for MemoryStore {
    async fn select_unprocessed(
        &self,
        kind: AnnotationKind,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<WorkItem>> {
        let state = self.state.lock();

        let linked: HashSet<i64> = state.mentions.iter().map(|m| m.analysis_id).collect();
        let processed = |key: &EventKey| -> bool {
            let Some(row) = state.annotations.get(key) else {
                return false;
            };
            match kind {
                AnnotationKind::Morphology => row.nouns.is_some(),
                AnnotationKind::Sentiment => row.sentiment.is_some(),
                AnnotationKind::MentionLink => linked.contains(&row.analysis_id),
            }
        };

        let mut items: Vec<WorkItem> = state
            .events
            .iter()
            .filter(|e| since.map_or(true, |s| e.timestamp > s))
            .filter(|e| !processed(&e.key()))
            .map(WorkItem::from)
            .collect();
        items.sort_by_key(|item| item.timestamp);

        Ok(items)
    }

    async fn upsert_morphology(&self, rows: &[MorphologyRow]) -> Result<u64> {
        let mut state = self.state.lock();
        let mut written = 0u64;

        for row in rows {
            let record = Self::annotation_entry(&mut state, row.key);
            if record.nouns.is_some() {
                continue;
            }
            record.nouns = Some(row.tags.nouns.clone());
            record.adjectives = Some(row.tags.adjectives.clone());
            record.verbs = Some(row.tags.verbs.clone());
            record.interjections = Some(row.tags.interjections.clone());
            written += 1;
        }

        Ok(written)
    }

    async fn upsert_sentiment(&self, rows: &[SentimentRow]) -> Result<u64> {
        let mut state = self.state.lock();

        for row in rows {
            let record = Self::annotation_entry(&mut state, row.key);
            record.sentiment = Some(row.sentiment.as_str().to_string());
        }

        Ok(rows.len() as u64)
    }
}

#[async_trait]
impl MentionStore for MemoryStore {
    async fn load_aliases(&self) -> Result<Vec<EntityAlias>> {
        Ok(self.state.lock().aliases.clone())
    }

    async fn resolve_annotation_ids(&self, keys: &[EventKey]) -> Result<HashMap<EventKey, i64>> {
        let state = self.state.lock();
        Ok(keys
            .iter()
            .filter_map(|key| state.annotations.get(key).map(|a| (*key, a.analysis_id)))
            .collect())
    }

    async fn insert_mentions(&self, mentions: &[EntityMentionRecord]) -> Result<u64> {
        let mut state = self.state.lock();
        Ok(mentions
            .iter()
            .filter(|m| state.mentions.insert(**m))
            .count() as u64)
    }
}

#[async_trait]
impl CandleStore for MemoryStore {
    async fn list_entities(&self) -> Result<Vec<TrackedEntity>> {
        Ok(self.state.lock().entities.clone())
    }

    async fn insert_candles(&self, candles: &[SeriesCandleRecord]) -> Result<u64> {
        let mut state = self.state.lock();
        let mut inserted = 0u64;

        for candle in candles {
            let key = (candle.coin_id, candle.timestamp);
            if state.candles.contains_key(&key) {
                continue;
            }
            state.candles.insert(key, candle.clone());
            inserted += 1;
        }

        Ok(inserted)
    }

    async fn latest_candle_timestamp(&self, coin_id: i32) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .state
            .lock()
            .candles
            .keys()
            .filter(|(id, _)| *id == coin_id)
            .map(|(_, ts)| *ts)
            .max())
    }
}

#[async_trait]
impl TrendStore for MemoryStore {
    async fn count_mentions(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HashMap<i32, i64>> {
        let state = self.state.lock();
        let mut counts = HashMap::new();

        for mention in state
            .mentions
            .iter()
            .filter(|m| m.timestamp >= start && m.timestamp < end)
        {
            *counts.entry(mention.coin_id).or_insert(0) += 1;
        }

        Ok(counts)
    }

    async fn append_signals(&self, signals: &[TrendSignalRecord]) -> Result<u64> {
        let mut state = self.state.lock();
        state.signals.extend_from_slice(signals);
        Ok(signals.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use coin_pulse_core::{MorphologyTags, Sentiment};
    use rust_decimal_macros::dec;

    fn ts(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 1, hour, 0, 0).unwrap()
    }

    fn event(hour: u32, sender: &str, text: &str) -> NewRawEvent {
        NewRawEvent::new(ts(hour), text, "코인방", sender, "Telegram")
    }

    fn candle(coin_id: i32, hour: u32, close: rust_decimal::Decimal) -> SeriesCandleRecord {
        SeriesCandleRecord {
            coin_id,
            timestamp: ts(hour),
            open: close,
            high: close,
            low: close,
            close,
            volume: dec!(1),
        }
    }

    // ============================================
    // Event Tests
    // ============================================

    #[tokio::test]
    async fn test_reimport_of_same_message_is_skipped() {
        let store = MemoryStore::new();
        let first = store.insert_events(&[event(1, "alice", "hi")]).await.unwrap();
        let second = store
            .insert_events(&[event(1, "alice", "hi again"), event(2, "alice", "later")])
            .await
            .unwrap();

        assert_eq!(first, 1);
        assert_eq!(second, 1);
        assert_eq!(store.events().len(), 2);
    }

    // ============================================
    // Annotation Tests
    // ============================================

    #[tokio::test]
    async fn test_morphology_first_write_wins() {
        let store = MemoryStore::new();
        store.insert_events(&[event(1, "alice", "hi")]).await.unwrap();
        let key = store.events()[0].key();

        let first = MorphologyRow {
            key,
            tags: MorphologyTags {
                nouns: vec!["비트코인".to_string()],
                ..Default::default()
            },
        };
        let second = MorphologyRow {
            key,
            tags: MorphologyTags {
                nouns: vec!["이더리움".to_string()],
                ..Default::default()
            },
        };

        assert_eq!(store.upsert_morphology(&[first]).await.unwrap(), 1);
        assert_eq!(store.upsert_morphology(&[second]).await.unwrap(), 0);
        assert_eq!(
            store.annotation(&key).unwrap().nouns,
            Some(vec!["비트코인".to_string()])
        );
    }

    #[tokio::test]
    async fn test_sentiment_overwrites_and_keeps_morphology() {
        let store = MemoryStore::new();
        store.insert_events(&[event(1, "alice", "hi")]).await.unwrap();
        let key = store.events()[0].key();

        store
            .upsert_morphology(&[MorphologyRow {
                key,
                tags: MorphologyTags::default(),
            }])
            .await
            .unwrap();
        store
            .upsert_sentiment(&[SentimentRow {
                key,
                sentiment: Sentiment::Neutral,
            }])
            .await
            .unwrap();
        store
            .upsert_sentiment(&[SentimentRow {
                key,
                sentiment: Sentiment::Positive,
            }])
            .await
            .unwrap();

        let row = store.annotation(&key).unwrap();
        assert_eq!(row.parsed_sentiment(), Some(Sentiment::Positive));
        assert!(row.has_morphology());
        assert_eq!(store.annotations().len(), 1);
    }

    #[tokio::test]
    async fn test_sentiment_only_row_still_needs_morphology() {
        let store = MemoryStore::new();
        store.insert_events(&[event(1, "alice", "hi")]).await.unwrap();
        let key = store.events()[0].key();

        store
            .upsert_sentiment(&[SentimentRow {
                key,
                sentiment: Sentiment::Negative,
            }])
            .await
            .unwrap();

        let pending = store
            .select_unprocessed(AnnotationKind::Morphology, None)
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);

        let done = store
            .select_unprocessed(AnnotationKind::Sentiment, None)
            .await
            .unwrap();
        assert!(done.is_empty());
    }

    #[tokio::test]
    async fn test_select_unprocessed_respects_since() {
        let store = MemoryStore::new();
        store
            .insert_events(&[event(1, "alice", "old"), event(5, "bob", "new")])
            .await
            .unwrap();

        let items = store
            .select_unprocessed(AnnotationKind::Morphology, Some(ts(1)))
            .await
            .unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].reaction_text, "new");
    }

    // ============================================
    // Mention Tests
    // ============================================

    #[tokio::test]
    async fn test_mentions_are_deduplicated_and_counted_half_open() {
        let store = MemoryStore::new();
        let mention = EntityMentionRecord {
            analysis_id: 1,
            timestamp: ts(3),
            coin_id: 1,
        };

        assert_eq!(store.insert_mentions(&[mention, mention]).await.unwrap(), 1);

        let inside = store.count_mentions(ts(3), ts(4)).await.unwrap();
        assert_eq!(inside.get(&1), Some(&1));

        let before = store.count_mentions(ts(3) - Duration::hours(1), ts(3)).await.unwrap();
        assert!(before.is_empty());
    }

    // ============================================
    // Candle Tests
    // ============================================

    #[tokio::test]
    async fn test_candles_first_write_wins() {
        let store = MemoryStore::new();
        assert_eq!(store.insert_candles(&[candle(1, 2, dec!(100))]).await.unwrap(), 1);
        assert_eq!(store.insert_candles(&[candle(1, 2, dec!(999))]).await.unwrap(), 0);

        let candles = store.candles();
        assert_eq!(candles.len(), 1);
        assert_eq!(candles[0].close, dec!(100));
        assert_eq!(store.latest_candle_timestamp(1).await.unwrap(), Some(ts(2)));
        assert_eq!(store.latest_candle_timestamp(2).await.unwrap(), None);
    }
}
