//! Entity mention extraction and linking.
//!
//! Aliases are matched as case-insensitive literals anchored on a leading
//! word boundary. A longer token that merely starts with an alias still
//! matches ("비트코인캐시" contains "비트코인").

use anyhow::{Context, Result};
use coin_pulse_core::{MentionConfig, StopFlag};
use coin_pulse_data::{
    AnnotationKind, AnnotationStore, EntityAlias, EntityMentionRecord, EventKey, MentionStore,
    WorkItem,
};
use regex::Regex;
use std::collections::BTreeSet;
use std::sync::Arc;

use crate::selector::UnprocessedSelector;

/// Compiled alias table.
#[derive(Debug, Clone)]
pub struct AliasMatcher {
    patterns: Vec<(i32, Regex)>,
}

impl AliasMatcher {
    /// Compiles one pattern per alias. Blank aliases are ignored.
    ///
    /// # Errors
    /// Returns an error if a pattern fails to compile.
    pub fn new(aliases: &[EntityAlias]) -> Result<Self> {
        let mut patterns = Vec::with_capacity(aliases.len());

        for alias in aliases {
            let literal = alias.alias.trim();
            if literal.is_empty() {
                continue;
            }
            let pattern = Regex::new(&format!(r"(?i)\b{}", regex::escape(literal)))
                .with_context(|| format!("Invalid alias '{literal}'"))?;
            patterns.push((alias.coin_id, pattern));
        }

        Ok(Self { patterns })
    }

    /// Returns the entities referenced by `text`. Each entity appears once.
    #[must_use]
    pub fn match_text(&self, text: &str) -> BTreeSet<i32> {
        self.patterns
            .iter()
            .filter(|(_, pattern)| pattern.is_match(text))
            .map(|(coin_id, _)| *coin_id)
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Statistics for one linking run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub scanned: u64,
    /// Events referencing at least one entity
    pub matched: u64,
    /// Matched events without an annotation row yet; retried next run
    pub deferred: u64,
    pub inserted: u64,
    pub batches: u64,
    pub stopped: bool,
}

impl LinkStats {
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Scanned: {}, Matched: {}, Deferred: {}, Inserted: {}, Batches: {}{}",
            self.scanned,
            self.matched,
            self.deferred,
            self.inserted,
            self.batches,
            if self.stopped { " (stopped)" } else { "" }
        )
    }
}

/// Links raw events to the entities they mention.
///
/// A mention can only be stored once the event has an annotation row.
/// Matched events without one are counted as deferred and picked up again
/// by a later run, so linking should be scheduled after annotation.
pub struct MentionLinker {
    store: Arc<dyn MentionStore>,
    selector: UnprocessedSelector,
    config: MentionConfig,
    stop: StopFlag,
}

impl MentionLinker {
    #[must_use]
    pub fn new(
        store: Arc<dyn MentionStore>,
        annotations: Arc<dyn AnnotationStore>,
        config: MentionConfig,
    ) -> Self {
        Self {
            store,
            selector: UnprocessedSelector::new(annotations),
            config,
            stop: StopFlag::new(),
        }
    }

    #[must_use]
    pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    /// Runs one linking pass over every event without mention rows.
    ///
    /// # Errors
    /// Returns an error if the alias table, selection, or a batch write fails.
    pub async fn run(&self) -> Result<LinkStats> {
        let aliases = self
            .store
            .load_aliases()
            .await
            .context("Failed to load entity aliases")?;
        let matcher = AliasMatcher::new(&aliases)?;

        let mut stats = LinkStats::default();
        if matcher.is_empty() {
            tracing::warn!("Alias table is empty, nothing to link");
            return Ok(stats);
        }

        let items = self
            .selector
            .select(AnnotationKind::MentionLink, self.config.lookback_days)
            .await?;
        stats.scanned = items.len() as u64;

        for (index, batch) in items.chunks(self.config.batch_size).enumerate() {
            if self.stop.is_stopped() {
                tracing::info!(batch = index + 1, "Stop requested, ending mention run");
                stats.stopped = true;
                break;
            }

            let inserted = self
                .link_batch(&matcher, batch, &mut stats)
                .await
                .with_context(|| format!("Failed to link mention batch {}", index + 1))?;

            stats.inserted += inserted;
            stats.batches += 1;
            tracing::debug!(batch = index + 1, inserted, "Mention batch committed");
        }

        if stats.deferred > 0 {
            tracing::info!(
                deferred = stats.deferred,
                "Some matched events have no annotation yet and will be retried"
            );
        }
        tracing::info!(aliases = matcher.len(), "Mention run complete: {}", stats.summary());
        Ok(stats)
    }

    async fn link_batch(
        &self,
        matcher: &AliasMatcher,
        batch: &[WorkItem],
        stats: &mut LinkStats,
    ) -> Result<u64> {
        let matches: Vec<(EventKey, BTreeSet<i32>)> = batch
            .iter()
            .map(|item| (item.key(), matcher.match_text(&item.reaction_text)))
            .filter(|(_, entities)| !entities.is_empty())
            .collect();
        stats.matched += matches.len() as u64;

        if matches.is_empty() {
            return Ok(0);
        }

        let keys: Vec<EventKey> = matches.iter().map(|(key, _)| *key).collect();
        let ids = self.store.resolve_annotation_ids(&keys).await?;

        let mut records = Vec::new();
        for (key, entities) in &matches {
            let Some(&analysis_id) = ids.get(key) else {
                stats.deferred += 1;
                continue;
            };
            records.extend(entities.iter().map(|&coin_id| EntityMentionRecord {
                analysis_id,
                timestamp: key.timestamp,
                coin_id,
            }));
        }

        self.store.insert_mentions(&records).await
    }
}
