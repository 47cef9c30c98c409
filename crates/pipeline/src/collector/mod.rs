//! Paginated hourly candle collection.
//!
//! Two entry points share one per-entity worker:
//! - refresh: the latest few candles of every tracked entity
//! - backfill: walk backward page by page until a boundary or the source runs out
//!
//! Entities are processed concurrently up to `max_concurrency`; the
//! source's rate limiter is shared, so the quota is global. A failing
//! entity is logged and skipped without affecting the others.

pub mod pagination;
pub mod source;
pub mod upbit;

pub use pagination::{next_page_state, normalize_candle, normalize_volume, DoneReason, PageState};
pub use source::{CandlePage, SeriesPoint, SeriesSource, SourceError};
pub use upbit::UpbitClient;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use coin_pulse_core::{CollectorConfig, PipelineError, StopFlag};
use coin_pulse_data::{CandleStore, SeriesCandleRecord, TrackedEntity};
use futures_util::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Historical range for a backfill run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackfillRange {
    /// Walk back from `to` (or now) until `from` (or the start of the series).
    Explicit {
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    },
    /// Walk back from now until each entity's newest stored candle.
    Resume,
}

#[derive(Debug, Clone, Copy)]
enum Mode {
    Refresh,
    Backfill(BackfillRange),
}

/// Counters for one entity.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityReport {
    pub requests: u64,
    pub fetched: u64,
    pub malformed: u64,
    pub inserted: u64,
    pub stopped: bool,
}

/// Statistics for a collector run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectorStats {
    /// Entities the run attempted
    pub entities: u64,
    /// Tracked entities not listed by the source
    pub unlisted: u64,
    /// Entities skipped after an error
    pub failed: u64,
    pub requests: u64,
    pub fetched: u64,
    pub malformed: u64,
    pub inserted: u64,
    pub stopped: bool,
}

impl CollectorStats {
    fn absorb(&mut self, report: &EntityReport) {
        self.requests += report.requests;
        self.fetched += report.fetched;
        self.malformed += report.malformed;
        self.inserted += report.inserted;
        self.stopped |= report.stopped;
    }

    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Entities: {}, Unlisted: {}, Failed: {}, Requests: {}, Candles: {}, Malformed: {}, Inserted: {}{}",
            self.entities,
            self.unlisted,
            self.failed,
            self.requests,
            self.fetched,
            self.malformed,
            self.inserted,
            if self.stopped { " (stopped)" } else { "" }
        )
    }
}

/// Collects hourly candles for every tracked entity.
pub struct SeriesCollector {
    source: Arc<dyn SeriesSource>,
    store: Arc<dyn CandleStore>,
    config: CollectorConfig,
    stop: StopFlag,
}

impl SeriesCollector {
    #[must_use]
    pub fn new(
        source: Arc<dyn SeriesSource>,
        store: Arc<dyn CandleStore>,
        config: CollectorConfig,
    ) -> Self {
        Self {
            source,
            store,
            config,
            stop: StopFlag::new(),
        }
    }

    #[must_use]
    pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    /// Stores the latest `refresh_count` candles of every tracked entity.
    ///
    /// # Errors
    /// Returns an error only if the entity list or market list cannot be loaded.
    pub async fn refresh_all(&self) -> Result<CollectorStats> {
        self.run(Mode::Refresh).await
    }

    /// Walks the requested history of every tracked entity.
    ///
    /// # Errors
    /// Returns an error only if the entity list or market list cannot be loaded.
    pub async fn backfill_all(&self, range: BackfillRange) -> Result<CollectorStats> {
        self.run(Mode::Backfill(range)).await
    }

    async fn run(&self, mode: Mode) -> Result<CollectorStats> {
        let (entities, unlisted) = self.tracked_entities().await?;
        let mut stats = CollectorStats {
            entities: entities.len() as u64,
            unlisted,
            ..Default::default()
        };

        // pages stored before a failure are committed, so partial reports count
        let results: Vec<(TrackedEntity, EntityReport, Result<()>)> = stream::iter(entities)
            .map(|entity| async move {
                let mut report = EntityReport::default();
                let result = self.collect_entity(&entity, mode, &mut report).await;
                (entity, report, result)
            })
            .buffer_unordered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        for (entity, report, result) in results {
            stats.absorb(&report);
            match result {
                Ok(()) => {}
                Err(e) if matches!(e.downcast_ref::<PipelineError>(), Some(PipelineError::Stopped)) => {
                    stats.stopped = true;
                }
                Err(e) => {
                    stats.failed += 1;
                    tracing::error!(
                        entity_id = entity.coin_id,
                        symbol = %entity.symbol,
                        requests = report.requests,
                        inserted = report.inserted,
                        "Skipping entity: {e:#}"
                    );
                }
            }
        }

        tracing::info!(source = self.source.name(), ?mode, "Collector run complete: {}", stats.summary());
        Ok(stats)
    }

    /// Tracked entities that the source lists, and the number left out.
    async fn tracked_entities(&self) -> Result<(Vec<TrackedEntity>, u64)> {
        let entities = self
            .store
            .list_entities()
            .await
            .context("Failed to load tracked entities")?;
        let listed: HashSet<String> = self
            .source
            .list_markets()
            .await
            .context("Failed to list source markets")?
            .into_iter()
            .collect();

        let (tracked, unlisted): (Vec<_>, Vec<_>) = entities
            .into_iter()
            .partition(|e| listed.contains(&e.symbol));

        for entity in &unlisted {
            tracing::info!(symbol = %entity.symbol, name = %entity.coin_name, "Not listed at source, skipping");
        }

        Ok((tracked, unlisted.len() as u64))
    }

    async fn collect_entity(
        &self,
        entity: &TrackedEntity,
        mode: Mode,
        report: &mut EntityReport,
    ) -> Result<()> {
        if self.stop.is_stopped() {
            return Err(PipelineError::Stopped.into());
        }

        match mode {
            Mode::Refresh => self.refresh_entity(entity, report).await,
            Mode::Backfill(BackfillRange::Explicit { from, to }) => {
                self.backfill_entity(entity, to, from, report).await
            }
            Mode::Backfill(BackfillRange::Resume) => {
                let latest = self
                    .store
                    .latest_candle_timestamp(entity.coin_id)
                    .await
                    .context("Failed to read latest stored candle")?;
                tracing::debug!(symbol = %entity.symbol, ?latest, "Resuming backfill");
                self.backfill_entity(entity, None, latest, report).await
            }
        }
    }

    async fn refresh_entity(&self, entity: &TrackedEntity, report: &mut EntityReport) -> Result<()> {
        let page = self
            .source
            .fetch_page(&entity.symbol, self.config.refresh_count, None)
            .await
            .with_context(|| format!("Failed to fetch latest candles for {}", entity.symbol))?;

        report.requests += 1;
        let inserted = self.store_page(entity, &page, report).await?;
        report.inserted += inserted;
        self.pause().await;

        Ok(())
    }

    /// Walks one entity backward from `cursor` until `boundary`.
    ///
    /// Every page is stored before the next is requested, so an interrupted
    /// walk can be resumed without refetching what was kept.
    ///
    /// Counters accumulate in `report` page by page, so a walk that fails
    /// part way still accounts for the pages it stored.
    async fn backfill_entity(
        &self,
        entity: &TrackedEntity,
        mut cursor: Option<DateTime<Utc>>,
        boundary: Option<DateTime<Utc>>,
        report: &mut EntityReport,
    ) -> Result<()> {
        loop {
            let page = self
                .source
                .fetch_page(&entity.symbol, self.config.page_size, cursor)
                .await
                .with_context(|| {
                    format!("Failed to fetch {} candles before {cursor:?}", entity.symbol)
                })?;
            report.requests += 1;
            let inserted = self.store_page(entity, &page, report).await?;
            report.inserted += inserted;

            let state = next_page_state(&page, self.config.page_size, boundary)
                .with_context(|| format!("Cannot continue {} backfill", entity.symbol))?;
            match state {
                PageState::Done(reason) => {
                    tracing::info!(
                        symbol = %entity.symbol,
                        ?reason,
                        requests = report.requests,
                        inserted = report.inserted,
                        "Backfill finished"
                    );
                    break;
                }
                PageState::MorePages { cursor: next } => {
                    tracing::debug!(symbol = %entity.symbol, cursor = %next, "Fetching next page");
                    cursor = Some(next);
                }
            }

            self.pause().await;
            if self.stop.is_stopped() {
                tracing::info!(symbol = %entity.symbol, "Stop requested, ending backfill");
                report.stopped = true;
                break;
            }
        }

        Ok(())
    }

    async fn store_page(
        &self,
        entity: &TrackedEntity,
        page: &CandlePage,
        report: &mut EntityReport,
    ) -> Result<u64> {
        report.fetched += page.points.len() as u64;
        report.malformed += page.malformed as u64;

        let candles: Vec<SeriesCandleRecord> = page
            .points
            .iter()
            .map(|point| normalize_candle(entity.coin_id, point))
            .collect();

        self.store
            .insert_candles(&candles)
            .await
            .with_context(|| format!("Failed to store candles for {}", entity.symbol))
    }

    async fn pause(&self) {
        if self.config.request_delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.request_delay_ms)).await;
        }
    }
}
