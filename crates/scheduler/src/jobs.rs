//! Job registry shared by the scheduler and the CLI.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use coin_pulse_core::{AppConfig, DatabaseConfig, DbRole, StopFlag};
use coin_pulse_data::{
    AnnotationStore, CandleStore, DatabaseClient, EventStore, MemoryStore, MentionStore,
    Repositories, TrendStore,
};
use coin_pulse_pipeline::{
    AnalysisServices, BatchAnnotator, ChatImporter, MentionLinker, SeriesCollector, SeriesSource,
    TrendDetector, TrendStats, UpbitClient,
};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Periodic jobs, one per cron expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineJob {
    Morphology,
    Sentiment,
    Mentions,
    Trends,
    SeriesRefresh,
}

impl PipelineJob {
    pub const ALL: [PipelineJob; 5] = [
        PipelineJob::Morphology,
        PipelineJob::Sentiment,
        PipelineJob::Mentions,
        PipelineJob::Trends,
        PipelineJob::SeriesRefresh,
    ];

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            PipelineJob::Morphology => "morphology",
            PipelineJob::Sentiment => "sentiment",
            PipelineJob::Mentions => "mentions",
            PipelineJob::Trends => "trends",
            PipelineJob::SeriesRefresh => "series-refresh",
        }
    }

    /// Database role the job's writes go through.
    #[must_use]
    pub fn role(&self) -> DbRole {
        match self {
            PipelineJob::SeriesRefresh => DbRole::Collector,
            _ => DbRole::Scheduler,
        }
    }
}

impl fmt::Display for PipelineJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Storage handles for every job, possibly backed by different roles.
#[derive(Clone)]
pub struct Stores {
    pub events: Arc<dyn EventStore>,
    pub annotations: Arc<dyn AnnotationStore>,
    pub mentions: Arc<dyn MentionStore>,
    pub candles: Arc<dyn CandleStore>,
    pub trends: Arc<dyn TrendStore>,
}

impl Stores {
    #[must_use]
    pub fn from_memory(store: Arc<MemoryStore>) -> Self {
        Self {
            events: store.clone(),
            annotations: store.clone(),
            mentions: store.clone(),
            candles: store.clone(),
            trends: store,
        }
    }

    /// Candles come from the collector role's pool, everything else from
    /// the scheduler role's.
    #[must_use]
    pub fn from_repositories(scheduler: Repositories, collector: Repositories) -> Self {
        Self {
            events: Arc::new(scheduler.events),
            annotations: Arc::new(scheduler.annotations),
            mentions: Arc::new(scheduler.mentions),
            candles: Arc::new(collector.candles),
            trends: Arc::new(scheduler.trends),
        }
    }

    /// Every store on a single role's pool, for one-off commands.
    ///
    /// # Errors
    /// Returns an error if the connection cannot be established.
    pub async fn for_role(config: &DatabaseConfig, role: DbRole) -> Result<Self> {
        let client = DatabaseClient::connect(config, role).await?;
        Ok(Self::from_repositories(
            client.repositories(),
            client.repositories(),
        ))
    }

    /// Opens one pool per role.
    ///
    /// # Errors
    /// Returns an error if either connection cannot be established.
    pub async fn connect(config: &DatabaseConfig) -> Result<Self> {
        let scheduler = DatabaseClient::connect(config, DbRole::Scheduler).await?;
        let collector = DatabaseClient::connect(config, DbRole::Collector).await?;
        Ok(Self::from_repositories(
            scheduler.repositories(),
            collector.repositories(),
        ))
    }
}

/// The wired-up jobs for one process, sharing a stop flag.
pub struct PipelineJobs {
    annotator: BatchAnnotator,
    linker: MentionLinker,
    collector: SeriesCollector,
    detector: TrendDetector,
    importer: ChatImporter,
    // trend signals are appended without dedup, so detector runs never overlap
    trend_lock: Mutex<()>,
}

impl PipelineJobs {
    /// Builds every job from configuration, using the analysis service and
    /// the exchange client the configuration names.
    ///
    /// # Errors
    /// Returns an error if a client cannot be built or the timezone is unknown.
    pub fn from_config(stores: &Stores, config: &AppConfig, stop: StopFlag) -> Result<Self> {
        let services = AnalysisServices::from_config(&config.annotator)?;
        let source = Arc::new(
            UpbitClient::new(&config.collector).context("Failed to build exchange client")?,
        );
        Self::new(stores, services, source, config, stop)
    }

    /// # Errors
    /// Returns an error if the configured timezone is unknown.
    pub fn new(
        stores: &Stores,
        services: AnalysisServices,
        source: Arc<dyn SeriesSource>,
        config: &AppConfig,
        stop: StopFlag,
    ) -> Result<Self> {
        let tz = config.trend.tz()?;

        Ok(Self {
            annotator: BatchAnnotator::new(
                stores.annotations.clone(),
                services.tagger,
                services.classifier,
                config.annotator.clone(),
            )
            .with_stop_flag(stop.clone()),
            linker: MentionLinker::new(
                stores.mentions.clone(),
                stores.annotations.clone(),
                config.mentions.clone(),
            )
            .with_stop_flag(stop.clone()),
            collector: SeriesCollector::new(
                source,
                stores.candles.clone(),
                config.collector.clone(),
            )
            .with_stop_flag(stop.clone()),
            detector: TrendDetector::new(stores.trends.clone(), &config.trend)?
                .with_stop_flag(stop),
            importer: ChatImporter::new(stores.events.clone(), tz),
            trend_lock: Mutex::new(()),
        })
    }

    #[must_use]
    pub fn collector(&self) -> &SeriesCollector {
        &self.collector
    }

    #[must_use]
    pub fn importer(&self) -> &ChatImporter {
        &self.importer
    }

    /// Runs the detector over an explicit day range, after any run in progress.
    ///
    /// # Errors
    /// Returns an error if a count query or the append fails.
    pub async fn detect_trends(&self, start: NaiveDate, end: NaiveDate) -> Result<TrendStats> {
        let _guard = self.trend_lock.lock().await;
        self.detector.detect(start, end).await
    }

    /// Runs one periodic job and returns its statistics summary.
    ///
    /// # Errors
    /// Returns whatever error aborted the job.
    pub async fn run(&self, job: PipelineJob) -> Result<String> {
        let summary = match job {
            PipelineJob::Morphology => self.annotator.run_morphology().await?.summary(),
            PipelineJob::Sentiment => self.annotator.run_sentiment().await?.summary(),
            PipelineJob::Mentions => self.linker.run().await?.summary(),
            PipelineJob::Trends => {
                let _guard = self.trend_lock.lock().await;
                self.detector.run_recent(Utc::now()).await?.summary()
            }
            PipelineJob::SeriesRefresh => self.collector.refresh_all().await?.summary(),
        };
        Ok(summary)
    }
}
