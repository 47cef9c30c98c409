use crate::error::PipelineError;
use serde::{Deserialize, Serialize};

/// Largest page the candle source serves per request.
pub const MAX_PAGE_SIZE: usize = 200;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub annotator: AnnotatorConfig,
    pub mentions: MentionConfig,
    pub collector: CollectorConfig,
    pub trend: TrendConfig,
    pub scheduler: SchedulerConfig,
}

/// Database role a job connects as.
///
/// The series collector writes only candles and may use a narrower role
/// than the annotation jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbRole {
    Scheduler,
    Collector,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
    pub collector_url: Option<String>,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl DatabaseConfig {
    /// Returns the connection URL for a role.
    #[must_use]
    pub fn url_for(&self, role: DbRole) -> &str {
        match (role, &self.collector_url) {
            (DbRole::Collector, Some(url)) => url,
            _ => &self.url,
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgresql://localhost/coin_pulse".to_string(),
            collector_url: None,
            max_connections: 10,
            acquire_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotatorConfig {
    pub morphology_batch_size: usize,
    pub sentiment_batch_size: usize,
    /// Morphology only looks at events this recent, capping backlog cost.
    pub morphology_lookback_days: Option<i64>,
    /// When set, analysis is delegated to this HTTP service.
    pub analysis_service_url: Option<String>,
    pub analysis_timeout_secs: u64,
}

impl Default for AnnotatorConfig {
    fn default() -> Self {
        Self {
            morphology_batch_size: 1000,
            sentiment_batch_size: 100,
            morphology_lookback_days: Some(30),
            analysis_service_url: None,
            analysis_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MentionConfig {
    pub batch_size: usize,
    pub lookback_days: Option<i64>,
}

impl Default for MentionConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            lookback_days: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    pub base_url: String,
    pub quote_currency: String,
    pub page_size: usize,
    pub refresh_count: usize,
    pub request_delay_ms: u64,
    pub request_timeout_secs: u64,
    pub max_concurrency: usize,
    pub requests_per_second: u32,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.upbit.com".to_string(),
            quote_currency: "KRW".to_string(),
            page_size: MAX_PAGE_SIZE,
            refresh_count: 10,
            request_delay_ms: 500,
            request_timeout_secs: 10,
            max_concurrency: 4,
            requests_per_second: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrendConfig {
    pub window_days: i64,
    pub step_days: i64,
    pub lookback_days: i64,
    /// IANA zone whose local midnight anchors each window.
    pub timezone: String,
}

impl Default for TrendConfig {
    fn default() -> Self {
        Self {
            window_days: 3,
            step_days: 1,
            lookback_days: 90,
            timezone: "Asia/Seoul".to_string(),
        }
    }
}

impl TrendConfig {
    /// Parses the configured timezone.
    ///
    /// # Errors
    /// Returns an error if the name is not a known IANA zone.
    pub fn tz(&self) -> Result<chrono_tz::Tz, PipelineError> {
        self.timezone
            .parse::<chrono_tz::Tz>()
            .map_err(|_| PipelineError::Config(format!("unknown timezone '{}'", self.timezone)))
    }
}

/// Cron expressions use the six-field form (seconds first).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub morphology_cron: String,
    pub sentiment_cron: String,
    pub mentions_cron: String,
    pub trend_cron: String,
    pub series_refresh_cron: String,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            morphology_cron: "0 0 * * * *".to_string(),
            sentiment_cron: "0 0 */12 * * *".to_string(),
            // Half an hour after morphology so fresh annotations exist to link against
            mentions_cron: "0 30 * * * *".to_string(),
            trend_cron: "0 0 1 * * *".to_string(),
            series_refresh_cron: "0 1 * * * *".to_string(),
        }
    }
}

impl AppConfig {
    /// Checks every section for values the jobs cannot run with.
    ///
    /// # Errors
    /// Returns `PipelineError::Config` describing the first invalid value.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let invalid =
            |msg: &str| -> Result<(), PipelineError> { Err(PipelineError::Config(msg.to_string())) };

        if self.database.url.trim().is_empty() {
            return invalid("database.url must not be empty");
        }
        if self.database.max_connections == 0 {
            return invalid("database.max_connections must be > 0");
        }
        if self.annotator.morphology_batch_size == 0 || self.annotator.sentiment_batch_size == 0 {
            return invalid("annotator batch sizes must be > 0");
        }
        if self.mentions.batch_size == 0 {
            return invalid("mentions.batch_size must be > 0");
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.collector.page_size) {
            return invalid("collector.page_size must be between 1 and 200");
        }
        if !(1..=MAX_PAGE_SIZE).contains(&self.collector.refresh_count) {
            return invalid("collector.refresh_count must be between 1 and 200");
        }
        if self.collector.max_concurrency == 0 || self.collector.requests_per_second == 0 {
            return invalid("collector concurrency and rate limit must be > 0");
        }
        if self.trend.window_days <= 0 || self.trend.step_days <= 0 {
            return invalid("trend.window_days and trend.step_days must be > 0");
        }
        if self.trend.lookback_days < 0 {
            return invalid("trend.lookback_days must not be negative");
        }
        self.trend.tz()?;

        Ok(())
    }
}
