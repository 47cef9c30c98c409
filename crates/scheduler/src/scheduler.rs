use anyhow::{Context, Result};
use coin_pulse_core::{SchedulerConfig, StopFlag};
use std::sync::Arc;
use std::time::Duration;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};

use crate::jobs::{PipelineJob, PipelineJobs};

const STOP_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Runs each pipeline job on its cron schedule until stopped.
///
/// A failing run is logged and the job is tried again at its next tick.
pub struct PipelineScheduler {
    config: SchedulerConfig,
    jobs: Arc<PipelineJobs>,
    stop: StopFlag,
}

impl PipelineScheduler {
    #[must_use]
    pub fn new(config: SchedulerConfig, jobs: Arc<PipelineJobs>, stop: StopFlag) -> Self {
        Self { config, jobs, stop }
    }

    /// Cron expression configured for a job.
    #[must_use]
    pub fn schedule_for(&self, job: PipelineJob) -> &str {
        match job {
            PipelineJob::Morphology => &self.config.morphology_cron,
            PipelineJob::Sentiment => &self.config.sentiment_cron,
            PipelineJob::Mentions => &self.config.mentions_cron,
            PipelineJob::Trends => &self.config.trend_cron,
            PipelineJob::SeriesRefresh => &self.config.series_refresh_cron,
        }
    }

    /// Starts the scheduler and blocks until the stop flag is set.
    ///
    /// # Errors
    /// Returns an error if a cron expression is invalid or the scheduler fails to start.
    pub async fn start(&self) -> Result<()> {
        if !self.config.enabled {
            info!("Scheduler is disabled");
            return Ok(());
        }

        let mut scheduler = JobScheduler::new()
            .await
            .context("Failed to create job scheduler")?;

        for job in PipelineJob::ALL {
            let cron_schedule = self.schedule_for(job).to_string();
            let jobs = self.jobs.clone();

            let cron_job = Job::new_async(cron_schedule.as_str(), move |_uuid, _lock| {
                let jobs = jobs.clone();
                Box::pin(async move {
                    info!(%job, "Scheduled run starting");
                    match jobs.run(job).await {
                        Ok(summary) => info!(%job, "Scheduled run complete: {}", summary),
                        Err(e) => error!(%job, "Scheduled run failed: {:#}", e),
                    }
                })
            })
            .with_context(|| format!("Invalid cron expression for {job}: {cron_schedule}"))?;

            scheduler.add(cron_job).await?;
            info!(%job, schedule = %cron_schedule, "Job scheduled");
        }

        scheduler.start().await?;
        info!("Pipeline scheduler started");

        while !self.stop.is_stopped() {
            tokio::time::sleep(STOP_POLL_INTERVAL).await;
        }

        warn!("Stop requested, shutting down scheduler");
        scheduler
            .shutdown()
            .await
            .context("Failed to shut down job scheduler")?;
        Ok(())
    }

    /// Runs every job once, in dependency order, continuing past failures.
    ///
    /// Returns the number of jobs that failed.
    pub async fn run_once(&self) -> usize {
        let mut failed = 0;

        for job in PipelineJob::ALL {
            if self.stop.is_stopped() {
                warn!(%job, "Stop requested, skipping remaining jobs");
                break;
            }
            match self.jobs.run(job).await {
                Ok(summary) => info!(%job, "Run complete: {}", summary),
                Err(e) => {
                    error!(%job, "Run failed: {:#}", e);
                    failed += 1;
                }
            }
        }

        failed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::jobs::Stores;
    use coin_pulse_core::AppConfig;
    use coin_pulse_data::MemoryStore;

    fn scheduler(config: SchedulerConfig, stop: StopFlag) -> PipelineScheduler {
        let stores = Stores::from_memory(Arc::new(MemoryStore::new()));
        let mut app = AppConfig::default();
        // nothing listens here, so the series refresh fails fast
        app.collector.base_url = "http://127.0.0.1:9".to_string();
        app.collector.request_timeout_secs = 1;
        let jobs = PipelineJobs::from_config(&stores, &app, stop.clone()).unwrap();
        PipelineScheduler::new(config, Arc::new(jobs), stop)
    }

    #[tokio::test]
    async fn test_disabled_scheduler_returns_immediately() {
        let config = SchedulerConfig {
            enabled: false,
            ..Default::default()
        };
        scheduler(config, StopFlag::new()).start().await.unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_invalid_cron_is_rejected() {
        let config = SchedulerConfig {
            trend_cron: "every day at one".to_string(),
            ..Default::default()
        };
        let err = scheduler(config, StopFlag::new()).start().await.unwrap_err();
        assert!(err.to_string().contains("trends"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_preset_stop_flag_ends_start() {
        let stop = StopFlag::new();
        stop.stop();
        scheduler(SchedulerConfig::default(), stop).start().await.unwrap();
    }

    #[tokio::test]
    async fn test_run_once_contains_failures() {
        let s = scheduler(SchedulerConfig::default(), StopFlag::new());
        // annotation jobs succeed on an empty store, the unreachable exchange fails
        assert_eq!(s.run_once().await, 1);
    }

    #[test]
    fn test_schedule_lookup() {
        let s = scheduler(SchedulerConfig::default(), StopFlag::new());
        assert_eq!(s.schedule_for(PipelineJob::Mentions), "0 30 * * * *");
        assert_eq!(s.schedule_for(PipelineJob::Trends), "0 0 1 * * *");
    }
}
