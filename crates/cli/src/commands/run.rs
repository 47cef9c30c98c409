//! Scheduler daemon command.

use anyhow::{bail, Result};
use clap::Args;
use coin_pulse_core::{AppConfig, StopFlag};
use coin_pulse_scheduler::{PipelineJobs, PipelineScheduler, Stores};
use std::sync::Arc;

/// Arguments for the run command.
#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    /// Run every job once in dependency order, then exit
    #[arg(long, default_value = "false")]
    pub once: bool,
}

/// Runs the scheduler until Ctrl-C, or every job once with `--once`.
///
/// # Errors
/// Returns an error if setup fails, a cron expression is invalid, or with
/// `--once` if any job failed.
pub async fn run_daemon(config: &AppConfig, args: RunArgs, stop: StopFlag) -> Result<()> {
    let stores = Stores::connect(&config.database).await?;
    let jobs = Arc::new(PipelineJobs::from_config(&stores, config, stop.clone())?);
    let scheduler = PipelineScheduler::new(config.scheduler.clone(), jobs, stop);

    if args.once {
        let failed = scheduler.run_once().await;
        if failed > 0 {
            bail!("{failed} job(s) failed");
        }
        return Ok(());
    }

    tracing::info!("Starting pipeline scheduler daemon");
    scheduler.start().await?;
    tracing::info!("Pipeline scheduler stopped");
    Ok(())
}
