//! Trend detection command.

use anyhow::{bail, Result};
use chrono::{Duration, NaiveDate};
use clap::Args;
use coin_pulse_core::{AppConfig, DbRole, StopFlag};
use coin_pulse_scheduler::PipelineJob;

use super::job::{connect_jobs, run_job};

/// Arguments for the detect-trends command.
#[derive(Args, Debug, Clone)]
pub struct DetectTrendsArgs {
    /// First local date to scan (e.g., "2024-12-01"). Defaults to the configured lookback.
    #[arg(long, requires = "to")]
    pub from: Option<NaiveDate>,

    /// Last local date to scan, inclusive
    #[arg(long, requires = "from")]
    pub to: Option<NaiveDate>,
}

impl DetectTrendsArgs {
    /// Half-open day range `[from, to + 1)`, if one was given.
    fn range(&self) -> Result<Option<(NaiveDate, NaiveDate)>> {
        match (self.from, self.to) {
            (Some(from), Some(to)) if from > to => bail!("--from {from} is after --to {to}"),
            (Some(from), Some(to)) => Ok(Some((from, to + Duration::days(1)))),
            _ => Ok(None),
        }
    }
}

/// Runs the detector over the requested dates, or the recent lookback.
///
/// Signals are appended, never merged: scanning a range twice records its
/// signals twice.
///
/// # Errors
/// Returns an error if the range is inverted, setup fails, or the run aborts.
pub async fn run_detect_trends(config: &AppConfig, args: DetectTrendsArgs, stop: StopFlag) -> Result<()> {
    let Some((start, end)) = args.range()? else {
        return run_job(config, PipelineJob::Trends, stop).await;
    };

    let jobs = connect_jobs(config, DbRole::Scheduler, stop).await?;
    let stats = jobs.detect_trends(start, end).await?;

    println!("{}: {}", PipelineJob::Trends, stats.summary());
    Ok(())
}
