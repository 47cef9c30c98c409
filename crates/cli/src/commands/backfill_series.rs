//! Backfill series CLI command.
//!
//! Walks the hourly candle history of every tracked entity backward from
//! `--to` (or now) until `--from`, the start of the series, or with
//! `--resume` each entity's newest stored candle.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use clap::Args;
use coin_pulse_core::{AppConfig, DbRole, StopFlag};
use coin_pulse_pipeline::BackfillRange;

use super::job::connect_jobs;

/// Arguments for the backfill-series command.
#[derive(Args, Debug, Clone)]
pub struct BackfillSeriesArgs {
    /// Oldest timestamp to keep walking to (ISO 8601 format, e.g., "2024-01-01T00:00:00Z")
    #[arg(long, conflicts_with = "resume")]
    pub from: Option<DateTime<Utc>>,

    /// Timestamp to start walking back from (defaults to now)
    #[arg(long, conflicts_with = "resume")]
    pub to: Option<DateTime<Utc>>,

    /// Stop each entity's walk at its newest stored candle
    #[arg(long, default_value = "false")]
    pub resume: bool,
}

impl BackfillSeriesArgs {
    fn range(&self) -> Result<BackfillRange> {
        if self.resume {
            return Ok(BackfillRange::Resume);
        }
        if let (Some(from), Some(to)) = (self.from, self.to) {
            if from >= to {
                bail!("--from {from} must be before --to {to}");
            }
        }
        Ok(BackfillRange::Explicit {
            from: self.from,
            to: self.to,
        })
    }
}

/// Runs the backfill with the collector role.
///
/// # Errors
/// Returns an error if the range is invalid, setup fails, or the market
/// list cannot be fetched. Per-entity failures are logged and counted.
pub async fn run_backfill_series(
    config: &AppConfig,
    args: BackfillSeriesArgs,
    stop: StopFlag,
) -> Result<()> {
    let range = args.range()?;
    tracing::info!(?range, "Starting series backfill");

    let jobs = connect_jobs(config, DbRole::Collector, stop).await?;
    let stats = jobs.collector().backfill_all(range).await?;

    println!("backfill-series: {}", stats.summary());
    if stats.failed > 0 {
        tracing::warn!(failed = stats.failed, "Some entities were skipped, see errors above");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_resume_range() {
        let args = BackfillSeriesArgs {
            from: None,
            to: None,
            resume: true,
        };
        assert_eq!(args.range().unwrap(), BackfillRange::Resume);
    }

    #[test]
    fn test_explicit_range() {
        let from = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let args = BackfillSeriesArgs {
            from: Some(from),
            to: None,
            resume: false,
        };
        assert_eq!(
            args.range().unwrap(),
            BackfillRange::Explicit {
                from: Some(from),
                to: None
            }
        );
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let args = BackfillSeriesArgs {
            from: Some(Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap()),
            to: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
            resume: false,
        };
        assert!(args.range().is_err());
    }
}
