//! Sliding-window mention trend detection.
//!
//! For each day `D` of a range, mention counts over `[D, D+W)` are compared
//! with `[D-W, D)`. Days start at local midnight in the configured timezone
//! and every window is half-open, so a mention exactly at a boundary is
//! counted in exactly one of two adjacent windows. Window edges are local
//! midnights too, so a window spanning a DST change is 23 or 25 hours per
//! shifted day rather than a fixed number of hours.
//!
//! Signals are appended without deduplication. Running the detector twice
//! over overlapping ranges records the same signals twice, so runs must be
//! serialized and ranges must not be repeated.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use coin_pulse_core::{StopFlag, TrendConfig};
use coin_pulse_data::{TrendDirection, TrendSignalRecord, TrendStore};
use std::collections::HashMap;
use std::sync::Arc;

/// Statistics for one detector run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrendStats {
    pub days: u64,
    pub increases: u64,
    pub decreases: u64,
    pub appended: u64,
    pub stopped: bool,
}

impl TrendStats {
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Days: {}, Increases: {}, Decreases: {}, Appended: {}{}",
            self.days,
            self.increases,
            self.decreases,
            self.appended,
            if self.stopped { " (stopped, nothing appended)" } else { "" }
        )
    }
}

/// Per-entity deltas where the current window exceeds the previous one,
/// and where it falls short. Only entities present in `current` are
/// compared; absent previous counts are zero.
#[must_use]
pub fn compare_windows(
    current: &HashMap<i32, i64>,
    previous: &HashMap<i32, i64>,
) -> (Vec<(i32, i64)>, Vec<(i32, i64)>) {
    let mut increases = Vec::new();
    let mut decreases = Vec::new();

    for (&coin_id, &now) in current {
        let before = previous.get(&coin_id).copied().unwrap_or(0);
        if now > before {
            increases.push((coin_id, now - before));
        } else if now < before {
            decreases.push((coin_id, before - now));
        }
    }

    increases.sort_unstable();
    decreases.sort_unstable();
    (increases, decreases)
}

const GAP_PROBE_MINUTES: i64 = 15;

/// Probes covering a whole day of 15-minute steps.
const DAY_START_PROBES: i64 = 24 * 60 / GAP_PROBE_MINUTES;

pub struct TrendDetector {
    store: Arc<dyn TrendStore>,
    window_days: i64,
    step_days: i64,
    lookback_days: i64,
    tz: Tz,
    stop: StopFlag,
}

impl TrendDetector {
    /// # Errors
    /// Returns an error if the configured timezone is unknown.
    pub fn new(store: Arc<dyn TrendStore>, config: &TrendConfig) -> Result<Self> {
        Ok(Self {
            store,
            window_days: config.window_days,
            step_days: config.step_days,
            lookback_days: config.lookback_days,
            tz: config.tz()?,
            stop: StopFlag::new(),
        })
    }

    #[must_use]
    pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    /// UTC instant the local day `date` starts at.
    ///
    /// That is local midnight, or the first valid instant after the gap
    /// when a DST change skips midnight. An ambiguous midnight resolves to
    /// its earlier instant.
    ///
    /// # Errors
    /// Returns an error if no local time on that date can be resolved.
    pub fn day_start(&self, date: NaiveDate) -> Result<DateTime<Utc>> {
        let midnight = date
            .and_hms_opt(0, 0, 0)
            .ok_or_else(|| anyhow!("Invalid date {date}"))?;

        // modern DST gaps start and end on 15-minute steps
        (0..DAY_START_PROBES)
            .map(|step| midnight + Duration::minutes(GAP_PROBE_MINUTES * step))
            .find_map(|local| self.tz.from_local_datetime(&local).earliest())
            .map(|local| local.with_timezone(&Utc))
            .ok_or_else(|| anyhow!("No local start of {date} exists in {}", self.tz))
    }

    /// Local calendar date of an instant.
    #[must_use]
    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        instant.with_timezone(&self.tz).date_naive()
    }

    /// Scans the configured lookback ending with today (inclusive).
    ///
    /// # Errors
    /// Returns an error if a count query or the final append fails.
    pub async fn run_recent(&self, now: DateTime<Utc>) -> Result<TrendStats> {
        let today = self.local_date(now);
        let start = today - Duration::days(self.lookback_days);
        let end = today + Duration::days(1);
        self.detect(start, end).await
    }

    /// Scans the day range `[start, end)` and appends every signal found.
    ///
    /// Increases are appended before decreases, each in day order.
    ///
    /// # Errors
    /// Returns an error if a count query or the final append fails.
    pub async fn detect(&self, start: NaiveDate, end: NaiveDate) -> Result<TrendStats> {
        let mut stats = TrendStats::default();
        let mut increases = Vec::new();
        let mut decreases = Vec::new();

        let mut day = start;
        while day < end {
            if self.stop.is_stopped() {
                tracing::info!(%day, "Stop requested, discarding partial trend run");
                stats.stopped = true;
                return Ok(stats);
            }

            let window = Duration::days(self.window_days);
            let previous_start = self.day_start(day - window)?;
            let boundary = self.day_start(day)?;
            let current_end = self.day_start(day + window)?;

            let current = self
                .store
                .count_mentions(boundary, current_end)
                .await
                .with_context(|| format!("Failed to count mentions from {day}"))?;
            let previous = self
                .store
                .count_mentions(previous_start, boundary)
                .await
                .with_context(|| format!("Failed to count mentions before {day}"))?;

            let (up, down) = compare_windows(&current, &previous);
            increases.extend(up.into_iter().map(|(coin_id, delta)| {
                TrendSignalRecord::new(coin_id, boundary, TrendDirection::Increase, delta)
            }));
            decreases.extend(down.into_iter().map(|(coin_id, delta)| {
                TrendSignalRecord::new(coin_id, boundary, TrendDirection::Decrease, delta)
            }));

            stats.days += 1;
            day += Duration::days(self.step_days);
        }

        stats.increases = increases.len() as u64;
        stats.decreases = decreases.len() as u64;

        if increases.is_empty() && decreases.is_empty() {
            tracing::info!(%start, %end, "No significant changes in mentions");
            return Ok(stats);
        }

        let mut signals = increases;
        signals.append(&mut decreases);
        stats.appended = self
            .store
            .append_signals(&signals)
            .await
            .context("Failed to append trend signals")?;

        tracing::info!(%start, %end, "Trend run complete: {}", stats.summary());
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coin_pulse_data::{EntityMentionRecord, MentionStore, MemoryStore};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn detector(store: Arc<MemoryStore>) -> TrendDetector {
        TrendDetector::new(store, &TrendConfig::default()).unwrap()
    }

    async fn mention_at(store: &MemoryStore, analysis_id: i64, ts: DateTime<Utc>, coin_id: i32) {
        store
            .insert_mentions(&[EntityMentionRecord {
                analysis_id,
                timestamp: ts,
                coin_id,
            }])
            .await
            .unwrap();
    }

    // ============================================
    // Window Comparison Tests
    // ============================================

    #[test]
    fn test_compare_windows() {
        let current = HashMap::from([(1, 5), (2, 2), (3, 4)]);
        let previous = HashMap::from([(1, 2), (2, 6), (3, 4), (4, 9)]);

        let (up, down) = compare_windows(&current, &previous);

        assert_eq!(up, vec![(1, 3)]);
        // entity 4 vanished from the current window and is not compared
        assert_eq!(down, vec![(2, 4)]);
    }

    #[test]
    fn test_new_entity_counts_as_increase() {
        let current = HashMap::from([(7, 3)]);
        let (up, down) = compare_windows(&current, &HashMap::new());
        assert_eq!(up, vec![(7, 3)]);
        assert!(down.is_empty());
    }

    // ============================================
    // Day Anchoring Tests
    // ============================================

    fn santiago(store: Arc<MemoryStore>) -> TrendDetector {
        let config = TrendConfig {
            timezone: "America/Santiago".to_string(),
            ..Default::default()
        };
        TrendDetector::new(store, &config).unwrap()
    }

    #[test]
    fn test_skipped_midnight_starts_after_gap() {
        let d = santiago(Arc::new(MemoryStore::new()));
        // clocks jump from 00:00 -04 to 01:00 -03 on 2024-09-08
        assert_eq!(
            d.day_start(date(2024, 9, 8)).unwrap(),
            Utc.with_ymd_and_hms(2024, 9, 8, 4, 0, 0).unwrap()
        );
        assert_eq!(
            d.day_start(date(2024, 9, 7)).unwrap(),
            Utc.with_ymd_and_hms(2024, 9, 7, 4, 0, 0).unwrap()
        );
        assert_eq!(
            d.day_start(date(2024, 9, 9)).unwrap(),
            Utc.with_ymd_and_hms(2024, 9, 9, 3, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_detect_across_dst_gap() {
        let store = Arc::new(MemoryStore::new());
        let d = santiago(store.clone());

        let stats = d.detect(date(2024, 9, 1), date(2024, 9, 15)).await.unwrap();
        assert_eq!(stats.days, 14);
        assert_eq!(stats.appended, 0);
    }

    #[tokio::test]
    async fn test_windows_end_at_local_midnight_after_dst_change() {
        let store = Arc::new(MemoryStore::new());
        let d = santiago(store.clone());
        // 00:30 local on 2024-09-11, past the end of the window starting
        // 2024-09-08 even though fewer than 72 hours have elapsed
        let ts = d.day_start(date(2024, 9, 11)).unwrap() + Duration::minutes(30);
        mention_at(&store, 1, ts, 1).await;

        let stats = d.detect(date(2024, 9, 8), date(2024, 9, 9)).await.unwrap();
        assert_eq!(stats.appended, 0);

        let stats = d.detect(date(2024, 9, 11), date(2024, 9, 12)).await.unwrap();
        assert_eq!(stats.increases, 1);
    }

    #[test]
    fn test_day_start_is_local_midnight() {
        let d = detector(Arc::new(MemoryStore::new()));
        // Asia/Seoul is UTC+9
        assert_eq!(
            d.day_start(date(2024, 12, 5)).unwrap(),
            Utc.with_ymd_and_hms(2024, 12, 4, 15, 0, 0).unwrap()
        );
        assert_eq!(
            d.local_date(Utc.with_ymd_and_hms(2024, 12, 4, 15, 0, 0).unwrap()),
            date(2024, 12, 5)
        );
    }

    // ============================================
    // Detector Tests
    // ============================================

    #[tokio::test]
    async fn test_signals_are_appended_once_per_run() {
        let store = Arc::new(MemoryStore::new());
        let d = detector(store.clone());
        let boundary = d.day_start(date(2024, 12, 5)).unwrap();
        mention_at(&store, 1, boundary + Duration::hours(1), 1).await;

        let stats = d.detect(date(2024, 12, 5), date(2024, 12, 6)).await.unwrap();
        assert_eq!(stats.days, 1);
        assert_eq!(stats.appended, 1);

        // re-running the same range duplicates the log
        d.detect(date(2024, 12, 5), date(2024, 12, 6)).await.unwrap();
        assert_eq!(store.signals().len(), 2);
    }

    #[tokio::test]
    async fn test_step_days_skips_days() {
        let store = Arc::new(MemoryStore::new());
        let config = TrendConfig {
            step_days: 2,
            ..Default::default()
        };
        let d = TrendDetector::new(store, &config).unwrap();

        let stats = d.detect(date(2024, 12, 1), date(2024, 12, 6)).await.unwrap();
        assert_eq!(stats.days, 3);
        assert_eq!(stats.appended, 0);
    }

    #[tokio::test]
    async fn test_stopped_run_appends_nothing() {
        let store = Arc::new(MemoryStore::new());
        let stop = StopFlag::new();
        stop.stop();
        let d = detector(store.clone()).with_stop_flag(stop);
        mention_at(&store, 1, d.day_start(date(2024, 12, 5)).unwrap(), 1).await;

        let stats = d.detect(date(2024, 12, 1), date(2024, 12, 10)).await.unwrap();
        assert!(stats.stopped);
        assert!(store.signals().is_empty());
    }

    #[test]
    fn test_unknown_timezone_is_rejected() {
        let config = TrendConfig {
            timezone: "Mars/Olympus".to_string(),
            ..Default::default()
        };
        assert!(TrendDetector::new(Arc::new(MemoryStore::new()), &config).is_err());
    }
}
