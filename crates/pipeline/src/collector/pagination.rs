//! Page walking and candle normalisation.

use chrono::{DateTime, Utc};
use coin_pulse_core::PipelineError;
use coin_pulse_data::SeriesCandleRecord;
use rust_decimal::Decimal;

use super::source::{CandlePage, SeriesPoint};

/// Fractional digits kept for prices and volumes.
pub const DECIMAL_SCALE: u32 = 8;

/// Volumes above 10^12 are known unit anomalies at the source.
const VOLUME_ANOMALY_THRESHOLD: i64 = 1_000_000_000_000;

/// Divisor applied to anomalous volumes.
const VOLUME_DOWNSCALE: i64 = 1_000_000;

/// Why a page walk finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DoneReason {
    /// The source returned no records.
    Empty,
    /// Fewer records than requested: the series is exhausted.
    ShortPage,
    /// The oldest point reached the end-of-range boundary.
    ReachedBoundary,
}

/// Result of inspecting one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    /// Request the page ending at `cursor` next.
    MorePages { cursor: DateTime<Utc> },
    Done(DoneReason),
}

/// Decides whether to request another page.
///
/// `boundary` is the oldest instant the walk needs; `None` walks until the
/// source runs out.
///
/// # Errors
/// Returns `MalformedRecord` for a full page with no usable record, since
/// the walk can neither advance past it nor treat the series as exhausted.
pub fn next_page_state(
    page: &CandlePage,
    page_size: usize,
    boundary: Option<DateTime<Utc>>,
) -> Result<PageState, PipelineError> {
    if page.fetched() == 0 {
        return Ok(PageState::Done(DoneReason::Empty));
    }

    if page.fetched() < page_size {
        return Ok(PageState::Done(DoneReason::ShortPage));
    }

    let Some(oldest) = page.oldest() else {
        return Err(PipelineError::MalformedRecord(format!(
            "all {} records of a full page are malformed",
            page.malformed
        )));
    };

    Ok(match boundary {
        Some(end) if oldest <= end => PageState::Done(DoneReason::ReachedBoundary),
        _ => PageState::MorePages { cursor: oldest },
    })
}

/// Rounds a volume and corrects source-unit anomalies.
#[must_use]
pub fn normalize_volume(volume: Decimal) -> Decimal {
    let volume = volume.round_dp(DECIMAL_SCALE);
    if volume > Decimal::from(VOLUME_ANOMALY_THRESHOLD) {
        (volume / Decimal::from(VOLUME_DOWNSCALE)).round_dp(DECIMAL_SCALE)
    } else {
        volume
    }
}

/// Converts a source point into a storable candle.
#[must_use]
pub fn normalize_candle(coin_id: i32, point: &SeriesPoint) -> SeriesCandleRecord {
    SeriesCandleRecord {
        coin_id,
        timestamp: point.period_start,
        open: point.open.round_dp(DECIMAL_SCALE),
        high: point.high.round_dp(DECIMAL_SCALE),
        low: point.low.round_dp(DECIMAL_SCALE),
        close: point.close.round_dp(DECIMAL_SCALE),
        volume: normalize_volume(point.volume),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rust_decimal_macros::dec;

    fn hour(h: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 12, 1, 0, 0, 0).unwrap() + Duration::hours(h)
    }

    fn point(ts: DateTime<Utc>) -> SeriesPoint {
        SeriesPoint {
            period_start: ts,
            open: dec!(1),
            high: dec!(1),
            low: dec!(1),
            close: dec!(1),
            volume: dec!(1),
        }
    }

    /// Newest-first page of `len` points starting at hour `newest`.
    fn page(newest: i64, len: i64) -> CandlePage {
        CandlePage {
            points: (0..len).map(|i| point(hour(newest - i))).collect(),
            malformed: 0,
        }
    }

    // ============================================
    // Pagination Tests
    // ============================================

    #[test]
    fn test_empty_page_is_done() {
        let state = next_page_state(&CandlePage::default(), 200, None).unwrap();
        assert_eq!(state, PageState::Done(DoneReason::Empty));
    }

    #[test]
    fn test_short_page_is_done() {
        let state = next_page_state(&page(500, 57), 200, None).unwrap();
        assert_eq!(state, PageState::Done(DoneReason::ShortPage));
    }

    #[test]
    fn test_full_page_advances_to_oldest() {
        let state = next_page_state(&page(500, 200), 200, Some(hour(0))).unwrap();
        assert_eq!(state, PageState::MorePages { cursor: hour(301) });
    }

    #[test]
    fn test_boundary_is_inclusive() {
        let state = next_page_state(&page(500, 200), 200, Some(hour(301))).unwrap();
        assert_eq!(state, PageState::Done(DoneReason::ReachedBoundary));

        let state = next_page_state(&page(500, 200), 200, Some(hour(300))).unwrap();
        assert_eq!(state, PageState::MorePages { cursor: hour(301) });
    }

    #[test]
    fn test_malformed_records_count_towards_page_size() {
        let mut full = page(500, 199);
        full.malformed = 1;
        let state = next_page_state(&full, 200, None).unwrap();
        assert_eq!(state, PageState::MorePages { cursor: hour(302) });
    }

    #[test]
    fn test_full_page_of_malformed_records_is_an_error() {
        let garbage = CandlePage {
            points: vec![],
            malformed: 200,
        };
        let err = next_page_state(&garbage, 200, None).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedRecord(_)));

        // a short page of garbage still ends the walk
        let tail = CandlePage {
            points: vec![],
            malformed: 12,
        };
        let state = next_page_state(&tail, 200, None).unwrap();
        assert_eq!(state, PageState::Done(DoneReason::ShortPage));
    }

    // ============================================
    // Normalisation Tests
    // ============================================

    #[test]
    fn test_anomalous_volume_is_downscaled() {
        assert_eq!(normalize_volume(dec!(2000000000000)), dec!(2000000));
        assert_eq!(normalize_volume(dec!(1000000000000)), dec!(1000000000000));
    }

    #[test]
    fn test_values_rounded_to_eight_places() {
        let raw = SeriesPoint {
            period_start: hour(0),
            open: dec!(0.123456789),
            high: dec!(143250000),
            low: dec!(0.000000014),
            close: dec!(1.5),
            volume: dec!(12.3456789012),
        };
        let candle = normalize_candle(7, &raw);

        assert_eq!(candle.coin_id, 7);
        assert_eq!(candle.timestamp, hour(0));
        assert_eq!(candle.open, dec!(0.12345679));
        assert_eq!(candle.high, dec!(143250000));
        assert_eq!(candle.low, dec!(0.00000001));
        assert_eq!(candle.volume, dec!(12.34567890));
    }
}
