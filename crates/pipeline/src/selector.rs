//! Unprocessed-work selection.
//!
//! The selector is a thin, side-effect free view over the store's
//! set-difference query. Committed results drop out of the next selection,
//! which is what makes every job resumable.

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use coin_pulse_data::{AnnotationKind, AnnotationStore, WorkItem};
use std::sync::Arc;

/// Returns the instant `days` before `now`, or `None` when unbounded.
#[must_use]
pub fn lookback_cutoff(now: DateTime<Utc>, days: Option<i64>) -> Option<DateTime<Utc>> {
    days.map(|d| now - Duration::days(d))
}

/// Finds raw events still lacking a result for one annotation kind.
#[derive(Clone)]
pub struct UnprocessedSelector {
    store: Arc<dyn AnnotationStore>,
}

impl UnprocessedSelector {
    #[must_use]
    pub fn new(store: Arc<dyn AnnotationStore>) -> Self {
        Self { store }
    }

    /// Selects pending work, optionally limited to the last `lookback_days`.
    ///
    /// # Errors
    /// Returns an error if the store query fails.
    pub async fn select(
        &self,
        kind: AnnotationKind,
        lookback_days: Option<i64>,
    ) -> Result<Vec<WorkItem>> {
        let since = lookback_cutoff(Utc::now(), lookback_days);
        let items = self
            .store
            .select_unprocessed(kind, since)
            .await
            .with_context(|| format!("Failed to select unprocessed {} work", kind.as_str()))?;

        tracing::info!(
            kind = kind.as_str(),
            pending = items.len(),
            ?since,
            "Selected unprocessed events"
        );
        Ok(items)
    }
}
