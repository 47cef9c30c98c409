//! Mention trend signal model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a mention-count change between adjacent windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increase,
    Decrease,
}

impl TrendDirection {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Increase => "increase",
            TrendDirection::Decrease => "decrease",
        }
    }
}

impl fmt::Display for TrendDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry in the append-only trend log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TrendSignalRecord {
    pub coin_id: i32,
    /// Window boundary date the delta was measured at
    pub timestamp: DateTime<Utc>,
    /// "increase" or "decrease"
    pub direction: String,
    /// Absolute mention-count delta
    pub magnitude: i64,
    pub reason: String,
}

impl TrendSignalRecord {
    /// Creates a signal with the standard reason text.
    #[must_use]
    pub fn new(
        coin_id: i32,
        timestamp: DateTime<Utc>,
        direction: TrendDirection,
        magnitude: i64,
    ) -> Self {
        let verb = match direction {
            TrendDirection::Increase => "Increase",
            TrendDirection::Decrease => "Decrease",
        };
        Self {
            coin_id,
            timestamp,
            direction: direction.as_str().to_string(),
            magnitude,
            reason: format!("{verb} {magnitude} in mentions"),
        }
    }

    #[must_use]
    pub fn parsed_direction(&self) -> Option<TrendDirection> {
        match self.direction.as_str() {
            "increase" => Some(TrendDirection::Increase),
            "decrease" => Some(TrendDirection::Decrease),
            _ => None,
        }
    }
}
