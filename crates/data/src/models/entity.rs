//! Tracked asset reference data and mention links.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tracked asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct TrackedEntity {
    pub coin_id: i32,
    /// Canonical display name (e.g., "비트코인")
    pub coin_name: String,
    /// Ticker symbol (e.g., "BTC")
    pub symbol: String,
}

/// One textual alias of an entity. The canonical name is always an alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct EntityAlias {
    pub coin_id: i32,
    pub alias: String,
}

impl EntityAlias {
    pub fn new(coin_id: i32, alias: impl Into<String>) -> Self {
        Self {
            coin_id,
            alias: alias.into(),
        }
    }
}

/// "This annotation's event referenced this entity."
///
/// Identity is the whole row; duplicates are suppressed by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, sqlx::FromRow)]
pub struct EntityMentionRecord {
    pub analysis_id: i64,
    pub timestamp: DateTime<Utc>,
    pub coin_id: i32,
}
