//! PostgreSQL repositories.
//!
//! Each repository provides typed access to one table and implements the
//! matching storage trait with batch, per-transaction writes.

pub mod annotation_repo;
pub mod candle_repo;
pub mod event_repo;
pub mod mention_repo;
pub mod trend_repo;

pub use annotation_repo::AnnotationRepository;
pub use candle_repo::CandleRepository;
pub use event_repo::EventRepository;
pub use mention_repo::MentionRepository;
pub use trend_repo::TrendSignalRepository;

use chrono::{DateTime, Utc};
use sqlx::PgPool;

/// Row count and time bounds of a table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TableSummary {
    pub rows: i64,
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}

/// Creates all repositories from a single database pool.
pub struct Repositories {
    pub events: EventRepository,
    pub annotations: AnnotationRepository,
    pub mentions: MentionRepository,
    pub candles: CandleRepository,
    pub trends: TrendSignalRepository,
}

impl Repositories {
    /// Creates a new set of repositories from a database pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self {
            events: EventRepository::new(pool.clone()),
            annotations: AnnotationRepository::new(pool.clone()),
            mentions: MentionRepository::new(pool.clone()),
            candles: CandleRepository::new(pool.clone()),
            trends: TrendSignalRepository::new(pool),
        }
    }
}
