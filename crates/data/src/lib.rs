//! Record store for the community-signal pipeline.
//!
//! This crate provides:
//! - Database client for `PostgreSQL`
//! - Typed models for raw events, annotations, mentions, candles and trend signals
//! - Storage traits the pipeline jobs are written against
//! - Repositories implementing those traits over SQL
//! - An in-memory store with the same conflict policies

pub mod database;
pub mod memory;
pub mod models;
pub mod repositories;
pub mod store;

pub use database::DatabaseClient;
pub use memory::MemoryStore;

pub use models::{
    AnnotationKind, AnnotationRecord, EntityAlias, EntityMentionRecord, EventKey, MorphologyRow,
    NewRawEvent, RawEventRecord, SentimentRow, SeriesCandleRecord, TrackedEntity, TrendDirection,
    TrendSignalRecord, WorkItem,
};

pub use repositories::{
    AnnotationRepository, CandleRepository, EventRepository, MentionRepository, Repositories,
    TableSummary, TrendSignalRepository,
};

pub use store::{AnnotationStore, CandleStore, EventStore, MentionStore, TrendStore};
