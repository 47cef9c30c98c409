//! Typed records for every table the pipeline reads or writes.
//!
//! Models derive `sqlx::FromRow` for database compatibility.
//! Prices and volumes use `rust_decimal::Decimal`.

pub mod annotation;
pub mod candle;
pub mod entity;
pub mod raw_event;
pub mod trend_signal;

pub use annotation::{AnnotationKind, AnnotationRecord, MorphologyRow, SentimentRow};
pub use candle::SeriesCandleRecord;
pub use entity::{EntityAlias, EntityMentionRecord, TrackedEntity};
pub use raw_event::{EventKey, NewRawEvent, RawEventRecord, WorkItem};
pub use trend_signal::{TrendDirection, TrendSignalRecord};
