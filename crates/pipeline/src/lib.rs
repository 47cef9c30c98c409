//! Incremental community annotation and trend-detection jobs.
//!
//! This crate provides:
//! - Unprocessed-work selection per annotation kind
//! - Batch morphology and sentiment annotation
//! - Entity mention extraction and linking
//! - Paginated hourly candle collection
//! - Sliding-window mention trend detection
//! - Chat export import
//!
//! Every job is written against the storage traits in `coin_pulse_data`,
//! so the same code runs on PostgreSQL and on the in-memory store.

pub mod analyzers;
pub mod annotator;
pub mod collector;
pub mod import;
pub mod mention;
pub mod selector;
pub mod trend;

pub use analyzers::{AnalysisServices, LexiconSentimentClassifier, LexiconTagger, RemoteAnalyzer};
pub use annotator::{AnnotatorStats, BatchAnnotator};
pub use collector::{
    next_page_state, normalize_candle, BackfillRange, CandlePage, CollectorStats, DoneReason,
    PageState, SeriesCollector, SeriesPoint, SeriesSource, SourceError, UpbitClient,
};
pub use import::{parse_export, ChatImporter, ImportStats};
pub use mention::{AliasMatcher, LinkStats, MentionLinker};
pub use selector::UnprocessedSelector;
pub use trend::{TrendDetector, TrendStats};
