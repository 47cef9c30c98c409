//! Core types, configuration, and service traits for the community
//! annotation and trend-detection pipeline.

pub mod analysis;
pub mod config;
pub mod config_loader;
pub mod error;
pub mod stop;
pub mod traits;

pub use analysis::{MorphologyTags, Sentiment};
pub use config::{
    AnnotatorConfig, AppConfig, CollectorConfig, DatabaseConfig, DbRole, MentionConfig,
    SchedulerConfig, TrendConfig,
};
pub use config_loader::ConfigLoader;
pub use error::PipelineError;
pub use stop::StopFlag;
pub use traits::{MorphologyAnalyzer, SentimentClassifier};
