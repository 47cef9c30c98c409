use crate::analysis::{MorphologyTags, Sentiment};
use anyhow::Result;
use async_trait::async_trait;

/// Splits a text into word-class lists.
///
/// Implementations are constructed once at startup and shared across runs.
#[async_trait]
pub trait MorphologyAnalyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<MorphologyTags>;
    fn name(&self) -> &str;
}

/// Assigns one of three sentiment labels to each text in a batch.
///
/// The returned vector must be parallel to `texts`.
#[async_trait]
pub trait SentimentClassifier: Send + Sync {
    async fn classify(&self, texts: &[String]) -> Result<Vec<Sentiment>>;
    fn name(&self) -> &str;
}
