//! Built-in analysis services.

pub mod lexicon;
pub mod remote;

pub use lexicon::{LexiconSentimentClassifier, LexiconTagger};
pub use remote::RemoteAnalyzer;

use anyhow::Result;
use coin_pulse_core::{AnnotatorConfig, MorphologyAnalyzer, SentimentClassifier};
use std::sync::Arc;
use std::time::Duration;

/// Analysis handles shared by every annotator run in the process.
#[derive(Clone)]
pub struct AnalysisServices {
    pub tagger: Arc<dyn MorphologyAnalyzer>,
    pub classifier: Arc<dyn SentimentClassifier>,
}

impl AnalysisServices {
    /// Uses the remote service when one is configured, the lexicon analyzers otherwise.
    ///
    /// # Errors
    /// Returns an error if the remote client cannot be built.
    pub fn from_config(config: &AnnotatorConfig) -> Result<Self> {
        match &config.analysis_service_url {
            Some(url) => {
                let remote = Arc::new(RemoteAnalyzer::new(
                    url,
                    Duration::from_secs(config.analysis_timeout_secs),
                )?);
                tracing::info!(%url, "Using remote analysis service");
                Ok(Self {
                    tagger: remote.clone(),
                    classifier: remote,
                })
            }
            None => Ok(Self::lexicon()),
        }
    }

    #[must_use]
    pub fn lexicon() -> Self {
        Self {
            tagger: Arc::new(LexiconTagger),
            classifier: Arc::new(LexiconSentimentClassifier),
        }
    }
}
