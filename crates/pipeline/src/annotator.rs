//! Batch annotation jobs.
//!
//! Morphology and sentiment run on independent cadences with their own
//! batch sizes. Each batch is analysed, written, and committed before the
//! next one starts, so an interrupted run keeps everything it committed.

use anyhow::{anyhow, Context, Result};
use coin_pulse_core::{AnnotatorConfig, MorphologyAnalyzer, SentimentClassifier, StopFlag};
use coin_pulse_data::{AnnotationKind, AnnotationStore, MorphologyRow, SentimentRow, WorkItem};
use std::sync::Arc;

use crate::selector::UnprocessedSelector;

/// Statistics for one annotator run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotatorStats {
    /// Work items returned by the selector
    pub selected: u64,
    /// Items the analysis step produced a result for
    pub analysed: u64,
    /// Items skipped because the analyser rejected them
    pub skipped: u64,
    /// Rows the store reported as written
    pub written: u64,
    /// Committed batches
    pub batches: u64,
    /// Whether the stop flag ended the run early
    pub stopped: bool,
}

impl AnnotatorStats {
    #[must_use]
    pub fn summary(&self) -> String {
        format!(
            "Selected: {}, Analysed: {}, Skipped: {}, Written: {}, Batches: {}{}",
            self.selected,
            self.analysed,
            self.skipped,
            self.written,
            self.batches,
            if self.stopped { " (stopped)" } else { "" }
        )
    }
}

/// Runs the morphology and sentiment annotation jobs.
pub struct BatchAnnotator {
    store: Arc<dyn AnnotationStore>,
    selector: UnprocessedSelector,
    tagger: Arc<dyn MorphologyAnalyzer>,
    classifier: Arc<dyn SentimentClassifier>,
    config: AnnotatorConfig,
    stop: StopFlag,
}

impl BatchAnnotator {
    #[must_use]
    pub fn new(
        store: Arc<dyn AnnotationStore>,
        tagger: Arc<dyn MorphologyAnalyzer>,
        classifier: Arc<dyn SentimentClassifier>,
        config: AnnotatorConfig,
    ) -> Self {
        Self {
            selector: UnprocessedSelector::new(store.clone()),
            store,
            tagger,
            classifier,
            config,
            stop: StopFlag::new(),
        }
    }

    /// Shares a stop flag with the caller.
    #[must_use]
    pub fn with_stop_flag(mut self, stop: StopFlag) -> Self {
        self.stop = stop;
        self
    }

    /// Tags every pending event and stores the word-class lists.
    ///
    /// An item the tagger rejects is skipped with a warning; it stays
    /// unprocessed and is retried on the next run.
    ///
    /// # Errors
    /// Returns an error if selection or a batch write fails. Batches committed
    /// before the failure stay committed.
    pub async fn run_morphology(&self) -> Result<AnnotatorStats> {
        let items = self
            .selector
            .select(AnnotationKind::Morphology, self.config.morphology_lookback_days)
            .await?;

        let mut stats = AnnotatorStats {
            selected: items.len() as u64,
            ..Default::default()
        };

        for (index, batch) in items.chunks(self.config.morphology_batch_size).enumerate() {
            if self.stop.is_stopped() {
                tracing::info!(batch = index + 1, "Stop requested, ending morphology run");
                stats.stopped = true;
                break;
            }

            let rows = self.tag_batch(batch, &mut stats).await;
            let written = self
                .store
                .upsert_morphology(&rows)
                .await
                .with_context(|| format!("Failed to write morphology batch {}", index + 1))?;

            stats.written += written;
            stats.batches += 1;
            tracing::info!(batch = index + 1, rows = rows.len(), written, "Morphology batch committed");
        }

        tracing::info!(tagger = self.tagger.name(), "Morphology run complete: {}", stats.summary());
        Ok(stats)
    }

    async fn tag_batch(&self, batch: &[WorkItem], stats: &mut AnnotatorStats) -> Vec<MorphologyRow> {
        let mut rows = Vec::with_capacity(batch.len());

        for item in batch {
            match self.tagger.analyze(&item.reaction_text).await {
                Ok(tags) => {
                    stats.analysed += 1;
                    rows.push(MorphologyRow {
                        key: item.key(),
                        tags,
                    });
                }
                Err(e) => {
                    stats.skipped += 1;
                    tracing::warn!(
                        reaction_id = %item.reaction_id,
                        "Skipping event the tagger rejected: {e:#}"
                    );
                }
            }
        }

        rows
    }

    /// Classifies every pending event and stores its sentiment label.
    ///
    /// Texts are sent to the classifier one batch at a time.
    ///
    /// # Errors
    /// Returns an error if selection fails, the classifier fails, the
    /// classifier returns a different number of labels than texts, or a batch
    /// write fails. Batches committed before the failure stay committed.
    pub async fn run_sentiment(&self) -> Result<AnnotatorStats> {
        let items = self.selector.select(AnnotationKind::Sentiment, None).await?;

        let mut stats = AnnotatorStats {
            selected: items.len() as u64,
            ..Default::default()
        };

        for (index, batch) in items.chunks(self.config.sentiment_batch_size).enumerate() {
            if self.stop.is_stopped() {
                tracing::info!(batch = index + 1, "Stop requested, ending sentiment run");
                stats.stopped = true;
                break;
            }

            let rows = self
                .classify_batch(batch)
                .await
                .with_context(|| format!("Sentiment batch {} failed", index + 1))?;
            stats.analysed += rows.len() as u64;

            let written = self
                .store
                .upsert_sentiment(&rows)
                .await
                .with_context(|| format!("Failed to write sentiment batch {}", index + 1))?;

            stats.written += written;
            stats.batches += 1;
            tracing::info!(batch = index + 1, rows = rows.len(), "Sentiment batch committed");
        }

        tracing::info!(
            classifier = self.classifier.name(),
            "Sentiment run complete: {}",
            stats.summary()
        );
        Ok(stats)
    }

    async fn classify_batch(&self, batch: &[WorkItem]) -> Result<Vec<SentimentRow>> {
        let texts: Vec<String> = batch.iter().map(|item| item.reaction_text.clone()).collect();
        let labels = self.classifier.classify(&texts).await?;

        if labels.len() != batch.len() {
            return Err(anyhow!(
                "Classifier returned {} labels for {} texts",
                labels.len(),
                batch.len()
            ));
        }

        Ok(batch
            .iter()
            .zip(labels)
            .map(|(item, sentiment)| SentimentRow {
                key: item.key(),
                sentiment,
            })
            .collect())
    }
}
