//! Annotation data model.
//!
//! One row per raw event. Morphology and sentiment are filled in by
//! separate jobs, so every analysed field is nullable.

use chrono::{DateTime, Utc};
use coin_pulse_core::{MorphologyTags, Sentiment};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::raw_event::EventKey;

/// Which annotation a job produces.
///
/// Each kind has its own notion of "already processed".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnnotationKind {
    /// Word-class lists; done once `nouns` is non-null
    Morphology,
    /// Sentiment label; done once `sentiment` is non-null
    Sentiment,
    /// Entity mentions; done once any mention row exists
    MentionLink,
}

impl AnnotationKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnotationKind::Morphology => "morphology",
            AnnotationKind::Sentiment => "sentiment",
            AnnotationKind::MentionLink => "mention-link",
        }
    }
}

/// A stored annotation row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AnnotationRecord {
    pub analysis_id: i64,
    pub reaction_id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub nouns: Option<Vec<String>>,
    pub adjectives: Option<Vec<String>>,
    pub verbs: Option<Vec<String>>,
    pub interjections: Option<Vec<String>>,
    /// "positive", "neutral" or "negative"
    pub sentiment: Option<String>,
}

impl AnnotationRecord {
    #[must_use]
    pub fn key(&self) -> EventKey {
        EventKey::new(self.reaction_id, self.timestamp)
    }

    /// Returns the parsed sentiment, if set and valid.
    #[must_use]
    pub fn parsed_sentiment(&self) -> Option<Sentiment> {
        self.sentiment.as_deref().and_then(|s| s.parse().ok())
    }

    /// Returns true once the morphology job has written this row.
    #[must_use]
    pub fn has_morphology(&self) -> bool {
        self.nouns.is_some()
    }
}

/// Morphology result for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MorphologyRow {
    pub key: EventKey,
    pub tags: MorphologyTags,
}

/// Sentiment result for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentimentRow {
    pub key: EventKey,
    pub sentiment: Sentiment,
}
