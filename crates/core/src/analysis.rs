//! Value types produced by the analysis services.

use crate::error::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Word-class lists extracted from a single text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MorphologyTags {
    pub nouns: Vec<String>,
    pub adjectives: Vec<String>,
    pub verbs: Vec<String>,
    pub interjections: Vec<String>,
}

impl MorphologyTags {
    /// Returns true if no word of any class was extracted.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nouns.is_empty()
            && self.adjectives.is_empty()
            && self.verbs.is_empty()
            && self.interjections.is_empty()
    }
}

/// Sentiment label attached to an annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    /// Labels in classifier output order.
    pub const LABELS: [Sentiment; 3] = [Sentiment::Positive, Sentiment::Neutral, Sentiment::Negative];

    /// Returns the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }

    /// Maps a classifier's argmax index to a label.
    #[must_use]
    pub fn from_index(index: usize) -> Option<Self> {
        Self::LABELS.get(index).copied()
    }
}

impl fmt::Display for Sentiment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Sentiment {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" => Ok(Sentiment::Positive),
            "neutral" => Ok(Sentiment::Neutral),
            "negative" => Ok(Sentiment::Negative),
            other => Err(PipelineError::MalformedRecord(format!(
                "unknown sentiment label '{other}'"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentiment_round_trips_through_str() {
        for label in Sentiment::LABELS {
            assert_eq!(label.as_str().parse::<Sentiment>().unwrap(), label);
        }
    }

    #[test]
    fn test_sentiment_parse_is_case_insensitive() {
        assert_eq!("Positive".parse::<Sentiment>().unwrap(), Sentiment::Positive);
        assert_eq!(" NEGATIVE ".parse::<Sentiment>().unwrap(), Sentiment::Negative);
    }

    #[test]
    fn test_sentiment_parse_rejects_unknown() {
        let err = "bullish".parse::<Sentiment>().unwrap_err();
        assert!(err.to_string().contains("bullish"));
    }

    #[test]
    fn test_sentiment_from_index() {
        assert_eq!(Sentiment::from_index(0), Some(Sentiment::Positive));
        assert_eq!(Sentiment::from_index(1), Some(Sentiment::Neutral));
        assert_eq!(Sentiment::from_index(2), Some(Sentiment::Negative));
        assert_eq!(Sentiment::from_index(3), None);
    }

    #[test]
    fn test_sentiment_serde_lowercase() {
        let json = serde_json::to_string(&Sentiment::Neutral).unwrap();
        assert_eq!(json, "\"neutral\"");
    }

    #[test]
    fn test_morphology_tags_is_empty() {
        assert!(MorphologyTags::default().is_empty());
        let tags = MorphologyTags {
            interjections: vec!["와".to_string()],
            ..Default::default()
        };
        assert!(!tags.is_empty());
    }
}
