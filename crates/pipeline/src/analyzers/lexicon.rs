//! Dictionary-based analyzers that need no external service.
//!
//! Coarse but deterministic: good enough for chat fragments, and the
//! default when no analysis service is configured.

use anyhow::Result;
use async_trait::async_trait;
use coin_pulse_core::{MorphologyAnalyzer, MorphologyTags, Sentiment, SentimentClassifier};

/// Trailing particles stripped from noun candidates, longest first.
const PARTICLES: &[&str] = &[
    "에서", "으로", "까지", "부터", "한테", "에게", "처럼", "보다", "은", "는", "이", "가", "을",
    "를", "에", "의", "도", "로", "와", "과", "만",
];

const INTERJECTIONS: &[&str] = &[
    "와", "우와", "헐", "아", "아이고", "오", "음", "어", "ㅋㅋ", "ㅋㅋㅋ", "ㅎㅎ", "ㅠㅠ", "ㅜㅜ",
    "wow", "omg", "lol", "wtf",
];

const ADJECTIVE_ENDINGS: &[&str] = &[
    "스럽다", "롭다", "좋다", "좋네", "좋아", "싸다", "싸네", "비싸다", "높다", "낮다", "많다",
    "적다", "크다", "작다", "없다", "무섭다", "아깝다",
];

const VERB_ENDINGS: &[&str] = &[
    "가즈아", "한다", "했다", "하자", "해라", "간다", "갔다", "가자", "온다", "왔다", "된다",
    "됐다", "는다", "었다", "았다", "였다", "사자", "팔자", "탄다", "탔다",
];

const POSITIVE_TERMS: &[&str] = &[
    "급등", "상승", "떡상", "호재", "가즈아", "좋다", "좋네", "수익", "익절", "불장", "신고가",
    "대박", "오른다", "올랐", "moon", "pump", "bull", "ath",
];

const NEGATIVE_TERMS: &[&str] = &[
    "급락", "하락", "떡락", "악재", "손절", "물렸", "망했", "폭락", "패닉", "손실", "청산",
    "떨어", "dump", "bear", "rug", "scam",
];

fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_alphanumeric() || is_jamo(c)))
        .filter(|t| !t.is_empty())
        .filter(|t| !t.chars().all(|c| c.is_ascii_digit()))
}

/// Compatibility jamo such as ㅋ and ㅠ, used in chat laughter and crying.
fn is_jamo(c: char) -> bool {
    ('\u{3131}'..='\u{318E}').contains(&c)
}

fn strip_particle(token: &str) -> &str {
    for particle in PARTICLES {
        if let Some(stem) = token.strip_suffix(particle) {
            if stem.chars().count() >= 2 {
                return stem;
            }
        }
    }
    token
}

/// Splits text into word classes using suffix and lexicon rules.
///
/// Every token that is not an interjection, adjective, or verb is a noun.
#[derive(Debug, Clone, Default)]
pub struct LexiconTagger;

impl LexiconTagger {
    #[must_use]
    pub fn tag(&self, text: &str) -> MorphologyTags {
        let mut tags = MorphologyTags::default();

        for token in tokenize(text) {
            let lower = token.to_lowercase();
            if INTERJECTIONS.contains(&lower.as_str()) || lower.chars().all(is_jamo) {
                tags.interjections.push(token.to_string());
            } else if ADJECTIVE_ENDINGS.iter().any(|e| token.ends_with(e)) {
                tags.adjectives.push(token.to_string());
            } else if VERB_ENDINGS.iter().any(|e| token.ends_with(e)) {
                tags.verbs.push(token.to_string());
            } else {
                tags.nouns.push(strip_particle(token).to_string());
            }
        }

        tags
    }
}

#[async_trait]
impl MorphologyAnalyzer for LexiconTagger {
    async fn analyze(&self, text: &str) -> Result<MorphologyTags> {
        Ok(self.tag(text))
    }

    fn name(&self) -> &str {
        "lexicon"
    }
}

/// Labels text by its net count of positive and negative terms.
#[derive(Debug, Clone, Default)]
pub struct LexiconSentimentClassifier;

impl LexiconSentimentClassifier {
    #[must_use]
    pub fn score(&self, text: &str) -> i64 {
        let lower = text.to_lowercase();
        let count = |terms: &[&str]| terms.iter().filter(|t| lower.contains(*t)).count() as i64;
        count(POSITIVE_TERMS) - count(NEGATIVE_TERMS)
    }

    #[must_use]
    pub fn label(&self, text: &str) -> Sentiment {
        match self.score(text) {
            s if s > 0 => Sentiment::Positive,
            s if s < 0 => Sentiment::Negative,
            _ => Sentiment::Neutral,
        }
    }
}

#[async_trait]
impl SentimentClassifier for LexiconSentimentClassifier {
    async fn classify(&self, texts: &[String]) -> Result<Vec<Sentiment>> {
        Ok(texts.iter().map(|t| self.label(t)).collect())
    }

    fn name(&self) -> &str {
        "lexicon"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ============================================
    // Tagger Tests
    // ============================================

    #[test]
    fn test_nouns_from_headline() {
        let tags = LexiconTagger.tag("비트코인 급등");
        assert_eq!(tags.nouns, vec!["비트코인", "급등"]);
        assert!(tags.verbs.is_empty());
    }

    #[test]
    fn test_word_classes() {
        let tags = LexiconTagger.tag("헐 이더리움이 간다, 가격 좋다 ㅋㅋㅋ 100");
        assert_eq!(tags.interjections, vec!["헐", "ㅋㅋㅋ"]);
        assert_eq!(tags.nouns, vec!["이더리움", "가격"]);
        assert_eq!(tags.verbs, vec!["간다"]);
        assert_eq!(tags.adjectives, vec!["좋다"]);
    }

    #[test]
    fn test_short_stem_keeps_particle() {
        assert_eq!(strip_particle("시가"), "시가");
        assert_eq!(strip_particle("리플은"), "리플");
        assert_eq!(strip_particle("바이낸스에서"), "바이낸스");
    }

    #[test]
    fn test_empty_text() {
        assert!(LexiconTagger.tag("  ...  ").is_empty());
    }

    // ============================================
    // Sentiment Tests
    // ============================================

    #[test]
    fn test_labels() {
        let classifier = LexiconSentimentClassifier;
        assert_eq!(classifier.label("비트코인 급등"), Sentiment::Positive);
        assert_eq!(classifier.label("리플 폭락 손절함"), Sentiment::Negative);
        assert_eq!(classifier.label("오늘 점심 뭐 먹지"), Sentiment::Neutral);
        assert_eq!(classifier.label("급등 후 급락"), Sentiment::Neutral);
        assert_eq!(classifier.label("TO THE MOON"), Sentiment::Positive);
    }

    #[tokio::test]
    async fn test_classify_is_parallel_to_input() {
        let texts = vec!["떡상".to_string(), "떡락".to_string(), "음".to_string()];
        let labels = LexiconSentimentClassifier.classify(&texts).await.unwrap();
        assert_eq!(
            labels,
            vec![Sentiment::Positive, Sentiment::Negative, Sentiment::Neutral]
        );
    }
}
