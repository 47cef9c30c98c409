//! HTTP client for an external NLP service.
//!
//! Endpoints:
//! - `POST /morphology` `{"text": ..}` returns the four word-class lists
//! - `POST /sentiment` `{"texts": [..]}` returns `{"labels": [..]}`, parallel to the input

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use coin_pulse_core::{
    MorphologyAnalyzer, MorphologyTags, PipelineError, Sentiment, SentimentClassifier,
};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct MorphologyRequest<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct SentimentRequest<'a> {
    texts: &'a [String],
}

#[derive(Debug, Deserialize)]
struct SentimentResponse {
    labels: Vec<String>,
}

/// Analysis-service handle implementing both analysis traits.
pub struct RemoteAnalyzer {
    http: Client,
    base_url: String,
}

impl RemoteAnalyzer {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(%url, "POST");

        let response = self
            .http
            .post(&url)
            .json(body)
            .send()
            .await
            .with_context(|| format!("Analysis service request to {path} failed"))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Analysis service error {}: {}", status, text));
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Malformed analysis service response from {path}"))
    }
}

#[async_trait]
impl MorphologyAnalyzer for RemoteAnalyzer {
    async fn analyze(&self, text: &str) -> Result<MorphologyTags> {
        self.post("/morphology", &MorphologyRequest { text }).await
    }

    fn name(&self) -> &str {
        "remote"
    }
}

#[async_trait]
impl SentimentClassifier for RemoteAnalyzer {
    async fn classify(&self, texts: &[String]) -> Result<Vec<Sentiment>> {
        let response: SentimentResponse = self.post("/sentiment", &SentimentRequest { texts }).await?;

        if response.labels.len() != texts.len() {
            return Err(PipelineError::MalformedRecord(format!(
                "expected {} sentiment labels, got {}",
                texts.len(),
                response.labels.len()
            ))
            .into());
        }

        response
            .labels
            .iter()
            .map(|label| label.parse::<Sentiment>().map_err(anyhow::Error::from))
            .collect()
    }

    fn name(&self) -> &str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn analyzer(uri: &str) -> RemoteAnalyzer {
        RemoteAnalyzer::new(uri, Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn test_base_url_trailing_slash() {
        assert_eq!(analyzer("http://nlp:8000/").base_url(), "http://nlp:8000");
    }

    #[tokio::test]
    async fn test_morphology_request() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/morphology"))
            .and(body_json(json!({"text": "비트코인 급등"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "nouns": ["비트코인", "급등"],
                "adjectives": [],
                "verbs": [],
                "interjections": []
            })))
            .mount(&mock_server)
            .await;

        let tags = analyzer(&mock_server.uri())
            .analyze("비트코인 급등")
            .await
            .unwrap();
        assert_eq!(tags.nouns, vec!["비트코인", "급등"]);
    }

    #[tokio::test]
    async fn test_sentiment_labels_parsed() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/sentiment"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "labels": ["positive", "Negative", "neutral"]
            })))
            .mount(&mock_server)
            .await;

        let texts = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let labels = analyzer(&mock_server.uri()).classify(&texts).await.unwrap();
        assert_eq!(
            labels,
            vec![Sentiment::Positive, Sentiment::Negative, Sentiment::Neutral]
        );
    }

    #[tokio::test]
    async fn test_sentiment_length_mismatch_is_malformed() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/sentiment"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"labels": ["positive"]})))
            .mount(&mock_server)
            .await;

        let texts = vec!["a".to_string(), "b".to_string()];
        let err = analyzer(&mock_server.uri()).classify(&texts).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::MalformedRecord(_))
        ));
    }

    #[tokio::test]
    async fn test_server_error_surfaces_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/morphology"))
            .respond_with(ResponseTemplate::new(503).set_body_string("model loading"))
            .mount(&mock_server)
            .await;

        let err = analyzer(&mock_server.uri()).analyze("x").await.unwrap_err();
        assert!(err.to_string().contains("503"));
    }
}
