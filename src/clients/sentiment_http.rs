//! HTTP adapter for the sentiment analysis service
//!
//! Endpoint: POST {base_url}/analyze with a JSON document; one post per
//! call. Returns the document-level score and magnitude.

use crate::pipeline::analysis::SentimentClient;
use crate::pipeline::types::SentimentScore;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Serialize)]
struct AnalyzeRequest<'a> {
    document: &'a str,
    language: &'a str,
}

#[derive(Debug, Deserialize)]
struct AnalyzeResponse {
    score: f32,
    magnitude: f32,
}

/// Sentiment service client with a bounded request timeout.
pub struct HttpSentimentClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSentimentClient {
    pub fn new(base_url: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl SentimentClient for HttpSentimentClient {
    async fn analyze(
        &self,
        text: &str,
        language: &str,
    ) -> Result<SentimentScore, Box<dyn std::error::Error + Send + Sync>> {
        let url = format!("{}/analyze", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&AnalyzeRequest {
                document: text,
                language,
            })
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(format!("sentiment API error: {}", response.status()).into());
        }

        let body: AnalyzeResponse = response.json().await?;

        Ok(SentimentScore {
            score: body.score,
            magnitude: body.magnitude,
        })
    }
}
