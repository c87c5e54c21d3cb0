//! HTTP adapter for the post search service
//!
//! Endpoint: GET {base_url}/search?q=...&since_id=...&max_id=...&count=...
//! Returns: JSON object with a `statuses` array, newest first.

use crate::pipeline::search::SearchClient;
use crate::pipeline::types::FoundPost;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct SearchResponse {
    statuses: Vec<StatusEntry>,
}

#[derive(Debug, Deserialize)]
struct StatusEntry {
    id: i64,
    text: String,
    #[serde(rename = "createdAt")]
    created_at: String,
    #[serde(rename = "isRepost", default)]
    is_repost: bool,
}

/// Search service client with a bounded request timeout.
pub struct HttpSearchClient {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSearchClient {
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
impl SearchClient for HttpSearchClient {
    async fn search(
        &self,
        query: &str,
        since_id: i64,
        max_id: i64,
        page_size: usize,
    ) -> Result<Vec<FoundPost>, Box<dyn std::error::Error + Send + Sync>> {
        let url = format!("{}/search", self.base_url);

        let response = self
            .client
            .get(&url)
            .query(&[
                ("q", query),
                ("result_type", "recent"),
                ("lang", "en"),
                ("since_id", &since_id.to_string()),
                ("max_id", &max_id.to_string()),
                ("count", &page_size.to_string()),
            ])
            .send()
            .await?;

        // Rate-limit and server errors surface to the caller; the fetch
        // stage decides what to abandon.
        if !response.status().is_success() {
            return Err(format!("search API error: {}", response.status()).into());
        }

        let body: SearchResponse = response.json().await?;

        Ok(body
            .statuses
            .into_iter()
            .map(|s| FoundPost {
                post_id: s.id,
                text: s.text,
                created_at: s.created_at,
                is_repost: s.is_repost,
            })
            .collect())
    }
}
