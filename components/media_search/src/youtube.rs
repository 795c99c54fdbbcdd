// components/media_search/src/youtube.rs
use crate::{MediaLocator, SearchClient, SearchError};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

const SEARCH_URL: &str = "https://www.googleapis.com/youtube/v3/search";

/// YouTube Data API v3 search, asking for the single best video match.
pub struct YouTubeSearch {
    http: reqwest::Client,
    api_key: String,
}

impl YouTubeSearch {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl SearchClient for YouTubeSearch {
    async fn find(&self, query: &str) -> Result<Option<MediaLocator>, SearchError> {
        debug!("Searching for: {}", query);

        let payload: SearchPayload = self
            .http
            .get(SEARCH_URL)
            .query(&[
                ("q", query),
                ("part", "id,snippet"),
                ("maxResults", "1"),
                ("type", "video"),
                ("key", &self.api_key),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let Some(video_id) = payload
            .items
            .into_iter()
            .next()
            .and_then(|item| item.id.video_id)
        else {
            info!("No search results for: {}", query);
            return Ok(None);
        };

        let url = Url::parse(&format!("https://www.youtube.com/watch?v={}", video_id))
            .map_err(|e| SearchError::Api(format!("bad video id '{}': {}", video_id, e)))?;

        info!("Search result for '{}': {}", query, url);
        Ok(Some(MediaLocator::new(url)))
    }
}

#[derive(Debug, Deserialize)]
struct SearchPayload {
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    id: SearchItemId,
}

#[derive(Debug, Deserialize)]
struct SearchItemId {
    #[serde(rename = "videoId")]
    video_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_a_hit() {
        let payload: SearchPayload = serde_json::from_value(json!({
            "items": [
                { "id": { "kind": "youtube#video", "videoId": "dQw4w9WgXcQ" } }
            ]
        }))
        .unwrap();

        assert_eq!(payload.items.len(), 1);
        assert_eq!(payload.items[0].id.video_id.as_deref(), Some("dQw4w9WgXcQ"));
    }

    #[test]
    fn decodes_zero_results() {
        let payload: SearchPayload = serde_json::from_value(json!({ "items": [] })).unwrap();
        assert!(payload.items.is_empty());
    }
}
