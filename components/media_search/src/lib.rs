// components/media_search/src/lib.rs
mod youtube;

pub use youtube::YouTubeSearch;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Search request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Search returned an unusable response: {0}")]
    Api(String),
}

/// An opaque reference to a streamable media resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaLocator(Url);

impl MediaLocator {
    pub fn new(url: Url) -> Self {
        Self(url)
    }

    pub fn as_url(&self) -> &Url {
        &self.0
    }
}

impl std::fmt::Display for MediaLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// The search collaborator: one best-effort query per track, no retries.
///
/// `Ok(None)` means "no candidate found" and is a per-track, non-fatal
/// condition for the caller.
#[async_trait]
pub trait SearchClient: Send + Sync {
    async fn find(&self, query: &str) -> Result<Option<MediaLocator>, SearchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locator_displays_as_its_url() {
        let locator = MediaLocator::new(Url::parse("https://www.youtube.com/watch?v=abc").unwrap());
        assert_eq!(locator.to_string(), "https://www.youtube.com/watch?v=abc");
    }
}
