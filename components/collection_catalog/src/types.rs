// components/collection_catalog/src/types.rs
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("URL does not point at a playlist or album: {0}")]
    UnrecognizedUrl(String),

    #[error("Catalog request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Catalog returned an unusable response: {0}")]
    Api(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CollectionKind {
    Playlist,
    Album,
}

/// A classified reference to a playlist or album, extracted from a user URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionRef {
    pub kind: CollectionKind,
    pub id: String,
}

impl CollectionRef {
    /// Classify a user-supplied URL by its path segments.
    ///
    /// Recognizes `.../playlist/{id}` and `.../album/{id}` where the id is
    /// alphanumeric. Anything else is an unrecognized URL.
    pub fn parse(raw: &str) -> Result<Self, ResolveError> {
        let url =
            Url::parse(raw).map_err(|_| ResolveError::UnrecognizedUrl(raw.to_string()))?;

        let segments: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        for window in segments.windows(2) {
            let kind = match window[0] {
                "playlist" => CollectionKind::Playlist,
                "album" => CollectionKind::Album,
                _ => continue,
            };
            let id = window[1];
            if !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Ok(Self {
                    kind,
                    id: id.to_string(),
                });
            }
        }

        Err(ResolveError::UnrecognizedUrl(raw.to_string()))
    }
}

/// One track of a collection, in collection order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackDescriptor {
    pub artists: Vec<String>,
    pub title: String,
}

impl TrackDescriptor {
    pub fn new(artists: Vec<String>, title: impl Into<String>) -> Self {
        Self {
            artists,
            title: title.into(),
        }
    }

    /// Render as `"Artist1, Artist2 - Title"`, the form used as a search query.
    pub fn display(&self) -> String {
        if self.artists.is_empty() {
            self.title.clone()
        } else {
            format!("{} - {}", self.artists.join(", "), self.title)
        }
    }
}

/// A resolved playlist or album: display name plus tracks in original order.
#[derive(Debug, Clone)]
pub struct Collection {
    pub name: String,
    pub tracks: Vec<TrackDescriptor>,
}
