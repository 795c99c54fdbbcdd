// components/collection_catalog/src/spotify.rs
use crate::types::{Collection, CollectionKind, CollectionRef, ResolveError, TrackDescriptor};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
const API_BASE: &str = "https://api.spotify.com/v1";

/// The catalog collaborator: a classified reference in, name + ordered tracks out.
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn resolve(&self, collection: &CollectionRef) -> Result<Collection, ResolveError>;
}

/// Spotify Web API catalog using the client-credentials flow.
pub struct SpotifyCatalog {
    http: reqwest::Client,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl SpotifyCatalog {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            token: Mutex::new(None),
        }
    }

    /// Return a valid bearer token, requesting a fresh one when the cached
    /// token is missing or within a minute of expiry.
    async fn bearer_token(&self) -> Result<String, ResolveError> {
        let mut slot = self.token.lock().await;
        if let Some(cached) = slot.as_ref() {
            if cached.expires_at > Instant::now() + Duration::from_secs(60) {
                return Ok(cached.value.clone());
            }
        }

        debug!("Requesting new catalog access token");
        let payload: TokenPayload = self
            .http
            .post(TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let token = CachedToken {
            value: payload.access_token,
            expires_at: Instant::now() + Duration::from_secs(payload.expires_in),
        };
        let value = token.value.clone();
        *slot = Some(token);
        Ok(value)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        token: &str,
    ) -> Result<T, ResolveError> {
        Ok(self
            .http
            .get(url)
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    async fn resolve_playlist(&self, id: &str, token: &str) -> Result<Collection, ResolveError> {
        let url = format!("{}/playlists/{}", API_BASE, id);
        let payload: PlaylistPayload = self.get_json(&url, token).await?;

        let mut tracks: Vec<TrackDescriptor> = payload
            .tracks
            .items
            .into_iter()
            .filter_map(|item| item.track)
            .map(TrackPayload::into_descriptor)
            .collect();

        // Follow paging links until the playlist is exhausted.
        let mut next = payload.tracks.next;
        while let Some(page_url) = next {
            let page: Page<PlaylistItem> = self.get_json(&page_url, token).await?;
            tracks.extend(
                page.items
                    .into_iter()
                    .filter_map(|item| item.track)
                    .map(TrackPayload::into_descriptor),
            );
            next = page.next;
        }

        Ok(Collection {
            name: payload.name,
            tracks,
        })
    }

    async fn resolve_album(&self, id: &str, token: &str) -> Result<Collection, ResolveError> {
        let url = format!("{}/albums/{}", API_BASE, id);
        let payload: AlbumPayload = self.get_json(&url, token).await?;

        let mut tracks: Vec<TrackDescriptor> = payload
            .tracks
            .items
            .into_iter()
            .map(TrackPayload::into_descriptor)
            .collect();

        let mut next = payload.tracks.next;
        while let Some(page_url) = next {
            let page: Page<TrackPayload> = self.get_json(&page_url, token).await?;
            tracks.extend(page.items.into_iter().map(TrackPayload::into_descriptor));
            next = page.next;
        }

        Ok(Collection {
            name: payload.name,
            tracks,
        })
    }
}

#[async_trait]
impl CatalogClient for SpotifyCatalog {
    async fn resolve(&self, collection: &CollectionRef) -> Result<Collection, ResolveError> {
        let token = self.bearer_token().await?;
        match collection.kind {
            CollectionKind::Playlist => self.resolve_playlist(&collection.id, &token).await,
            CollectionKind::Album => self.resolve_album(&collection.id, &token).await,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenPayload {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    items: Vec<T>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PlaylistPayload {
    name: String,
    tracks: Page<PlaylistItem>,
}

#[derive(Debug, Deserialize)]
struct PlaylistItem {
    // Null for tracks removed from the catalog and for non-track episodes.
    track: Option<TrackPayload>,
}

#[derive(Debug, Deserialize)]
struct AlbumPayload {
    name: String,
    tracks: Page<TrackPayload>,
}

#[derive(Debug, Deserialize)]
struct TrackPayload {
    name: String,
    artists: Vec<ArtistPayload>,
}

#[derive(Debug, Deserialize)]
struct ArtistPayload {
    name: String,
}

impl TrackPayload {
    fn into_descriptor(self) -> TrackDescriptor {
        TrackDescriptor::new(
            self.artists.into_iter().map(|a| a.name).collect(),
            self.name,
        )
    }
}
