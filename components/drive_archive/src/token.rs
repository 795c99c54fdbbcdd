// components/drive_archive/src/token.rs
use crate::ArchiveError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const REFRESH_URL: &str = "https://oauth2.googleapis.com/token";

/// The one durable artifact of the system: an OAuth token blob on disk,
/// read and refreshed across process runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredToken {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl StoredToken {
    /// A token within a minute of expiry is treated as expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now + Duration::seconds(60)
    }
}

/// Loads, refreshes, and persists the credential blob.
pub struct TokenStore {
    path: PathBuf,
    client_id: String,
    client_secret: String,
    http: reqwest::Client,
}

impl TokenStore {
    pub fn new(
        path: impl Into<PathBuf>,
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            http: reqwest::Client::new(),
        }
    }

    /// Return a valid access token, refreshing and re-persisting the blob
    /// when the stored one has expired.
    pub async fn access_token(&self) -> Result<String, ArchiveError> {
        let token = self.load()?;

        if !token.is_expired(Utc::now()) {
            return Ok(token.access_token);
        }

        info!("Stored access token expired, refreshing");
        let refreshed = self.refresh(&token).await?;
        self.save(&refreshed)?;
        Ok(refreshed.access_token)
    }

    pub fn load(&self) -> Result<StoredToken, ArchiveError> {
        let data = fs::read(&self.path).map_err(|e| {
            ArchiveError::Auth(format!(
                "no usable credential blob at {}: {}",
                self.path.display(),
                e
            ))
        })?;
        Ok(serde_json::from_slice(&data)?)
    }

    pub fn save(&self, token: &StoredToken) -> Result<(), ArchiveError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&self.path, serde_json::to_vec_pretty(token)?)?;
        debug!("Persisted credential blob to {}", self.path.display());
        Ok(())
    }

    pub fn blob_path(&self) -> &Path {
        &self.path
    }

    async fn refresh(&self, token: &StoredToken) -> Result<StoredToken, ArchiveError> {
        let payload: RefreshPayload = self
            .http
            .post(REFRESH_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", token.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?
            .error_for_status()
            .map_err(|e| ArchiveError::Auth(format!("token refresh rejected: {}", e)))?
            .json()
            .await?;

        Ok(StoredToken {
            access_token: payload.access_token,
            refresh_token: token.refresh_token.clone(),
            expires_at: Utc::now() + Duration::seconds(payload.expires_in),
        })
    }
}

#[derive(Debug, Deserialize)]
struct RefreshPayload {
    access_token: String,
    expires_in: i64,
}
