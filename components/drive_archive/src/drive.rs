// components/drive_archive/src/drive.rs
use crate::token::TokenStore;
use crate::ArchiveError;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::path::Path;
use tracing::info;

const FILES_URL: &str = "https://www.googleapis.com/drive/v3/files";
const UPLOAD_URL: &str =
    "https://www.googleapis.com/upload/drive/v3/files?uploadType=multipart&fields=id,webViewLink";

/// A named folder in the remote store, created once per request.
#[derive(Debug, Clone)]
pub struct RemoteFolder {
    pub id: String,
    pub name: String,
}

impl RemoteFolder {
    /// Public browse link for the folder, used in the final report.
    pub fn link(&self) -> String {
        format!("https://drive.google.com/drive/folders/{}", self.id)
    }
}

/// The storage collaborator.
///
/// `create_folder` is also where credentials get validated: callers invoke it
/// before doing any download work, so a dead credential blob fails the
/// request before bytes are fetched.
#[async_trait]
pub trait Archive: Send + Sync {
    async fn create_folder(&self, name: &str) -> Result<RemoteFolder, ArchiveError>;

    /// Upload one local file into the folder, returning its shareable link.
    /// Failures here are per-file; callers skip and continue.
    async fn upload_file(&self, path: &Path, folder: &RemoteFolder)
        -> Result<String, ArchiveError>;
}

/// Google Drive archive over the v3 REST API.
pub struct DriveArchive {
    http: reqwest::Client,
    tokens: TokenStore,
}

impl DriveArchive {
    pub fn new(tokens: TokenStore) -> Self {
        Self {
            http: reqwest::Client::new(),
            tokens,
        }
    }
}

#[async_trait]
impl Archive for DriveArchive {
    async fn create_folder(&self, name: &str) -> Result<RemoteFolder, ArchiveError> {
        let token = self.tokens.access_token().await?;

        let payload: DriveFilePayload = self
            .http
            .post(format!("{}?fields=id", FILES_URL))
            .bearer_auth(&token)
            .json(&json!({
                "name": name,
                "mimeType": "application/vnd.google-apps.folder",
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        info!("Created folder '{}' with ID {}", name, payload.id);
        Ok(RemoteFolder {
            id: payload.id,
            name: name.to_string(),
        })
    }

    async fn upload_file(
        &self,
        path: &Path,
        folder: &RemoteFolder,
    ) -> Result<String, ArchiveError> {
        let token = self.tokens.access_token().await?;

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| ArchiveError::Api(format!("not a file path: {}", path.display())))?;
        let contents = tokio::fs::read(path).await?;

        let metadata = json!({
            "name": file_name,
            "parents": [folder.id],
        });
        let body = multipart_related_body(&metadata.to_string(), "audio/mpeg", &contents);

        let payload: DriveFilePayload = self
            .http
            .post(UPLOAD_URL)
            .bearer_auth(&token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={}", MULTIPART_BOUNDARY),
            )
            .body(body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        info!("Uploaded {} with ID {}", path.display(), payload.id);
        Ok(payload
            .web_view_link
            .unwrap_or_else(|| format!("https://drive.google.com/file/d/{}/view", payload.id)))
    }
}

const MULTIPART_BOUNDARY: &str = "archive_part_boundary";

/// Drive's multipart upload wants `multipart/related` with a JSON metadata
/// part followed by the media part.
fn multipart_related_body(metadata: &str, media_type: &str, media: &[u8]) -> Vec<u8> {
    let mut body = Vec::with_capacity(media.len() + metadata.len() + 256);
    body.extend_from_slice(
        format!(
            "--{b}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{m}\r\n--{b}\r\nContent-Type: {t}\r\n\r\n",
            b = MULTIPART_BOUNDARY,
            m = metadata,
            t = media_type,
        )
        .as_bytes(),
    );
    body.extend_from_slice(media);
    body.extend_from_slice(format!("\r\n--{}--\r\n", MULTIPART_BOUNDARY).as_bytes());
    body
}

#[derive(Debug, Deserialize)]
struct DriveFilePayload {
    id: String,
    #[serde(rename = "webViewLink")]
    web_view_link: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn folder_link_points_at_the_folder() {
        let folder = RemoteFolder {
            id: "abc123".to_string(),
            name: "Road Trip".to_string(),
        };
        assert_eq!(
            folder.link(),
            "https://drive.google.com/drive/folders/abc123"
        );
    }

    #[test]
    fn multipart_body_sandwiches_the_media() {
        let body = multipart_related_body(r#"{"name":"x.mp3"}"#, "audio/mpeg", b"MEDIA");
        let text = String::from_utf8_lossy(&body);

        assert!(text.starts_with("--archive_part_boundary\r\n"));
        assert!(text.contains(r#"{"name":"x.mp3"}"#));
        assert!(text.contains("Content-Type: audio/mpeg\r\n\r\nMEDIA"));
        assert!(text.ends_with("--archive_part_boundary--\r\n"));
    }

    #[test]
    fn decodes_upload_response() {
        let payload: DriveFilePayload = serde_json::from_str(
            r#"{"id": "f1", "webViewLink": "https://drive.google.com/file/d/f1/view"}"#,
        )
        .unwrap();
        assert_eq!(payload.id, "f1");
        assert!(payload.web_view_link.is_some());

        let folder_only: DriveFilePayload = serde_json::from_str(r#"{"id": "f2"}"#).unwrap();
        assert!(folder_only.web_view_link.is_none());
    }
}
