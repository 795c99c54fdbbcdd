// components/drive_archive/src/lib.rs
mod drive;
mod token;

pub use drive::{Archive, DriveArchive, RemoteFolder};
pub use token::{StoredToken, TokenStore};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ArchiveError {
    /// Credential acquisition or refresh failed. Fatal to the whole request:
    /// the pipeline checks this before downloading anything.
    #[error("Storage authentication failed: {0}")]
    Auth(String),

    #[error("Storage request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Storage returned an unusable response: {0}")]
    Api(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Credential blob error: {0}")]
    Json(#[from] serde_json::Error),
}
