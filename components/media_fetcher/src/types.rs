// components/media_fetcher/src/types.rs
use std::path::Path;
use thiserror::Error;
use tokio::sync::mpsc;
use url::Url;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Required dependency not found: {0}")]
    DependencyNotFound(&'static str),

    #[error("Could not read source metadata: {0}")]
    MetadataFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Incremental progress pushed by a fetch onto its event channel.
///
/// `Finished` is the terminal sentinel: it is sent exactly once, after the
/// audio file has been fully written, and unblocks the consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Metadata { title: String },
    Transferred { downloaded: u64, total: Option<u64> },
    Finished,
}

/// The download/transcode collaborator.
///
/// A fetch streams the media behind a locator, converts it to mp3 in the
/// destination directory, and reports progress on the given channel. Failures
/// are per-track: the caller skips and continues.
#[async_trait::async_trait]
pub trait Fetcher: Send + Sync {
    /// Check that the fetcher has all required external dependencies.
    async fn check_available(&self) -> Result<(), FetchError>;

    /// Resolve the source's display title without downloading anything.
    async fn probe_title(&self, locator: &Url) -> Result<String, FetchError>;

    /// Download and transcode into `dest_dir`, emitting progress events.
    async fn fetch_audio(
        &self,
        locator: &Url,
        dest_dir: &Path,
        progress: mpsc::Sender<ProgressEvent>,
    ) -> Result<(), FetchError>;
}
