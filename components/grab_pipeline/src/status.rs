// components/grab_pipeline/src/status.rs
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatusError {
    #[error("Status channel error: {0}")]
    Transport(String),
}

/// The final rich result: a headline plus the remote folder link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionNotice {
    pub title: String,
    pub link: String,
}

/// The outbound status surface of the chat platform.
///
/// One status message exists per request: `post` creates it, `edit` replaces
/// its text in place, `finish` upgrades it to the final rich result. Edits
/// are best-effort for callers; a failed edit must never abort a pipeline.
#[async_trait]
pub trait StatusChannel: Send + Sync {
    async fn post(&self, text: &str) -> Result<(), StatusError>;
    async fn edit(&self, text: &str) -> Result<(), StatusError>;
    async fn finish(&self, notice: &CompletionNotice) -> Result<(), StatusError>;
}
