// bases/archive_bot/src/console.rs
use async_trait::async_trait;
use grab_pipeline::{CompletionNotice, StatusChannel, StatusError};
use std::io::Write;

/// Status channel rendered on the local terminal: `edit` rewrites the
/// current line in place, mirroring how a chat message gets edited.
pub struct ConsoleStatus;

#[async_trait]
impl StatusChannel for ConsoleStatus {
    async fn post(&self, text: &str) -> Result<(), StatusError> {
        println!("{}", text);
        Ok(())
    }

    async fn edit(&self, text: &str) -> Result<(), StatusError> {
        // Carriage return plus erase-line, so successive edits overwrite.
        print!("\r\x1b[2K{}", text);
        std::io::stdout()
            .flush()
            .map_err(|e| StatusError::Transport(e.to_string()))
    }

    async fn finish(&self, notice: &CompletionNotice) -> Result<(), StatusError> {
        println!("\n{}: {}", notice.title, notice.link);
        Ok(())
    }
}
