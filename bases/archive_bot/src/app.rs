// bases/archive_bot/src/app.rs
use crate::config::Config;
use crate::console::ConsoleStatus;
use collection_catalog::SpotifyCatalog;
use color_eyre::Result;
use drive_archive::{DriveArchive, TokenStore};
use grab_pipeline::{Pipeline, Request, StatusChannel};
use media_fetcher::{Fetcher, YtDlp};
use media_search::YouTubeSearch;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Mutex;
use tracing::{error, info};

pub struct App {
    pipeline: Arc<Pipeline>,
    fetcher: Arc<YtDlp>,
    status: Arc<ConsoleStatus>,
    prefix: String,
    // Admission gate: held for the duration of one request, so a second
    // command arriving mid-flight is rejected instead of racing the first.
    busy: Arc<Mutex<()>>,
}

impl App {
    pub fn new(config: Config) -> Self {
        let catalog = Arc::new(SpotifyCatalog::new(
            config.spotify_client_id,
            config.spotify_client_secret,
        ));
        let search = Arc::new(YouTubeSearch::new(config.youtube_api_key));
        let fetcher = Arc::new(YtDlp);
        let tokens = TokenStore::new(
            config.google_token_file,
            config.google_client_id,
            config.google_client_secret,
        );
        let archive = Arc::new(DriveArchive::new(tokens));
        let status = Arc::new(ConsoleStatus);

        let pipeline = Pipeline::new(catalog, search, fetcher.clone(), archive, status.clone())
            .with_poll_interval(config.poll_interval);

        Self {
            pipeline: Arc::new(pipeline),
            fetcher,
            status,
            prefix: config.prefix,
            busy: Arc::new(Mutex::new(())),
        }
    }

    pub async fn run(&self) -> Result<()> {
        self.fetcher.check_available().await?;
        info!("Listening for '{} <url>' commands", self.prefix);

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        while let Some(line) = lines.next_line().await? {
            let Some(url) = parse_command(&line, &self.prefix) else {
                continue;
            };

            let Ok(guard) = self.busy.clone().try_lock_owned() else {
                let _ = self
                    .status
                    .post("A request is already in flight, try again once it finishes.")
                    .await;
                continue;
            };

            let request = Request::new(url, "console");
            let pipeline = self.pipeline.clone();
            tokio::spawn(async move {
                let _guard = guard;
                match pipeline.run(&request).await {
                    Ok(report) => info!(
                        "Request finished: {:?}, {}/{} tracks uploaded",
                        report.outcome, report.uploaded, report.total_tracks
                    ),
                    Err(e) => error!("Request failed: {}", e),
                }
            });
        }

        Ok(())
    }
}

/// Extract the URL argument from a command line, or None when the line is
/// not a command. Validation of the URL itself is the pipeline's job.
fn parse_command<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(prefix)?;
    if !rest.starts_with(char::is_whitespace) {
        return None;
    }
    let url = rest.trim();
    (!url.is_empty()).then_some(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_the_url_from_a_command() {
        assert_eq!(
            parse_command("!d https://open.spotify.com/playlist/ABC", "!d"),
            Some("https://open.spotify.com/playlist/ABC")
        );
    }

    #[test]
    fn ignores_chatter_and_other_commands() {
        assert_eq!(parse_command("hello there", "!d"), None);
        assert_eq!(parse_command("!download something", "!d"), None);
        assert_eq!(parse_command("!d", "!d"), None);
        assert_eq!(parse_command("!d   ", "!d"), None);
    }
}
