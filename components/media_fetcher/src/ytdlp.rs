// components/media_fetcher/src/ytdlp.rs
use crate::types::{FetchError, Fetcher, ProgressEvent};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::Path;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};
use url::Url;

/// Progress lines are emitted on stdout as `downloaded/total`, with `NA`
/// standing in for an unknown total.
const PROGRESS_TEMPLATE: &str =
    "download:%(progress.downloaded_bytes)s/%(progress.total_bytes,progress.total_bytes_estimate)s";

/// Fetcher backed by the `yt-dlp` binary, transcoding to mp3 via its
/// bundled ffmpeg postprocessor. Output filenames bound the title to 80
/// characters.
pub struct YtDlp;

#[async_trait]
impl Fetcher for YtDlp {
    async fn check_available(&self) -> Result<(), FetchError> {
        which::which("yt-dlp")
            .map(|_| ())
            .map_err(|_| FetchError::DependencyNotFound("yt-dlp"))
    }

    async fn probe_title(&self, locator: &Url) -> Result<String, FetchError> {
        let output = Command::new("yt-dlp")
            .arg("--dump-json")
            .arg("--no-download")
            .arg(locator.as_str())
            .output()
            .await?;

        if !output.status.success() {
            return Err(FetchError::MetadataFailed(
                String::from_utf8_lossy(&output.stderr).into_owned(),
            ));
        }

        let meta: YtDlpMetadata = serde_json::from_slice(&output.stdout)
            .map_err(|e| FetchError::MetadataFailed(e.to_string()))?;

        Ok(meta.title)
    }

    async fn fetch_audio(
        &self,
        locator: &Url,
        dest_dir: &Path,
        progress: mpsc::Sender<ProgressEvent>,
    ) -> Result<(), FetchError> {
        let template = dest_dir.join("%(title).80s.%(ext)s");
        let template = template.to_str().ok_or_else(|| {
            FetchError::DownloadFailed("destination path is not valid UTF-8".to_string())
        })?;

        let mut child = Command::new("yt-dlp")
            .arg("-x")
            .arg("--audio-format").arg("mp3")
            .arg("--audio-quality").arg("0")
            .arg("--format").arg("bestaudio/best")
            .arg("-o").arg(template)
            .arg("--quiet")
            .arg("--no-warnings")
            .arg("--newline")
            .arg("--progress")
            .arg("--progress-template").arg(PROGRESS_TEMPLATE)
            .arg(locator.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        let stdout = child.stdout.take().ok_or_else(|| {
            FetchError::DownloadFailed("could not capture yt-dlp stdout".to_string())
        })?;
        let mut stderr = child.stderr.take().ok_or_else(|| {
            FetchError::DownloadFailed("could not capture yt-dlp stderr".to_string())
        })?;

        // Drain both pipes together so neither can stall the process.
        let drain_progress = async {
            let mut lines = BufReader::new(stdout).lines();
            while let Some(line) = lines.next_line().await? {
                if let Some(event) = parse_progress_line(&line) {
                    // A dropped receiver only means nobody is watching anymore.
                    let _ = progress.send(event).await;
                } else {
                    debug!("Unrecognized yt-dlp output: {}", line);
                }
            }
            Ok::<(), std::io::Error>(())
        };
        let drain_stderr = async {
            let mut captured = String::new();
            if let Err(e) = stderr.read_to_string(&mut captured).await {
                warn!("Could not read yt-dlp stderr: {}", e);
            }
            captured
        };
        let (drained, error_output) = tokio::join!(drain_progress, drain_stderr);
        drained?;

        let status = child.wait().await?;
        if !status.success() {
            return Err(FetchError::DownloadFailed(if error_output.is_empty() {
                format!("yt-dlp exited with status: {}", status)
            } else {
                error_output.trim().to_string()
            }));
        }

        let _ = progress.send(ProgressEvent::Finished).await;
        Ok(())
    }
}

/// Parse one templated progress line into a transfer event.
fn parse_progress_line(line: &str) -> Option<ProgressEvent> {
    let (downloaded, total) = line.trim().split_once('/')?;
    let downloaded = parse_byte_count(downloaded)?;
    let total = parse_byte_count(total);
    Some(ProgressEvent::Transferred { downloaded, total })
}

/// yt-dlp renders exact byte counts as integers but estimated ones (e.g.
/// `total_bytes_estimate`) as float strings like `1048576.0`; accept both.
fn parse_byte_count(field: &str) -> Option<u64> {
    if let Ok(count) = field.parse::<u64>() {
        return Some(count);
    }
    let count = field.parse::<f64>().ok()?;
    (count.is_finite() && count >= 0.0).then(|| count as u64)
}

#[derive(Debug, Deserialize)]
struct YtDlpMetadata {
    title: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn parses_progress_with_known_total() {
        assert_matches!(
            parse_progress_line("524288/1048576"),
            Some(ProgressEvent::Transferred {
                downloaded: 524288,
                total: Some(1048576),
            })
        );
    }

    #[test]
    fn parses_progress_with_estimated_float_total() {
        assert_matches!(
            parse_progress_line("524288/1048576.0"),
            Some(ProgressEvent::Transferred {
                downloaded: 524288,
                total: Some(1048576),
            })
        );
        assert_matches!(
            parse_progress_line("524288.0/1048576.5"),
            Some(ProgressEvent::Transferred {
                downloaded: 524288,
                total: Some(1048576),
            })
        );
    }

    #[test]
    fn parses_progress_with_unknown_total() {
        assert_matches!(
            parse_progress_line("524288/NA"),
            Some(ProgressEvent::Transferred {
                downloaded: 524288,
                total: None,
            })
        );
    }

    #[test]
    fn ignores_unrelated_output() {
        assert_matches!(parse_progress_line("[ExtractAudio] Destination: x.mp3"), None);
        assert_matches!(parse_progress_line(""), None);
    }

    #[test]
    fn decodes_metadata_title() {
        let meta: YtDlpMetadata =
            serde_json::from_str(r#"{"title": "A Song", "duration": 180.0}"#).unwrap();
        assert_eq!(meta.title, "A Song");
    }
}
