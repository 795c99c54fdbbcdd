// components/grab_pipeline/src/progress.rs
use media_fetcher::ProgressEvent;

/// Per-request download progress for the track currently being fetched.
///
/// Each in-flight request owns one of these; it is fed from the fetcher's
/// event channel and read only by that request's reporter loop, so there is
/// no cross-request shared state.
#[derive(Debug, Clone)]
pub struct TrackProgress {
    index: usize,
    total: usize,
    title: Option<String>,
    percent: f64,
}

impl TrackProgress {
    pub fn new(index: usize, total: usize) -> Self {
        Self {
            index,
            total,
            title: None,
            percent: 0.0,
        }
    }

    /// Fold one event into the record. Returns true once the terminal
    /// `Finished` sentinel has been seen, at which point percent is exactly
    /// 100.
    pub fn apply(&mut self, event: ProgressEvent) -> bool {
        match event {
            ProgressEvent::Metadata { title } => {
                self.title = Some(title);
                false
            }
            ProgressEvent::Transferred { downloaded, total } => {
                // Unknown or zero total: leave percent where it is.
                if let Some(total) = total.filter(|t| *t > 0) {
                    let percent = (downloaded as f64 / total as f64 * 100.0).min(100.0);
                    if percent > self.percent {
                        self.percent = percent;
                    }
                }
                false
            }
            ProgressEvent::Finished => {
                self.percent = 100.0;
                true
            }
        }
    }

    /// Nothing useful to render until the source title is known.
    pub fn has_title(&self) -> bool {
        self.title.is_some()
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    /// The single status line shown while this track downloads.
    pub fn render(&self) -> String {
        format!(
            "Downloading song {}/{}: **{}** - {:.1}%",
            self.index,
            self.total,
            self.title.as_deref().unwrap_or(""),
            self.percent,
        )
    }
}
