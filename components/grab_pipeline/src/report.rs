// components/grab_pipeline/src/report.rs

/// Terminal state of a pipeline run that did not abort.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// At least one file made it into the remote folder.
    Done,
    /// The catalog returned zero tracks; no folder was created.
    EmptyCollection,
    /// Every track failed search, fetch, or upload; the folder exists but is
    /// empty.
    NoUploads,
}

/// Tallies derived at the end of a run, used to render the final message.
#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub outcome: Outcome,
    pub total_tracks: usize,
    pub search_misses: usize,
    pub downloaded: usize,
    pub uploaded: usize,
    pub folder_link: Option<String>,
}

impl PipelineReport {
    pub fn empty_collection() -> Self {
        Self {
            outcome: Outcome::EmptyCollection,
            total_tracks: 0,
            search_misses: 0,
            downloaded: 0,
            uploaded: 0,
            folder_link: None,
        }
    }
}
