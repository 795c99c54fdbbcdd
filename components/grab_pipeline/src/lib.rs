// components/grab_pipeline/src/lib.rs
mod pipeline;
mod progress;
mod report;
mod status;

pub use pipeline::{Pipeline, PipelineError, Request};
pub use progress::TrackProgress;
pub use report::{Outcome, PipelineReport};
pub use status::{CompletionNotice, StatusChannel, StatusError};
