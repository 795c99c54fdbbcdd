// components/media_fetcher/src/lib.rs
mod types;
mod ytdlp;

pub use types::{FetchError, Fetcher, ProgressEvent};
pub use ytdlp::YtDlp;
