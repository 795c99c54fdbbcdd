// components/grab_pipeline/src/pipeline.rs
use crate::progress::TrackProgress;
use crate::report::{Outcome, PipelineReport};
use crate::status::{CompletionNotice, StatusChannel};
use chrono::{DateTime, Utc};
use collection_catalog::{CatalogClient, CollectionKind, CollectionRef, ResolveError};
use drive_archive::{Archive, ArchiveError};
use media_fetcher::{FetchError, Fetcher, ProgressEvent};
use media_search::SearchClient;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Unrecognized collection URL: {0}")]
    InvalidUrl(#[source] ResolveError),

    #[error("Could not resolve the collection: {0}")]
    Resolve(#[source] ResolveError),

    #[error("Storage authentication or folder creation failed: {0}")]
    Auth(#[source] ArchiveError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One chat command, frozen at arrival. Discarded when the run finishes.
#[derive(Debug, Clone)]
pub struct Request {
    pub url: String,
    pub requester: String,
    pub received_at: DateTime<Utc>,
}

impl Request {
    pub fn new(url: impl Into<String>, requester: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            requester: requester.into(),
            received_at: Utc::now(),
        }
    }
}

/// Sequential download-and-archive coordinator.
///
/// Per request: resolve the collection, create the remote folder (which
/// validates credentials before any download work), then for each track in
/// order run the fetcher and the progress reporter together, and finally
/// upload everything that was produced. Per-track and per-file failures are
/// skipped; only URL classification and the folder/credential step abort.
pub struct Pipeline {
    catalog: Arc<dyn CatalogClient>,
    search: Arc<dyn SearchClient>,
    fetcher: Arc<dyn Fetcher>,
    archive: Arc<dyn Archive>,
    status: Arc<dyn StatusChannel>,
    poll_interval: Duration,
}

impl Pipeline {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        search: Arc<dyn SearchClient>,
        fetcher: Arc<dyn Fetcher>,
        archive: Arc<dyn Archive>,
        status: Arc<dyn StatusChannel>,
    ) -> Self {
        Self {
            catalog,
            search,
            fetcher,
            archive,
            status,
            poll_interval: Duration::from_secs(1),
        }
    }

    /// Override the reporter's render interval (default: once per second).
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub async fn run(&self, request: &Request) -> Result<PipelineReport, PipelineError> {
        if let Err(e) = self
            .status
            .post(&format!(
                "Received playlist/album request from {}...",
                request.requester
            ))
            .await
        {
            warn!("Could not post status message: {}", e);
        }

        let collection_ref = match CollectionRef::parse(&request.url) {
            Ok(r) => r,
            Err(e) => {
                self.try_edit("Could not find a playlist or album ID in that URL.")
                    .await;
                return Err(PipelineError::InvalidUrl(e));
            }
        };
        let kind_name = match collection_ref.kind {
            CollectionKind::Playlist => "playlist",
            CollectionKind::Album => "album",
        };

        info!("Resolving {} {}", kind_name, collection_ref.id);
        let collection = match self.catalog.resolve(&collection_ref).await {
            Ok(c) => c,
            Err(e) => {
                self.try_edit(&format!("Could not fetch the {}: {}", kind_name, e))
                    .await;
                return Err(PipelineError::Resolve(e));
            }
        };

        if collection.tracks.is_empty() {
            self.try_edit(&format!("No songs found in the {}.", kind_name))
                .await;
            return Ok(PipelineReport::empty_collection());
        }
        let total = collection.tracks.len();

        // Scratch space for this request. Dropping the TempDir deletes it on
        // every exit path, success or failure.
        let workdir = match TempDir::new() {
            Ok(dir) => dir,
            Err(e) => {
                self.try_edit("Could not allocate scratch space for this request.")
                    .await;
                return Err(PipelineError::Io(e));
            }
        };

        // Folder creation validates credentials, so a dead token fails the
        // request before a single byte is downloaded.
        let folder = match self.archive.create_folder(&collection.name).await {
            Ok(f) => f,
            Err(e) => {
                self.try_edit(&format!("Failed to authenticate/upload: {}", e))
                    .await;
                return Err(PipelineError::Auth(e));
            }
        };

        let mut produced: Vec<PathBuf> = Vec::new();
        let mut seen: HashSet<PathBuf> = HashSet::new();
        let mut search_misses = 0usize;
        let mut downloaded = 0usize;

        for (index, track) in collection.tracks.iter().enumerate() {
            let position = index + 1;
            let query = track.display();

            let locator = match self.search.find(&query).await {
                Ok(Some(locator)) => locator,
                Ok(None) => {
                    info!("Skipping (no search result): {}", query);
                    search_misses += 1;
                    continue;
                }
                Err(e) => {
                    warn!("Search failed for '{}': {}", query, e);
                    search_misses += 1;
                    continue;
                }
            };

            // Fetcher and reporter run together for this one track; both are
            // awaited before the next track starts.
            let (tx, rx) = mpsc::channel::<ProgressEvent>(32);
            let reporter = self.report_progress(rx, TrackProgress::new(position, total));
            let dest = workdir.path().to_path_buf();
            let fetch = async move {
                let title = self.fetcher.probe_title(locator.as_url()).await?;
                let _ = tx.send(ProgressEvent::Metadata { title }).await;
                self.fetcher
                    .fetch_audio(locator.as_url(), &dest, tx.clone())
                    .await
                // tx drops here, so the reporter unblocks even when the
                // fetch fails before sending the Finished sentinel.
            };
            let (fetched, ()): (Result<(), FetchError>, ()) = tokio::join!(fetch, reporter);

            match fetched {
                Ok(()) => {
                    downloaded += 1;
                    // A scan failure costs this track's files, not the run.
                    match new_audio_files(workdir.path(), &mut seen).await {
                        Ok(fresh) => produced.extend(fresh),
                        Err(e) => {
                            warn!("Could not scan scratch directory after '{}': {}", query, e)
                        }
                    }
                }
                Err(e) => warn!("Skipping '{}': {}", query, e),
            }
        }

        self.try_edit(&format!(
            "All songs downloaded. Uploading to folder '{}'...",
            folder.name
        ))
        .await;

        let mut links: Vec<String> = Vec::new();
        for path in &produced {
            match self.archive.upload_file(path, &folder).await {
                Ok(link) => links.push(link),
                Err(e) => warn!("Upload failed for {}: {}", path.display(), e),
            }
        }

        let report = PipelineReport {
            outcome: if links.is_empty() {
                Outcome::NoUploads
            } else {
                Outcome::Done
            },
            total_tracks: total,
            search_misses,
            downloaded,
            uploaded: links.len(),
            folder_link: Some(folder.link()),
        };

        match report.outcome {
            Outcome::NoUploads => {
                self.try_edit("Upload failed for all songs.").await;
            }
            _ => {
                let notice = CompletionNotice {
                    title: "Your playlist is here".to_string(),
                    link: folder.link(),
                };
                if let Err(e) = self.status.finish(&notice).await {
                    warn!("Could not send final status message: {}", e);
                }
            }
        }

        Ok(report)
    }

    /// Drain one track's progress events, re-rendering the status line at a
    /// fixed interval until the Finished sentinel (or the channel closing,
    /// which means the fetch gave up).
    async fn report_progress(&self, mut rx: mpsc::Receiver<ProgressEvent>, mut progress: TrackProgress) {
        let mut ticker = tokio::time::interval(self.poll_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                event = rx.recv() => match event {
                    Some(event) => {
                        if progress.apply(event) {
                            // Final render shows exactly 100%.
                            self.try_edit(&progress.render()).await;
                            break;
                        }
                    }
                    None => break,
                },
                _ = ticker.tick() => {
                    if progress.has_title() {
                        self.try_edit(&progress.render()).await;
                    }
                }
            }
        }
    }

    async fn try_edit(&self, text: &str) {
        if let Err(e) = self.status.edit(text).await {
            warn!("Could not update status message: {}", e);
        }
    }
}

/// Audio files that appeared in the scratch directory since the last scan,
/// in name order.
async fn new_audio_files(
    dir: &Path,
    seen: &mut HashSet<PathBuf>,
) -> std::io::Result<Vec<PathBuf>> {
    let mut fresh = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some("mp3") && seen.insert(path.clone()) {
            fresh.push(path);
        }
    }
    fresh.sort();
    Ok(fresh)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::StatusError;
    use assert_matches::assert_matches;
    use async_trait::async_trait;
    use collection_catalog::{Collection, TrackDescriptor};
    use drive_archive::RemoteFolder;
    use media_search::{MediaLocator, SearchError};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use url::Url;

    fn track(artist: &str, title: &str) -> TrackDescriptor {
        TrackDescriptor::new(vec![artist.to_string()], title)
    }

    struct StubCatalog {
        collection: Collection,
        calls: AtomicUsize,
    }

    impl StubCatalog {
        fn new(tracks: Vec<TrackDescriptor>) -> Self {
            Self {
                collection: Collection {
                    name: "Test Collection".to_string(),
                    tracks,
                },
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl CatalogClient for StubCatalog {
        async fn resolve(&self, _collection: &CollectionRef) -> Result<Collection, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.collection.clone())
        }
    }

    struct StubSearch {
        miss: bool,
        queries: Mutex<Vec<String>>,
    }

    impl StubSearch {
        fn hits() -> Self {
            Self {
                miss: false,
                queries: Mutex::new(Vec::new()),
            }
        }

        fn misses() -> Self {
            Self {
                miss: true,
                queries: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl SearchClient for StubSearch {
        async fn find(&self, query: &str) -> Result<Option<MediaLocator>, SearchError> {
            self.queries.lock().unwrap().push(query.to_string());
            if self.miss {
                return Ok(None);
            }
            let n = self.queries.lock().unwrap().len();
            let url = Url::parse(&format!("https://media.example/watch?v=track{}", n)).unwrap();
            Ok(Some(MediaLocator::new(url)))
        }
    }

    struct StubFetcher {
        /// Fail fetches for locators containing this needle.
        fail_needle: Option<String>,
        /// Delete the destination directory instead of writing a file.
        remove_dest: bool,
        calls: Mutex<Vec<String>>,
        dest_dirs: Mutex<Vec<PathBuf>>,
    }

    impl StubFetcher {
        fn working() -> Self {
            Self {
                fail_needle: None,
                remove_dest: false,
                calls: Mutex::new(Vec::new()),
                dest_dirs: Mutex::new(Vec::new()),
            }
        }

        fn failing_on(needle: &str) -> Self {
            Self {
                fail_needle: Some(needle.to_string()),
                ..Self::working()
            }
        }

        fn vanishing_dest() -> Self {
            Self {
                remove_dest: true,
                ..Self::working()
            }
        }
    }

    #[async_trait]
    impl Fetcher for StubFetcher {
        async fn check_available(&self) -> Result<(), FetchError> {
            Ok(())
        }

        async fn probe_title(&self, locator: &Url) -> Result<String, FetchError> {
            Ok(format!("Title of {}", locator))
        }

        async fn fetch_audio(
            &self,
            locator: &Url,
            dest_dir: &Path,
            progress: mpsc::Sender<ProgressEvent>,
        ) -> Result<(), FetchError> {
            let call_number = {
                let mut calls = self.calls.lock().unwrap();
                calls.push(locator.to_string());
                calls.len()
            };
            self.dest_dirs.lock().unwrap().push(dest_dir.to_path_buf());

            if let Some(needle) = &self.fail_needle {
                if locator.as_str().contains(needle.as_str()) {
                    return Err(FetchError::DownloadFailed("stub failure".to_string()));
                }
            }
            if self.remove_dest {
                std::fs::remove_dir_all(dest_dir)?;
                let _ = progress.send(ProgressEvent::Finished).await;
                return Ok(());
            }

            let _ = progress
                .send(ProgressEvent::Transferred {
                    downloaded: 50,
                    total: Some(100),
                })
                .await;
            std::fs::write(
                dest_dir.join(format!("{:03}-song.mp3", call_number)),
                b"audio",
            )?;
            let _ = progress.send(ProgressEvent::Finished).await;
            Ok(())
        }
    }

    struct StubArchive {
        fail_folder: bool,
        fail_uploads: bool,
        folder_calls: AtomicUsize,
        uploads: Mutex<Vec<PathBuf>>,
    }

    impl StubArchive {
        fn working() -> Self {
            Self {
                fail_folder: false,
                fail_uploads: false,
                folder_calls: AtomicUsize::new(0),
                uploads: Mutex::new(Vec::new()),
            }
        }

        fn broken_auth() -> Self {
            Self {
                fail_folder: true,
                ..Self::working()
            }
        }

        fn broken_uploads() -> Self {
            Self {
                fail_uploads: true,
                ..Self::working()
            }
        }
    }

    #[async_trait]
    impl Archive for StubArchive {
        async fn create_folder(&self, name: &str) -> Result<RemoteFolder, ArchiveError> {
            self.folder_calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_folder {
                return Err(ArchiveError::Auth("stub credentials rejected".to_string()));
            }
            Ok(RemoteFolder {
                id: "folder1".to_string(),
                name: name.to_string(),
            })
        }

        async fn upload_file(
            &self,
            path: &Path,
            _folder: &RemoteFolder,
        ) -> Result<String, ArchiveError> {
            self.uploads.lock().unwrap().push(path.to_path_buf());
            if self.fail_uploads {
                return Err(ArchiveError::Api("stub upload rejected".to_string()));
            }
            Ok(format!("https://files.example/{}", path.display()))
        }
    }

    #[derive(Default)]
    struct RecordingStatus {
        edits: Mutex<Vec<String>>,
        finishes: Mutex<Vec<CompletionNotice>>,
        fail_edits: bool,
    }

    impl RecordingStatus {
        fn failing_edits() -> Self {
            Self {
                fail_edits: true,
                ..Self::default()
            }
        }
    }

    #[async_trait]
    impl StatusChannel for RecordingStatus {
        async fn post(&self, _text: &str) -> Result<(), StatusError> {
            Ok(())
        }

        async fn edit(&self, text: &str) -> Result<(), StatusError> {
            if self.fail_edits {
                return Err(StatusError::Transport("stub edit rejected".to_string()));
            }
            self.edits.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn finish(&self, notice: &CompletionNotice) -> Result<(), StatusError> {
            self.finishes.lock().unwrap().push(notice.clone());
            Ok(())
        }
    }

    struct Fixture {
        catalog: Arc<StubCatalog>,
        search: Arc<StubSearch>,
        fetcher: Arc<StubFetcher>,
        archive: Arc<StubArchive>,
        status: Arc<RecordingStatus>,
    }

    impl Fixture {
        fn pipeline(&self) -> Pipeline {
            Pipeline::new(
                self.catalog.clone(),
                self.search.clone(),
                self.fetcher.clone(),
                self.archive.clone(),
                self.status.clone(),
            )
            .with_poll_interval(Duration::from_millis(10))
        }
    }

    fn fixture(tracks: Vec<TrackDescriptor>) -> Fixture {
        Fixture {
            catalog: Arc::new(StubCatalog::new(tracks)),
            search: Arc::new(StubSearch::hits()),
            fetcher: Arc::new(StubFetcher::working()),
            archive: Arc::new(StubArchive::working()),
            status: Arc::new(RecordingStatus::default()),
        }
    }

    fn playlist_request() -> Request {
        Request::new("https://open.spotify.com/playlist/ABC123", "tester")
    }

    #[tokio::test]
    async fn two_good_tracks_end_in_done_with_two_uploads() {
        let fx = fixture(vec![track("Artist1", "Song1"), track("Artist2", "Song2")]);
        let report = fx.pipeline().run(&playlist_request()).await.unwrap();

        assert_eq!(report.outcome, Outcome::Done);
        assert_eq!(report.total_tracks, 2);
        assert_eq!(report.downloaded, 2);
        assert_eq!(report.uploaded, 2);
        assert_eq!(report.search_misses, 0);
        assert_eq!(
            report.folder_link.as_deref(),
            Some("https://drive.google.com/drive/folders/folder1")
        );

        // Searches and uploads happen in original track order.
        assert_eq!(
            *fx.search.queries.lock().unwrap(),
            vec!["Artist1 - Song1", "Artist2 - Song2"]
        );
        let uploads = fx.archive.uploads.lock().unwrap();
        assert_eq!(uploads.len(), 2);
        assert!(uploads[0].ends_with("001-song.mp3"));
        assert!(uploads[1].ends_with("002-song.mp3"));

        let finishes = fx.status.finishes.lock().unwrap();
        assert_eq!(finishes.len(), 1);
        assert_eq!(
            finishes[0].link,
            "https://drive.google.com/drive/folders/folder1"
        );

        // The reporter's rendered line reaches the status channel, ending at
        // exactly 100% for each track.
        let edits = fx.status.edits.lock().unwrap();
        assert!(
            edits.iter().any(|e| e
                == "Downloading song 1/2: **Title of https://media.example/watch?v=track1** - 100.0%"),
            "missing final progress line for track 1, edits: {:?}",
            edits
        );
        assert!(
            edits
                .iter()
                .any(|e| e.starts_with("Downloading song 2/2:") && e.ends_with("100.0%")),
            "missing final progress line for track 2, edits: {:?}",
            edits
        );
    }

    #[tokio::test]
    async fn scratch_directory_is_gone_after_the_run() {
        let fx = fixture(vec![track("Artist", "Song")]);
        fx.pipeline().run(&playlist_request()).await.unwrap();

        let dirs = fx.fetcher.dest_dirs.lock().unwrap();
        assert_eq!(dirs.len(), 1);
        assert!(!dirs[0].exists(), "scratch dir {} should be deleted", dirs[0].display());
    }

    #[tokio::test]
    async fn empty_collection_never_touches_storage() {
        let fx = fixture(vec![]);
        let report = fx.pipeline().run(&playlist_request()).await.unwrap();

        assert_eq!(report.outcome, Outcome::EmptyCollection);
        assert_eq!(fx.archive.folder_calls.load(Ordering::SeqCst), 0);
        assert!(fx
            .status
            .edits
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.contains("No songs found")));
    }

    #[tokio::test]
    async fn auth_failure_happens_before_any_fetch() {
        let mut fx = fixture(vec![track("Artist1", "Song1"), track("Artist2", "Song2")]);
        fx.archive = Arc::new(StubArchive::broken_auth());

        let result = fx.pipeline().run(&playlist_request()).await;
        assert_matches!(result, Err(PipelineError::Auth(_)));
        assert!(fx.fetcher.calls.lock().unwrap().is_empty());
        assert!(fx.search.queries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn all_search_misses_end_in_no_uploads_with_an_empty_folder() {
        let mut fx = fixture(vec![track("Artist1", "Song1"), track("Artist2", "Song2")]);
        fx.search = Arc::new(StubSearch::misses());

        let report = fx.pipeline().run(&playlist_request()).await.unwrap();
        assert_eq!(report.outcome, Outcome::NoUploads);
        assert_eq!(report.search_misses, 2);
        assert_eq!(report.downloaded, 0);
        // The folder was still created, and stayed empty.
        assert_eq!(fx.archive.folder_calls.load(Ordering::SeqCst), 1);
        assert!(fx.archive.uploads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn one_bad_track_does_not_stop_the_rest() {
        let mut fx = fixture(vec![track("Artist1", "Song1"), track("Artist2", "Song2")]);
        fx.fetcher = Arc::new(StubFetcher::failing_on("track1"));

        let report = fx.pipeline().run(&playlist_request()).await.unwrap();
        assert_eq!(report.outcome, Outcome::Done);
        assert_eq!(report.downloaded, 1);
        assert_eq!(report.uploaded, 1);
        // Both tracks were attempted.
        assert_eq!(fx.fetcher.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn scratch_scan_errors_skip_the_track_instead_of_aborting() {
        let mut fx = fixture(vec![track("Artist", "Song")]);
        fx.fetcher = Arc::new(StubFetcher::vanishing_dest());

        // The destination directory disappears mid-run, so the post-fetch
        // scan fails; the run must still reach a terminal report.
        let report = fx.pipeline().run(&playlist_request()).await.unwrap();
        assert_eq!(report.outcome, Outcome::NoUploads);
        assert_eq!(report.downloaded, 1);
        assert_eq!(report.uploaded, 0);
    }

    #[tokio::test]
    async fn failed_uploads_end_in_no_uploads() {
        let mut fx = fixture(vec![track("Artist", "Song")]);
        fx.archive = Arc::new(StubArchive::broken_uploads());

        let report = fx.pipeline().run(&playlist_request()).await.unwrap();
        assert_eq!(report.outcome, Outcome::NoUploads);
        assert_eq!(report.downloaded, 1);
        assert_eq!(report.uploaded, 0);
        assert!(fx
            .status
            .edits
            .lock()
            .unwrap()
            .iter()
            .any(|e| e.contains("Upload failed for all songs")));
    }

    #[tokio::test]
    async fn unrecognized_url_aborts_before_the_catalog() {
        let fx = fixture(vec![track("Artist", "Song")]);
        let request = Request::new("https://example.com/watch?v=notacollection", "tester");

        let result = fx.pipeline().run(&request).await;
        assert_matches!(result, Err(PipelineError::InvalidUrl(_)));
        assert_eq!(fx.catalog.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn failing_status_edits_are_swallowed() {
        let mut fx = fixture(vec![track("Artist", "Song")]);
        fx.status = Arc::new(RecordingStatus::failing_edits());

        let report = fx.pipeline().run(&playlist_request()).await.unwrap();
        assert_eq!(report.outcome, Outcome::Done);
        assert_eq!(report.uploaded, 1);
    }
}
