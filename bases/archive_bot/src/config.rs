// bases/archive_bot/src/config.rs
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Playlist archive bot - resolves a playlist/album URL, downloads every
/// track as mp3, and uploads the results to a cloud storage folder
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Catalog (Spotify) application client id
    #[arg(long, env = "SPOTIFY_CLIENT_ID")]
    pub spotify_client_id: String,

    /// Catalog (Spotify) application client secret
    #[arg(long, env = "SPOTIFY_CLIENT_SECRET", hide_env_values = true)]
    pub spotify_client_secret: String,

    /// Video search (YouTube Data API) key
    #[arg(long, env = "YOUTUBE_API_KEY", hide_env_values = true)]
    pub youtube_api_key: String,

    /// Storage (Google) OAuth client id
    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    pub google_client_id: String,

    /// Storage (Google) OAuth client secret
    #[arg(long, env = "GOOGLE_CLIENT_SECRET", hide_env_values = true)]
    pub google_client_secret: String,

    /// Path of the persisted OAuth token blob
    #[arg(long, env = "GOOGLE_TOKEN_FILE", default_value = "google-token.json")]
    pub google_token_file: PathBuf,

    /// Command prefix that triggers an archive request
    #[arg(long, default_value = "!d")]
    pub prefix: String,

    /// Seconds between progress status re-renders
    #[arg(long, default_value_t = 1)]
    pub poll_interval_secs: u64,
}

/// Validated bot configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub spotify_client_id: String,
    pub spotify_client_secret: String,
    pub youtube_api_key: String,
    pub google_client_id: String,
    pub google_client_secret: String,
    pub google_token_file: PathBuf,
    pub prefix: String,
    pub poll_interval: Duration,
}

impl Config {
    /// Create configuration from CLI arguments
    pub fn from_args(args: CliArgs) -> Self {
        // A zero interval would spin on status edits.
        let poll_interval = Duration::from_secs(args.poll_interval_secs.max(1));

        Self {
            spotify_client_id: args.spotify_client_id,
            spotify_client_secret: args.spotify_client_secret,
            youtube_api_key: args.youtube_api_key,
            google_client_id: args.google_client_id,
            google_client_secret: args.google_client_secret,
            google_token_file: args.google_token_file,
            prefix: args.prefix,
            poll_interval,
        }
    }
}
