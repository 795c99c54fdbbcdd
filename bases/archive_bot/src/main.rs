// bases/archive_bot/src/main.rs
mod app;
mod config;
mod console;

use app::App;
use clap::Parser;
use color_eyre::Result;
use config::{CliArgs, Config};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize error handling and logging
    color_eyre::install()?;
    tracing_subscriber::fmt::init();

    let args = CliArgs::parse();
    let config = Config::from_args(args);

    let app = App::new(config);
    app.run().await
}
