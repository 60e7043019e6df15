// bases/download_cli/src/main.rs
mod app;
mod args;
mod output;

use app::App;
use args::Args;
use clap::Parser;
use color_eyre::Result;
use colored::Colorize;
use media_downloader::YtDlp;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "download_cli=info,playlist_converter=warn,media_downloader=warn,spotify_catalog=warn,converter_config=warn";
const VERBOSE_FILTER: &str = "download_cli=debug,playlist_converter=debug,media_downloader=debug,spotify_catalog=debug,converter_config=debug";

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();

    let default_filter = if args.verbose { VERBOSE_FILTER } else { DEFAULT_FILTER };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with_writer(std::io::stderr)
        .init();

    let ytdlp = match YtDlp::locate() {
        Ok(ytdlp) => ytdlp,
        Err(error) => {
            eprintln!("{} {}", "[x]".red(), error);
            eprintln!("    Install yt-dlp (for example `pip install yt-dlp`) and make sure it is on your PATH.");
            std::process::exit(1);
        }
    };
    tracing::debug!(program = %ytdlp.program().display(), "using yt-dlp");

    let mut app = App::new(args, Arc::new(ytdlp))?;
    if let Err(error) = app.run().await {
        app.report(&error);
        std::process::exit(1);
    }
    Ok(())
}
