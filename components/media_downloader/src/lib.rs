// components/media_downloader/src/lib.rs
mod progress;
mod types;
mod utils;
mod ytdlp;

use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

pub use progress::{format_eta, format_speed, parse_line, ProgressEvent, Reading, Severity, UNAVAILABLE};
pub use types::{DownloadError, DownloadRequest, Downloader, MediaKind, MediaSource};
pub use utils::{expected_audio_filename, sanitize_filename};
pub use ytdlp::{YtDlp, DEFAULT_BINARY, TERMINATE_GRACE_PERIOD};

/// Single link downloads on top of a [`Downloader`]
pub struct MediaDownloader {
    downloader: Arc<dyn Downloader>,
}

impl MediaDownloader {
    /// Create a MediaDownloader backed by yt-dlp from the PATH
    pub async fn new() -> Result<Self, DownloadError> {
        Self::new_with_downloader(Arc::new(YtDlp::new())).await
    }

    /// Create a new MediaDownloader with a specific downloader implementation
    pub async fn new_with_downloader(
        downloader: Arc<dyn Downloader>,
    ) -> Result<Self, DownloadError> {
        downloader.check_available().await?;
        Ok(Self { downloader })
    }

    pub fn downloader(&self) -> Arc<dyn Downloader> {
        Arc::clone(&self.downloader)
    }

    /// Download a video or its audio from a URL into `output_dir`
    pub async fn download_url(
        &self,
        url: &str,
        kind: MediaKind,
        output_dir: &Path,
        progress: mpsc::Sender<ProgressEvent>,
        cancel: &CancellationToken,
    ) -> Result<(), DownloadError> {
        let url = parse_media_url(url)?;

        if !tokio::fs::try_exists(output_dir).await? {
            tokio::fs::create_dir_all(output_dir).await?;
            info!(path = %output_dir.display(), "created output directory");
        }

        let request = DownloadRequest::url(url, kind, output_dir);
        self.downloader.download(&request, progress, cancel).await
    }
}

/// Accept only absolute http(s) links
pub fn parse_media_url(input: &str) -> Result<Url, DownloadError> {
    let input = input.trim();
    let url = Url::parse(input).map_err(|e| DownloadError::InvalidUrl(format!("{}: {}", input, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(url),
        scheme => Err(DownloadError::InvalidUrl(format!(
            "{}: unsupported scheme '{}'",
            input, scheme
        ))),
    }
}
