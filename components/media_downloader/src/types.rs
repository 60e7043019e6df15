// components/media_downloader/src/types.rs
use crate::progress::ProgressEvent;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use url::Url;

#[derive(Debug, Error)]
pub enum DownloadError {
    #[error("Required dependency not found: {0}")]
    DependencyNotFound(&'static str),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Download failed with return code {}", describe_code(.code))]
    ProcessFailed { code: Option<i32> },

    #[error("Download stopped by user")]
    Cancelled,

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

fn describe_code(code: &Option<i32>) -> String {
    match code {
        Some(code) => code.to_string(),
        None => "none (terminated by signal)".to_string(),
    }
}

/// What the downloader should produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaKind {
    /// Extracted mp3 audio with thumbnail and metadata embedded
    #[default]
    Audio,
    /// Best mp4 compatible video and audio streams, merged
    Video,
}

/// Where the media comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaSource {
    /// Free text handed to the provider's search, first hit wins
    Search(String),
    /// A direct link to a video
    Url(Url),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadRequest {
    pub source: MediaSource,
    pub kind: MediaKind,
    pub output_dir: PathBuf,
}

impl DownloadRequest {
    /// Audio for a free text query, the way playlist tracks are fetched
    pub fn search(query: impl Into<String>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: MediaSource::Search(query.into()),
            kind: MediaKind::Audio,
            output_dir: output_dir.into(),
        }
    }

    pub fn url(url: Url, kind: MediaKind, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: MediaSource::Url(url),
            kind,
            output_dir: output_dir.into(),
        }
    }
}

#[async_trait::async_trait]
pub trait Downloader: Send + Sync {
    /// Check if the downloader is available and has all required dependencies
    async fn check_available(&self) -> Result<(), DownloadError>;

    /// Fetch the requested media into its output directory.
    ///
    /// Progress is reported on `progress` while the download runs; the sender
    /// is dropped when the download returns. When `cancel` fires the running
    /// download is stopped and `DownloadError::Cancelled` is returned.
    async fn download(
        &self,
        request: &DownloadRequest,
        progress: mpsc::Sender<ProgressEvent>,
        cancel: &CancellationToken,
    ) -> Result<(), DownloadError>;
}
