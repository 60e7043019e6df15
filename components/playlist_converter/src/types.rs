// components/playlist_converter/src/types.rs
use media_downloader::{ProgressEvent, Severity};
use spotify_catalog::{CatalogError, PlaylistInfo};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConversionError {
    #[error(transparent)]
    Resolution(#[from] CatalogError),

    #[error("failed to create playlist folder {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ConversionError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ConversionError::Io {
            path: path.into(),
            source,
        }
    }
}

/// What happened to one track. Failed tracks are not retried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// The expected file was already in the playlist folder
    Skipped,
    Succeeded,
    Failed { reason: String },
}

impl DownloadOutcome {
    /// The track is on disk after the run
    pub fn is_present(&self) -> bool {
        matches!(self, DownloadOutcome::Skipped | DownloadOutcome::Succeeded)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConversionStatus {
    Complete,
    Partial,
}

/// Summary of one playlist run.
///
/// `outcomes[i]` belongs to track `i + 1` of the playlist. A stopped run only
/// has outcomes for the tracks it got to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionResult {
    pub playlist: PlaylistInfo,
    pub destination: PathBuf,
    /// Tracks the catalog listed
    pub listed: usize,
    pub outcomes: Vec<DownloadOutcome>,
    pub cancelled: bool,
}

impl ConversionResult {
    /// Tracks that were attempted
    pub fn total(&self) -> usize {
        self.outcomes.len()
    }

    /// Tracks present on disk afterwards, downloaded or already there
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_present()).count()
    }

    pub fn downloaded(&self) -> usize {
        self.count(|o| matches!(o, DownloadOutcome::Succeeded))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, DownloadOutcome::Skipped))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, DownloadOutcome::Failed { .. }))
    }

    pub fn status(&self) -> ConversionStatus {
        if !self.cancelled && self.succeeded() == self.total() {
            ConversionStatus::Complete
        } else {
            ConversionStatus::Partial
        }
    }

    fn count(&self, predicate: impl Fn(&DownloadOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| predicate(o)).count()
    }
}

/// Everything a front end needs to show a conversion as it happens
#[derive(Debug, Clone, PartialEq)]
pub enum ConversionEvent {
    PlaylistResolved {
        name: String,
        owner: String,
        total_tracks: u32,
    },
    Log {
        severity: Severity,
        message: String,
    },
    /// `index` is 1-based, `count` the number of tracks in the run
    TrackStarted {
        index: usize,
        count: usize,
        display: String,
    },
    Progress {
        index: usize,
        event: ProgressEvent,
    },
    TrackFinished {
        index: usize,
        outcome: DownloadOutcome,
    },
}
