// components/playlist_converter/src/converter.rs
use crate::types::{ConversionError, ConversionEvent, ConversionResult, ConversionStatus, DownloadOutcome};
use media_downloader::{
    expected_audio_filename, sanitize_filename, DownloadError, DownloadRequest, Downloader, Severity,
};
use spotify_catalog::{fetch_all_tracks, CatalogClient, CatalogError, PlaylistInfo, PlaylistRef, Track};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Progress events buffered between the downloader and the event stream
const PROGRESS_BUFFER: usize = 32;

/// Turns a catalog playlist into a folder of audio files, one download at a time
pub struct PlaylistConverter {
    catalog: Arc<dyn CatalogClient>,
    downloader: Arc<dyn Downloader>,
    events: mpsc::Sender<ConversionEvent>,
    cancel: CancellationToken,
}

impl PlaylistConverter {
    pub fn new(
        catalog: Arc<dyn CatalogClient>,
        downloader: Arc<dyn Downloader>,
        events: mpsc::Sender<ConversionEvent>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            catalog,
            downloader,
            events,
            cancel,
        }
    }

    /// Download every track of the playlist behind `input` into
    /// `output_root/<playlist name>`.
    ///
    /// Only failing to resolve the playlist or to create its folder is an
    /// error. Tracks that fail to download are recorded and the run moves on.
    pub async fn convert_playlist(
        &self,
        input: &str,
        output_root: &Path,
    ) -> Result<ConversionResult, ConversionError> {
        let (playlist, tracks) = match self.resolve(input).await {
            Ok(resolved) => resolved,
            Err(e) => {
                warn!(input, error = %e, "playlist resolution failed");
                self.log(Severity::Error, resolution_message(&e)).await;
                return Err(e.into());
            }
        };

        let destination = output_root.join(sanitize_filename(&playlist.name));
        self.prepare_destination(&destination).await?;

        let count = tracks.len();
        let mut outcomes = Vec::with_capacity(count);
        let mut cancelled = false;

        for (offset, track) in tracks.iter().enumerate() {
            let index = offset + 1;

            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }

            self.emit(ConversionEvent::TrackStarted {
                index,
                count,
                display: track.display_name(),
            })
            .await;
            self.log(
                Severity::Info,
                format!("Downloading track {}/{}: {}", index, count, track.display_name()),
            )
            .await;

            let outcome = self.convert_track(index, track, &destination).await;

            self.emit(ConversionEvent::TrackFinished {
                index,
                outcome: outcome.clone(),
            })
            .await;
            outcomes.push(outcome);

            // a stop during this track ends the run here, even on the last one
            if self.cancel.is_cancelled() {
                cancelled = true;
                break;
            }
        }

        let result = ConversionResult {
            playlist,
            destination,
            listed: count,
            outcomes,
            cancelled,
        };

        if cancelled {
            self.log(
                Severity::Warning,
                format!("Download stopped by user after {} tracks", result.succeeded()),
            )
            .await;
        }

        info!(
            playlist = %result.playlist.name,
            attempted = result.total(),
            downloaded = result.downloaded(),
            skipped = result.skipped(),
            failed = result.failed(),
            cancelled,
            "playlist conversion finished"
        );

        match result.status() {
            ConversionStatus::Complete => {
                self.log(
                    Severity::Success,
                    format!(
                        "Playlist conversion complete: {} tracks downloaded",
                        result.succeeded()
                    ),
                )
                .await
            }
            ConversionStatus::Partial => {
                self.log(
                    Severity::Warning,
                    format!(
                        "Partial conversion: {} of {} tracks downloaded",
                        result.succeeded(),
                        result.total()
                    ),
                )
                .await
            }
        }

        Ok(result)
    }

    async fn resolve(&self, input: &str) -> Result<(PlaylistInfo, Vec<Track>), CatalogError> {
        let playlist_ref = PlaylistRef::parse(input)?;
        self.log(Severity::Info, format!("Fetching playlist {}", playlist_ref)).await;

        let info = self.catalog.get_playlist(&playlist_ref).await?;
        self.emit(ConversionEvent::PlaylistResolved {
            name: info.name.clone(),
            owner: info.owner.clone(),
            total_tracks: info.total_tracks,
        })
        .await;
        self.log(Severity::Info, format!("Converting playlist: {}", info.name)).await;
        self.log(Severity::Info, format!("Owner: {}", info.owner)).await;
        self.log(Severity::Info, format!("Total tracks: {}", info.total_tracks)).await;

        let tracks = fetch_all_tracks(self.catalog.as_ref(), &playlist_ref).await?;
        debug!(playlist = %playlist_ref, tracks = tracks.len(), "fetched track list");

        Ok((info, tracks))
    }

    async fn prepare_destination(&self, destination: &Path) -> Result<(), ConversionError> {
        let exists = tokio::fs::try_exists(destination).await.unwrap_or(false);
        if exists {
            return Ok(());
        }

        if let Err(e) = tokio::fs::create_dir_all(destination).await {
            self.log(
                Severity::Error,
                format!("Could not create folder {}: {}", destination.display(), e),
            )
            .await;
            return Err(ConversionError::io(destination, e));
        }

        self.log(
            Severity::Info,
            format!("Created playlist folder: {}", destination.display()),
        )
        .await;
        Ok(())
    }

    /// A download cut short by a stop request counts as failed
    async fn convert_track(
        &self,
        index: usize,
        track: &Track,
        destination: &Path,
    ) -> DownloadOutcome {
        let filename = expected_audio_filename(&track.artist_line(), &track.title);
        if tokio::fs::try_exists(destination.join(&filename))
            .await
            .unwrap_or(false)
        {
            self.log(
                Severity::Info,
                format!("Track already exists, skipping: {}", filename),
            )
            .await;
            return DownloadOutcome::Skipped;
        }

        let request = DownloadRequest::search(track.search_query(), destination);
        let (progress_tx, mut progress_rx) = mpsc::channel(PROGRESS_BUFFER);

        let download = self.downloader.download(&request, progress_tx, &self.cancel);
        let forward = async {
            while let Some(event) = progress_rx.recv().await {
                self.emit(ConversionEvent::Progress { index, event }).await;
            }
        };
        let (result, ()) = tokio::join!(download, forward);

        match result {
            Ok(()) => {
                self.log(
                    Severity::Success,
                    format!("Downloaded: {}", track.display_name()),
                )
                .await;
                DownloadOutcome::Succeeded
            }
            Err(e @ DownloadError::Cancelled) => {
                debug!(index, "download interrupted by stop request");
                self.log(
                    Severity::Warning,
                    format!("Download of {} was stopped", track.display_name()),
                )
                .await;
                DownloadOutcome::Failed {
                    reason: e.to_string(),
                }
            }
            Err(e) => {
                warn!(index, track = %track.display_name(), error = %e, "track download failed");
                self.log(
                    Severity::Error,
                    format!("Failed to download {}: {}", track.display_name(), e),
                )
                .await;
                DownloadOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    async fn log(&self, severity: Severity, message: impl Into<String>) {
        self.emit(ConversionEvent::Log {
            severity,
            message: message.into(),
        })
        .await;
    }

    async fn emit(&self, event: ConversionEvent) {
        if self.events.send(event).await.is_err() {
            debug!("conversion event receiver dropped");
        }
    }
}

fn resolution_message(error: &CatalogError) -> String {
    match error {
        CatalogError::InvalidPlaylistRef(_)
        | CatalogError::MissingCredentials
        | CatalogError::NotFound(_)
        | CatalogError::Forbidden(_) => error.to_string(),
        other => format!("Spotify API error: {}", other),
    }
}
