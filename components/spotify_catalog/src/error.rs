// components/spotify_catalog/src/error.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Invalid Spotify playlist URL: {0}")]
    InvalidPlaylistRef(String),

    #[error("Spotify API credentials not set. Configure them first.")]
    MissingCredentials,

    #[error("Spotify authentication failed: {0}")]
    Authentication(String),

    #[error("Playlist not found. It may be private or deleted.")]
    NotFound(String),

    #[error("Access denied. Check your Spotify API credentials.")]
    Forbidden(String),

    #[error("Spotify API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Spotify request failed: {0}")]
    Transport(#[from] reqwest::Error),
}
