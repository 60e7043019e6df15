// components/spotify_catalog/src/lib.rs
mod client;
mod error;
mod spotify;
mod types;

pub use client::{fetch_all_tracks, CatalogClient};
pub use error::CatalogError;
pub use spotify::{SpotifyClient, ACCOUNTS_URL, API_URL};
pub use types::{Credentials, PageCursor, PlaylistInfo, PlaylistRef, Track, TrackPage};
