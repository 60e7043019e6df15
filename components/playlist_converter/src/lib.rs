// components/playlist_converter/src/lib.rs
mod converter;
mod types;
mod worker;

pub use converter::PlaylistConverter;
pub use types::{ConversionError, ConversionEvent, ConversionResult, ConversionStatus, DownloadOutcome};
pub use worker::{Worker, WorkerError};
