// components/converter_config/src/lib.rs
mod error;
mod settings;
mod store;

pub use error::ConfigError;
pub use settings::{default_output_path, Config, DownloadType, Settings, SpotifySettings};
pub use store::ConfigStore;
