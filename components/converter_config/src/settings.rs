// components/converter_config/src/settings.rs
use directories::UserDirs;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Whole configuration file, one struct per TOML section
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "Spotify", default)]
    pub spotify: SpotifySettings,

    #[serde(rename = "Settings", default)]
    pub settings: Settings,
}

impl Config {
    pub fn has_credentials(&self) -> bool {
        !self.spotify.client_id.trim().is_empty() && !self.spotify.client_secret.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SpotifySettings {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Root under which playlist folders and single downloads land
    pub output_path: PathBuf,
    pub theme: String,
    pub color_theme: String,
    pub download_type: DownloadType,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_path: default_output_path(),
            theme: "dark".to_string(),
            color_theme: "blue".to_string(),
            download_type: DownloadType::default(),
        }
    }
}

/// What a single link download produces by default
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadType {
    #[default]
    Music,
    Video,
}

impl fmt::Display for DownloadType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DownloadType::Music => write!(f, "music"),
            DownloadType::Video => write!(f, "video"),
        }
    }
}

/// `~/Downloads`, or a relative `Downloads` when there is no home directory
pub fn default_output_path() -> PathBuf {
    UserDirs::new()
        .map(|dirs| dirs.home_dir().join("Downloads"))
        .unwrap_or_else(|| PathBuf::from("Downloads"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_a_fresh_install() {
        let config = Config::default();
        assert_eq!(config.settings.theme, "dark");
        assert_eq!(config.settings.color_theme, "blue");
        assert_eq!(config.settings.download_type, DownloadType::Music);
        assert!(config.settings.output_path.ends_with("Downloads"));
        assert!(!config.has_credentials());
    }

    #[test]
    fn sections_use_their_file_names() {
        let rendered = toml::to_string(&Config::default()).unwrap();
        assert!(rendered.contains("[Spotify]"));
        assert!(rendered.contains("[Settings]"));
        assert!(rendered.contains("download_type = \"music\""));
    }

    #[test]
    fn missing_keys_fall_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            [Spotify]
            client_id = "abc"

            [Settings]
            download_type = "video"
            "#,
        )
        .unwrap();

        assert_eq!(config.spotify.client_id, "abc");
        assert_eq!(config.spotify.client_secret, "");
        assert_eq!(config.settings.download_type, DownloadType::Video);
        assert_eq!(config.settings.theme, "dark");
        assert!(!config.has_credentials());
    }
}
