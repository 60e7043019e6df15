// components/converter_config/src/store.rs
use crate::error::ConfigError;
use crate::settings::Config;
use directories::ProjectDirs;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

const CONFIG_FILE_NAME: &str = "config.toml";

/// A configuration file plus the values currently in effect
#[derive(Debug)]
pub struct ConfigStore {
    path: PathBuf,
    config: Config,
}

impl ConfigStore {
    /// Platform config directory, e.g. `~/.config/spotify-converter/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "spotify-converter").map(|dirs| dirs.config_dir().join(CONFIG_FILE_NAME))
    }

    /// Read the file at `path`.
    ///
    /// A missing file is created with defaults. A file that cannot be read or
    /// parsed is reported and replaced by defaults in memory only; the next
    /// save overwrites it.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();

        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                let store = Self {
                    path,
                    config: Config::default(),
                };
                store.save()?;
                info!(path = %store.path.display(), "created default configuration");
                return Ok(store);
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read configuration, using defaults");
                return Ok(Self {
                    path,
                    config: Config::default(),
                });
            }
        };

        let config = match toml::from_str::<Config>(&contents) {
            Ok(config) => {
                debug!(path = %path.display(), "loaded configuration");
                config
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "invalid configuration, using defaults");
                Config::default()
            }
        };

        Ok(Self { path, config })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Apply `change` and persist the result. On failure the values in
    /// memory stay as they were.
    pub fn update(&mut self, change: impl FnOnce(&mut Config)) -> Result<(), ConfigError> {
        let mut updated = self.config.clone();
        change(&mut updated);
        write_atomically(&self.path, &toml::to_string_pretty(&updated)?)?;
        self.config = updated;
        Ok(())
    }

    pub fn save(&self) -> Result<(), ConfigError> {
        write_atomically(&self.path, &toml::to_string_pretty(&self.config)?)
    }
}

/// Write through a temp file in the target directory so readers never see a
/// half-written config
fn write_atomically(path: &Path, contents: &str) -> Result<(), ConfigError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).map_err(|e| ConfigError::io(dir, e))?;

    let mut file = NamedTempFile::new_in(dir).map_err(|e| ConfigError::io(dir, e))?;
    file.write_all(contents.as_bytes())
        .and_then(|_| file.as_file().sync_all())
        .map_err(|e| ConfigError::io(file.path(), e))?;
    file.persist(path)
        .map_err(|e| ConfigError::persist(path, e.error))?;

    debug!(path = %path.display(), "saved configuration");
    Ok(())
}
