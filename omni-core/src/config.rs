use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::state::Source;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub spotify: Spotify,
    #[serde(default)]
    pub search: Search,
    #[serde(default)]
    pub youtube: Youtube,
    #[serde(default)]
    pub cache: Cache,
    #[serde(default)]
    pub player: Player,
    #[serde(default)]
    pub radio: Radio,
}
impl Config {
    pub const FILENAME: &str = "config.toml";

    /// Loads the config at `path`, falling back to the defaults if it does not exist.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("no config file found at {}, using defaults", path.display());
                Ok(Config::default())
            }
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        std::fs::write(path, toml::to_string(self)?).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("saved config to {}", path.display());
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Spotify {
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Search {
    /// The catalog free-text searches go to. Only Spotify and Deezer can search.
    pub engine: Source,
    pub limit: u32,
    pub ttl_secs: u64,
    /// Attempts per catalog request before giving up on rate limiting.
    pub max_retries: usize,
}
impl Default for Search {
    fn default() -> Self {
        Self {
            engine: Source::Spotify,
            limit: 5,
            ttl_secs: 12 * 60 * 60,
            max_retries: 5,
        }
    }
}
impl Search {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Youtube {
    pub binary: PathBuf,
    pub concurrency: usize,
    pub cookies: Option<PathBuf>,
}
impl Default for Youtube {
    fn default() -> Self {
        Self {
            binary: PathBuf::from("yt-dlp"),
            concurrency: 15,
            cookies: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Cache {
    /// The archive index.
    pub index: PathBuf,
    /// The channel archived audio is uploaded to. Archiving is off without one.
    pub channel: Option<String>,
}
impl Default for Cache {
    fn default() -> Self {
        Self {
            index: PathBuf::from("tracks.json"),
            channel: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Player {
    pub auto_leave_secs: u64,
    pub volume: u8,
}
impl Default for Player {
    fn default() -> Self {
        Self {
            auto_leave_secs: 180,
            volume: 100,
        }
    }
}
impl Player {
    pub fn auto_leave(&self) -> Duration {
        Duration::from_secs(self.auto_leave_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Radio {
    /// Station definitions, loaded at startup.
    pub stations: PathBuf,
    /// The genre and playlist IDs stations are built from.
    pub lists: PathBuf,
}
impl Default for Radio {
    fn default() -> Self {
        Self {
            stations: PathBuf::from("radios.json"),
            lists: PathBuf::from("lists.json"),
        }
    }
}
