//! TOML configuration file loading
//!
//! Supports `~/.config/hanzi-deck/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct ConfigFile {
    /// Tutor API settings
    #[serde(default)]
    pub api: ApiFileConfig,

    /// Speech playback settings
    #[serde(default)]
    pub audio: AudioFileConfig,

    /// Directory holding the learner database
    pub data_dir: Option<String>,
}

/// Tutor API configuration
#[derive(Debug, Default, Deserialize)]
pub struct ApiFileConfig {
    /// Endpoint URL
    pub url: Option<String>,

    /// Bearer token sent with each request
    pub key: Option<String>,

    /// Per-attempt timeout in seconds
    pub timeout_secs: Option<u64>,

    /// Retries after the first attempt
    pub retries: Option<u32>,

    /// Delay between attempts in milliseconds
    pub backoff_ms: Option<u64>,
}

/// Speech playback configuration
#[derive(Debug, Default, Deserialize)]
pub struct AudioFileConfig {
    /// Text-to-speech voice
    pub speaker: Option<String>,

    /// Clips kept in the in-memory cache
    pub memory_cache: Option<usize>,

    /// Pause between script lines in milliseconds
    pub line_gap_ms: Option<u64>,
}

/// Load the TOML config file from the standard path
///
/// Returns `ConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> ConfigFile {
    config_file_path().map_or_else(ConfigFile::default, |path| load_from(&path))
}

/// Load a config file from an explicit path, falling back to defaults
pub fn load_from(path: &Path) -> ConfigFile {
    if !path.exists() {
        return ConfigFile::default();
    }

    match std::fs::read_to_string(path) {
        Ok(content) => match toml::from_str(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                ConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            ConfigFile::default()
        }
    }
}

/// Return the config file path: `~/.config/hanzi-deck/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("hanzi-deck").join("config.toml"))
}
