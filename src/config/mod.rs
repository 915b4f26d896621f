//! Configuration management for hanzi-deck
//!
//! Values come from the environment, then the TOML file, then defaults.

pub mod file;

use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use crate::audio::{DEFAULT_LINE_GAP, DEFAULT_MEMORY_CAPACITY};
use crate::gateway::{Backoff, DEFAULT_BACKOFF, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT, RetryPolicy};
use crate::{Error, Result};

use self::file::ConfigFile;

/// hanzi-deck configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Tutor API configuration
    pub api: ApiConfig,

    /// Speech playback configuration
    pub audio: AudioConfig,

    /// Path to data directory (database)
    pub data_dir: PathBuf,
}

/// Tutor API configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Endpoint every action is posted to
    pub url: Url,

    /// Bearer token (from `HANZI_API_KEY`)
    pub key: Option<SecretString>,

    /// Timeout, retries and backoff for each call
    pub retry: RetryPolicy,
}

/// Speech playback configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Text-to-speech voice; the server default when unset
    pub speaker: Option<String>,

    /// Clips kept in the in-memory cache
    pub memory_cache: NonZeroUsize,

    /// Pause between script lines
    pub line_gap: Duration,
}

impl Config {
    /// Load configuration from the environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if no endpoint is configured or a value is invalid
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::from_sources(fc, |key| std::env::var(key).ok())
    }

    /// Build configuration from a file overlay and an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if no endpoint is configured or a value is invalid
    pub fn from_sources(fc: ConfigFile, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let raw_url = env("HANZI_API_URL").or(fc.api.url).ok_or_else(|| {
            Error::Config("no tutor endpoint; set HANZI_API_URL or api.url".to_string())
        })?;
        let url = Url::parse(&raw_url)
            .map_err(|e| Error::Config(format!("invalid tutor endpoint {raw_url:?}: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "tutor endpoint must be http or https: {url}"
            )));
        }

        let key = env("HANZI_API_KEY")
            .or(fc.api.key)
            .filter(|k| !k.is_empty())
            .map(SecretString::from);

        let timeout = parse_env(&env, "HANZI_TIMEOUT_SECS")?
            .or(fc.api.timeout_secs)
            .map_or(DEFAULT_TIMEOUT, Duration::from_secs);
        let max_retries = parse_env(&env, "HANZI_RETRIES")?
            .or(fc.api.retries)
            .unwrap_or(DEFAULT_MAX_RETRIES);
        let backoff = parse_env(&env, "HANZI_BACKOFF_MS")?
            .or(fc.api.backoff_ms)
            .map_or(DEFAULT_BACKOFF, Duration::from_millis);

        let memory_cache = fc.audio.memory_cache.unwrap_or(DEFAULT_MEMORY_CAPACITY);
        let memory_cache = NonZeroUsize::new(memory_cache)
            .ok_or_else(|| Error::Config("audio.memory_cache must be at least 1".to_string()))?;

        let audio = AudioConfig {
            speaker: env("HANZI_SPEAKER").or(fc.audio.speaker),
            memory_cache,
            line_gap: fc
                .audio
                .line_gap_ms
                .map_or(DEFAULT_LINE_GAP, Duration::from_millis),
        };

        // ~/.local/share/hanzi-deck on Linux
        let data_dir = env("HANZI_DATA_DIR")
            .or(fc.data_dir)
            .map_or_else(default_data_dir, PathBuf::from);

        Ok(Self {
            api: ApiConfig {
                url,
                key,
                retry: RetryPolicy {
                    max_retries,
                    timeout,
                    backoff: Backoff::Fixed(backoff),
                },
            },
            audio,
            data_dir,
        })
    }

    /// Path of the learner database
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("hanzi.db")
    }
}

fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(".local/share/hanzi-deck"),
        |d| d.data_dir().join("hanzi-deck"),
    )
}

fn parse_env<T: std::str::FromStr>(
    env: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    env(key)
        .map(|v| {
            v.trim()
                .parse()
                .map_err(|_| Error::Config(format!("{key} has an invalid value: {v}")))
        })
        .transpose()
}
