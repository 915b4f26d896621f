//! Two-tier cache for synthesized speech
//!
//! Lookups go memory first, then the persistent [`AudioStore`]; store hits
//! are promoted into memory. Inserts write both tiers.

use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};

use lru::LruCache;

use crate::Result;
use crate::db::AudioStore;

/// Default number of clips kept in memory
pub const DEFAULT_MEMORY_CAPACITY: usize = 256;

/// Speaker tag used when none is given
pub const DEFAULT_SPEAKER: &str = "default";

/// Cache key for a speaker and text
#[must_use]
pub fn cache_key(speaker: Option<&str>, text: &str) -> String {
    format!("{}:{text}", speaker.unwrap_or(DEFAULT_SPEAKER))
}

/// Where a cache hit came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheTier {
    Memory,
    Persistent,
}

/// Memory + persistent audio cache holding base64 payloads
pub struct AudioCache {
    memory: Mutex<LruCache<String, String>>,
    store: AudioStore,
}

impl AudioCache {
    #[must_use]
    pub fn new(store: AudioStore, capacity: NonZeroUsize) -> Self {
        Self {
            memory: Mutex::new(LruCache::new(capacity)),
            store,
        }
    }

    /// Look up a payload, promoting persistent hits into memory
    ///
    /// A failing persistent store is logged and treated as a miss.
    pub fn lookup(&self, key: &str) -> Option<(String, CacheTier)> {
        if let Some(audio) = self.memory().get(key) {
            tracing::trace!(key, "audio cache hit (memory)");
            return Some((audio.clone(), CacheTier::Memory));
        }

        match self.store.get(key) {
            Ok(Some(audio)) => {
                tracing::trace!(key, "audio cache hit (persistent)");
                self.memory().put(key.to_string(), audio.clone());
                Some((audio, CacheTier::Persistent))
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key, error = %e, "audio store lookup failed");
                None
            }
        }
    }

    /// Write a payload to both tiers
    ///
    /// A failing persistent store is logged; the memory tier is still filled.
    pub fn insert(&self, key: &str, audio: &str) {
        self.memory().put(key.to_string(), audio.to_string());
        if let Err(e) = self.store.put(key, audio) {
            tracing::warn!(key, error = %e, "audio store write failed");
        }
    }

    /// Whether the memory tier holds `key`
    #[must_use]
    pub fn in_memory(&self, key: &str) -> bool {
        self.memory().contains(key)
    }

    /// Number of clips in the memory tier
    #[must_use]
    pub fn memory_len(&self) -> usize {
        self.memory().len()
    }

    /// Persistent tier
    #[must_use]
    pub const fn store(&self) -> &AudioStore {
        &self.store
    }

    /// Empty both tiers, returning how many persistent entries were removed
    ///
    /// # Errors
    ///
    /// Returns error if the persistent store cannot be cleared
    pub fn clear(&self) -> Result<usize> {
        self.memory().clear();
        self.store.clear()
    }

    fn memory(&self) -> std::sync::MutexGuard<'_, LruCache<String, String>> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
