//! Writing-correction history

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::KvStore;
use crate::Result;

const HISTORY_KEY: &str = "correction_history";

/// Maximum number of corrections kept
pub const MAX_CORRECTIONS: usize = 50;

/// A single writing correction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorrectionEntry {
    pub original: String,
    pub corrected: String,
    pub explanation: String,
    pub timestamp: DateTime<Utc>,
}

/// Newest-first correction history, capped at [`MAX_CORRECTIONS`]
///
/// The whole list is rewritten on every insert.
#[derive(Clone)]
pub struct CorrectionHistory {
    kv: KvStore,
}

impl CorrectionHistory {
    #[must_use]
    pub const fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    /// Stored entries, newest first
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn list(&self) -> Result<Vec<CorrectionEntry>> {
        Ok(self.kv.get(HISTORY_KEY)?.unwrap_or_default())
    }

    /// Prepend an entry, evicting the oldest beyond the cap
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn push(&self, entry: CorrectionEntry) -> Result<()> {
        let mut entries = self.list()?;
        entries.insert(0, entry);
        entries.truncate(MAX_CORRECTIONS);
        self.kv.set(HISTORY_KEY, &entries)
    }

    /// Remove every entry
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn clear(&self) -> Result<()> {
        self.kv.remove(HISTORY_KEY)
    }
}
