//! Persistent store for synthesized speech

use rusqlite::OptionalExtension;

use super::{DbPool, conn};
use crate::Result;

/// Base64 audio keyed by `speaker:text`
///
/// Entries never expire; [`AudioStore::clear`] is the only invalidation.
#[derive(Clone)]
pub struct AudioStore {
    pool: DbPool,
}

impl AudioStore {
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Look up cached audio
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = conn(&self.pool)?;
        Ok(conn
            .query_row("SELECT audio FROM audio_cache WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?)
    }

    /// Store audio, replacing an existing entry
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn put(&self, key: &str, audio: &str) -> Result<()> {
        let conn = conn(&self.pool)?;
        conn.execute(
            "INSERT OR REPLACE INTO audio_cache (key, audio) VALUES (?1, ?2)",
            [key, audio],
        )?;
        Ok(())
    }

    /// Number of cached entries
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn len(&self) -> Result<usize> {
        let conn = conn(&self.pool)?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM audio_cache", [], |row| row.get(0))?;
        Ok(usize::try_from(n).unwrap_or(0))
    }

    /// Whether the store holds no entries
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Total size of stored payloads in bytes of base64 text
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn size_bytes(&self) -> Result<u64> {
        let conn = conn(&self.pool)?;
        let n: i64 = conn.query_row(
            "SELECT COALESCE(SUM(LENGTH(audio)), 0) FROM audio_cache",
            [],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(n).unwrap_or(0))
    }

    /// Remove every entry
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn clear(&self) -> Result<usize> {
        let conn = conn(&self.pool)?;
        let removed = conn.execute("DELETE FROM audio_cache", [])?;
        tracing::info!(removed, "audio cache cleared");
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    #[test]
    fn put_get_clear() {
        let store = AudioStore::new(init_memory().unwrap());
        assert_eq!(store.get("default:你好").unwrap(), None);
        assert!(store.is_empty().unwrap());

        store.put("default:你好", "AAAA").unwrap();
        store.put("default:你好", "BBBB").unwrap();
        assert_eq!(store.get("default:你好").unwrap().as_deref(), Some("BBBB"));
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(store.size_bytes().unwrap(), 4);

        assert_eq!(store.clear().unwrap(), 1);
        assert!(store.is_empty().unwrap());
    }
}
