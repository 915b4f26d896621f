//! JSON key-value store for learner state

use rusqlite::OptionalExtension;
use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{DbPool, conn};
use crate::Result;

/// Key-value repository; each value is stored as one JSON document
#[derive(Clone)]
pub struct KvStore {
    pool: DbPool,
}

impl KvStore {
    /// Create a new key-value store
    #[must_use]
    pub const fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Read and decode a value
    ///
    /// A stored value that no longer decodes is treated as absent.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        let conn = conn(&self.pool)?;
        let raw: Option<String> = conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| {
                row.get(0)
            })
            .optional()?;

        Ok(raw.and_then(|s| match serde_json::from_str(&s) {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding undecodable stored value");
                None
            }
        }))
    }

    /// Encode and store a value, replacing any previous one
    ///
    /// # Errors
    ///
    /// Returns error if encoding or the database operation fails
    pub fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        let conn = conn(&self.pool)?;
        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, datetime('now'))
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            [key, json.as_str()],
        )?;
        Ok(())
    }

    /// Remove a value
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn remove(&self, key: &str) -> Result<()> {
        let conn = conn(&self.pool)?;
        conn.execute("DELETE FROM kv WHERE key = ?1", [key])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;
    use crate::db::init_memory;

    #[test]
    fn set_get_overwrite() {
        let kv = KvStore::new(init_memory().unwrap());
        assert_eq!(kv.get::<String>("name").unwrap(), None);

        kv.set("name", "小明").unwrap();
        kv.set("name", "小红").unwrap();
        assert_eq!(kv.get::<String>("name").unwrap().as_deref(), Some("小红"));

        kv.remove("name").unwrap();
        assert_eq!(kv.get::<String>("name").unwrap(), None);
    }

    #[test]
    fn undecodable_value_reads_as_absent() {
        let kv = KvStore::new(init_memory().unwrap());
        kv.set("counts", "not a map").unwrap();
        assert_eq!(kv.get::<HashMap<String, u32>>("counts").unwrap(), None);
    }
}
