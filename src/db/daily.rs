//! Daily pattern selection

use chrono::NaiveDate;
use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::KvStore;
use crate::Result;

const DAILY_KEY: &str = "daily_patterns";

/// Patterns offered per day
pub const PATTERNS_PER_DAY: usize = 2;

/// Patterns chosen for one calendar day
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailySelection {
    pub date: NaiveDate,
    pub patterns: Vec<String>,
}

/// Persists the daily selection keyed by date
#[derive(Clone)]
pub struct DailyStore {
    kv: KvStore,
}

impl DailyStore {
    #[must_use]
    pub const fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    /// Currently stored selection, whatever its date
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn stored(&self) -> Result<Option<DailySelection>> {
        self.kv.get(DAILY_KEY)
    }

    /// Selection for `today`
    ///
    /// Reuses the stored selection when it belongs to `today`, otherwise
    /// draws a new one from `pool`. `force` always draws, avoiding the
    /// previous picks where the pool allows.
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn for_day<R: Rng + ?Sized>(
        &self,
        today: NaiveDate,
        pool: &[String],
        force: bool,
        rng: &mut R,
    ) -> Result<DailySelection> {
        let previous = self.stored()?;

        if !force {
            if let Some(sel) = previous.as_ref().filter(|s| s.date == today) {
                return Ok(sel.clone());
            }
        }

        let avoid = previous.map(|s| s.patterns).unwrap_or_default();
        let patterns = draw(pool, if force { &avoid } else { &[] }, rng);
        let selection = DailySelection {
            date: today,
            patterns,
        };

        self.kv.set(DAILY_KEY, &selection)?;
        tracing::info!(%today, patterns = ?selection.patterns, force, "daily patterns selected");
        Ok(selection)
    }
}

/// Pick up to [`PATTERNS_PER_DAY`] distinct patterns, preferring ones not in `avoid`
fn draw<R: Rng + ?Sized>(pool: &[String], avoid: &[String], rng: &mut R) -> Vec<String> {
    let (fresh, seen): (Vec<&String>, Vec<&String>) =
        pool.iter().partition(|p| !avoid.contains(p));

    let mut picked: Vec<String> = fresh
        .choose_multiple(rng, PATTERNS_PER_DAY)
        .map(|p| (*p).clone())
        .collect();

    let missing = PATTERNS_PER_DAY.saturating_sub(picked.len());
    picked.extend(seen.choose_multiple(rng, missing).map(|p| (*p).clone()));
    picked
}
