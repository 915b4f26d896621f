//! Learned counts and quiz completion

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::KvStore;
use crate::Result;

const COUNTS_KEY: &str = "learning_counts";
const LAST_QUIZ_KEY: &str = "last_quiz_date";

/// How many times each pattern has been marked learned
///
/// Loaded once; every mutation is written straight back.
pub struct LearningCounts {
    kv: KvStore,
    counts: BTreeMap<String, u32>,
}

impl LearningCounts {
    /// Load counts from the store
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn load(kv: KvStore) -> Result<Self> {
        let counts = kv.get(COUNTS_KEY)?.unwrap_or_default();
        Ok(Self { kv, counts })
    }

    /// Count for a pattern (zero if never learned)
    #[must_use]
    pub fn get(&self, pattern: &str) -> u32 {
        self.counts.get(pattern).copied().unwrap_or(0)
    }

    /// Increment a pattern's count and persist
    ///
    /// # Errors
    ///
    /// Returns error if the count cannot be persisted
    pub fn mark_learned(&mut self, pattern: &str) -> Result<u32> {
        let count = self.counts.entry(pattern.to_string()).or_insert(0);
        *count = count.saturating_add(1);
        let count = *count;

        self.kv.set(COUNTS_KEY, &self.counts)?;
        tracing::debug!(pattern, count, "pattern marked learned");
        Ok(count)
    }
}

/// Records the date of the last completed quiz
#[derive(Clone)]
pub struct QuizLog {
    kv: KvStore,
}

impl QuizLog {
    #[must_use]
    pub const fn new(kv: KvStore) -> Self {
        Self { kv }
    }

    /// Date of the last completed quiz
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn last_completion(&self) -> Result<Option<NaiveDate>> {
        let raw: Option<String> = self.kv.get(LAST_QUIZ_KEY)?;
        Ok(raw.and_then(|s| NaiveDate::parse_from_str(&s, "%Y-%m-%d").ok()))
    }

    /// Record a quiz completion on `date`
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn record_completion(&self, date: NaiveDate) -> Result<()> {
        self.kv
            .set(LAST_QUIZ_KEY, &date.format("%Y-%m-%d").to_string())
    }

    /// Whether a quiz was completed on `date`
    ///
    /// # Errors
    ///
    /// Returns error if database operation fails
    pub fn completed_on(&self, date: NaiveDate) -> Result<bool> {
        Ok(self.last_completion()? == Some(date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory;

    #[test]
    fn counts_persist_across_loads() {
        let kv = KvStore::new(init_memory().unwrap());

        let mut counts = LearningCounts::load(kv.clone()).unwrap();
        assert_eq!(counts.mark_learned("是……的").unwrap(), 1);
        assert_eq!(counts.mark_learned("是……的").unwrap(), 2);
        assert_eq!(counts.mark_learned("把").unwrap(), 1);

        let reloaded = LearningCounts::load(kv).unwrap();
        assert_eq!(reloaded.get("是……的"), 2);
        assert_eq!(reloaded.get("把"), 1);
        assert_eq!(reloaded.get("被"), 0);
    }

    #[test]
    fn quiz_completion_date() {
        let log = QuizLog::new(KvStore::new(init_memory().unwrap()));
        let day = NaiveDate::from_ymd_opt(2026, 3, 14).unwrap();

        assert_eq!(log.last_completion().unwrap(), None);
        log.record_completion(day).unwrap();
        assert!(log.completed_on(day).unwrap());
        assert!(!log.completed_on(day.succ_opt().unwrap()).unwrap());
    }
}
