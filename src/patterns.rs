//! Bundled grammar-pattern dataset

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

const BUNDLED_PATTERNS: &str = include_str!("../data/patterns.json");

/// Example sentence for a pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub chinese: String,
    pub pinyin: String,
    pub english: String,
}

/// Vocabulary item used by a pattern's examples
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VocabItem {
    pub word: String,
    pub pinyin: String,
    pub meaning: String,
}

/// Static practice prompt shipped with a pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeItem {
    pub question: String,
    pub answer: String,
}

/// A grammar pattern
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pattern {
    pub pattern: String,
    pub pinyin: String,
    pub meaning: String,
    pub structure: String,
    #[serde(default)]
    pub examples: Vec<Example>,
    #[serde(default)]
    pub vocab: Vec<VocabItem>,
    #[serde(default)]
    pub practice: Option<Vec<PracticeItem>>,
}

/// Read-only set of patterns, loaded once
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    /// Load the dataset compiled into the binary
    ///
    /// # Errors
    ///
    /// Returns error if the bundled JSON is invalid
    pub fn bundled() -> Result<Self> {
        Self::from_json(BUNDLED_PATTERNS)
    }

    /// Load a dataset from JSON text
    ///
    /// # Errors
    ///
    /// Returns error if the JSON is invalid or contains no patterns
    pub fn from_json(json: &str) -> Result<Self> {
        let patterns: Vec<Pattern> = serde_json::from_str(json)?;
        if patterns.is_empty() {
            return Err(Error::Config("pattern dataset is empty".to_string()));
        }
        tracing::debug!(count = patterns.len(), "patterns loaded");
        Ok(Self { patterns })
    }

    /// Exact lookup by pattern text
    #[must_use]
    pub fn get(&self, pattern: &str) -> Option<&Pattern> {
        self.patterns.iter().find(|p| p.pattern == pattern)
    }

    /// Lookup by pattern text, falling back to a pinyin or substring match
    ///
    /// # Errors
    ///
    /// Returns [`Error::PatternNotFound`] when nothing matches
    pub fn find(&self, query: &str) -> Result<&Pattern> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::PatternNotFound(query.to_string()));
        }
        self.get(query)
            .or_else(|| {
                self.patterns
                    .iter()
                    .find(|p| p.pinyin.eq_ignore_ascii_case(query))
            })
            .or_else(|| self.patterns.iter().find(|p| p.pattern.contains(query)))
            .ok_or_else(|| Error::PatternNotFound(query.to_string()))
    }

    /// Pattern names in dataset order
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.patterns.iter().map(|p| p.pattern.clone()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Pattern> {
        self.patterns.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_dataset_loads() {
        let set = PatternSet::bundled().unwrap();
        assert!(set.len() >= 4);
        assert!(set.iter().all(|p| !p.examples.is_empty()));
    }

    #[test]
    fn find_by_text_pinyin_and_substring() {
        let set = PatternSet::bundled().unwrap();
        assert_eq!(set.find("把").unwrap().pattern, "把");
        assert_eq!(set.find("yuè lái yuè").unwrap().pattern, "越来越");
        assert_eq!(set.find("除了").unwrap().pattern, "除了……以外");
        assert!(matches!(
            set.find("不存在"),
            Err(Error::PatternNotFound(_))
        ));
    }

    #[test]
    fn blank_query_matches_nothing() {
        let set = PatternSet::bundled().unwrap();
        assert!(matches!(set.find(""), Err(Error::PatternNotFound(_))));
        assert!(matches!(set.find("  \t"), Err(Error::PatternNotFound(_))));
    }

    #[test]
    fn empty_dataset_rejected() {
        assert!(PatternSet::from_json("[]").is_err());
    }
}
