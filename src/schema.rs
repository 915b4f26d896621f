//! Typed reply schemas for tutor actions
//!
//! Every structured action reply is extracted, parsed and validated into one
//! of these types. Anything that fails along the way becomes
//! [`Structured::Degraded`] rather than an error.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::extract::extract_structured;

/// Post-parse checks for a reply schema
pub trait Validate {
    /// Reject replies that parsed but are unusable
    ///
    /// # Errors
    ///
    /// Returns a description of the first problem found
    fn validate(&self) -> std::result::Result<(), String>;
}

/// Outcome of reading a structured reply
#[derive(Debug, Clone, PartialEq)]
pub enum Structured<T> {
    /// Reply matched the schema
    Parsed(T),
    /// Reply could not be used; `raw` keeps the original text for display
    Degraded {
        /// Why the reply was rejected
        reason: String,
        /// Original reply text
        raw: String,
    },
}

impl<T> Structured<T> {
    /// Parsed value, if any
    #[must_use]
    pub fn parsed(self) -> Option<T> {
        match self {
            Self::Parsed(v) => Some(v),
            Self::Degraded { .. } => None,
        }
    }

    /// Whether the reply was degraded
    #[must_use]
    pub const fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded { .. })
    }
}

/// Placeholder shown when a reply could not be understood
pub const DEGRADED_MESSAGE: &str = "Sorry, the tutor's answer could not be read. Please try again.";

/// Extract, parse and validate a reply
#[must_use]
pub fn parse_structured<T>(raw: &str) -> Structured<T>
where
    T: DeserializeOwned + Validate,
{
    let degraded = |reason: String| {
        tracing::warn!(%reason, "degraded tutor reply");
        Structured::Degraded {
            reason,
            raw: raw.to_string(),
        }
    };

    let Some(candidate) = extract_structured(raw) else {
        return degraded("no structured block in reply".to_string());
    };

    match serde_json::from_str::<T>(candidate) {
        Ok(value) => match value.validate() {
            Ok(()) => Structured::Parsed(value),
            Err(reason) => degraded(reason),
        },
        Err(e) => degraded(format!("invalid reply json: {e}")),
    }
}

fn require(field: &str, value: &str) -> std::result::Result<(), String> {
    if value.trim().is_empty() {
        Err(format!("missing {field}"))
    } else {
        Ok(())
    }
}

/// Translation of a sentence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Translation {
    pub translation: String,
    #[serde(default)]
    pub pinyin: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl Validate for Translation {
    fn validate(&self) -> std::result::Result<(), String> {
        require("translation", &self.translation)
    }
}

/// A suggested learner reply in a chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    pub chinese: String,
    #[serde(default)]
    pub pinyin: Option<String>,
    #[serde(default)]
    pub english: Option<String>,
}

/// Reply suggestions for the current chat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplySuggestions {
    pub suggestions: Vec<Suggestion>,
}

impl Validate for ReplySuggestions {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.suggestions.is_empty() {
            return Err("no suggestions".to_string());
        }
        self.suggestions
            .iter()
            .try_for_each(|s| require("suggestion text", &s.chinese))
    }
}

/// One generated practice problem
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeProblem {
    pub question: String,
    pub answer: String,
    #[serde(default)]
    pub hint: Option<String>,
    #[serde(default)]
    pub pinyin: Option<String>,
}

impl Validate for PracticeProblem {
    fn validate(&self) -> std::result::Result<(), String> {
        require("question", &self.question)?;
        require("answer", &self.answer)
    }
}

/// Writing correction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WritingCorrection {
    pub corrected: String,
    pub explanation: String,
}

impl Validate for WritingCorrection {
    fn validate(&self) -> std::result::Result<(), String> {
        require("corrected", &self.corrected)
    }
}

/// Suggested writing topic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WritingTopic {
    pub topic: String,
    #[serde(default)]
    pub prompt: Option<String>,
}

impl Validate for WritingTopic {
    fn validate(&self) -> std::result::Result<(), String> {
        require("topic", &self.topic)
    }
}

/// Breakdown of a single character
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterInfo {
    pub character: String,
    pub pinyin: String,
    pub meaning: String,
    #[serde(default)]
    pub radical: Option<String>,
    #[serde(default)]
    pub strokes: Option<u32>,
    #[serde(default)]
    pub examples: Vec<String>,
}

impl Validate for CharacterInfo {
    fn validate(&self) -> std::result::Result<(), String> {
        require("character", &self.character)?;
        require("meaning", &self.meaning)
    }
}

/// Pronunciation evaluation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PronunciationFeedback {
    #[serde(default)]
    pub score: Option<u8>,
    pub feedback: String,
    #[serde(default)]
    pub mistakes: Vec<String>,
}

impl Validate for PronunciationFeedback {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.score.is_some_and(|s| s > 100) {
            return Err("score out of range".to_string());
        }
        require("feedback", &self.feedback)
    }
}

/// One spoken line of a listening script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptLine {
    pub speaker: String,
    pub text: String,
    #[serde(default)]
    pub pinyin: Option<String>,
    #[serde(default)]
    pub translation: Option<String>,
}

/// Listening script
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Script {
    #[serde(default)]
    pub title: Option<String>,
    pub lines: Vec<ScriptLine>,
}

impl Validate for Script {
    fn validate(&self) -> std::result::Result<(), String> {
        if self.lines.is_empty() {
            return Err("script has no lines".to_string());
        }
        self.lines.iter().try_for_each(|l| require("line text", &l.text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_correction() {
        let raw = "Here you go:\n```json\n{\"corrected\":\"我是学生。\",\"explanation\":\"Add 是\"}\n```";
        let parsed = parse_structured::<WritingCorrection>(raw).parsed().unwrap();
        assert_eq!(parsed.corrected, "我是学生。");
    }

    #[test]
    fn prose_is_degraded() {
        let out = parse_structured::<Translation>("I cannot help with that.");
        match out {
            Structured::Degraded { raw, .. } => assert_eq!(raw, "I cannot help with that."),
            Structured::Parsed(_) => panic!("expected degraded"),
        }
    }

    #[test]
    fn malformed_json_is_degraded() {
        assert!(parse_structured::<Translation>("{\"translation\": }").is_degraded());
    }

    #[test]
    fn validation_failures_are_degraded() {
        assert!(parse_structured::<Translation>(r#"{"translation": "  "}"#).is_degraded());
        assert!(parse_structured::<Script>(r#"{"lines": []}"#).is_degraded());
        assert!(
            parse_structured::<PronunciationFeedback>(r#"{"score": 140, "feedback": "ok"}"#)
                .is_degraded()
        );
    }

    #[test]
    fn script_lines_parse() {
        let raw = r#"{"title":"At the shop","lines":[
            {"speaker":"A","text":"你要什么？"},
            {"speaker":"B","text":"我要一杯茶。","pinyin":"wǒ yào yì bēi chá"}
        ]}"#;
        let script = parse_structured::<Script>(raw).parsed().unwrap();
        assert_eq!(script.lines.len(), 2);
        assert_eq!(script.lines[1].pinyin.as_deref(), Some("wǒ yào yì bēi chá"));
    }
}
