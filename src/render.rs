//! Plain-text fragments for the terminal front end

use std::fmt::Write as _;

use crate::conversation::{Role, Turn};
use crate::db::CorrectionEntry;
use crate::patterns::Pattern;
use crate::quiz::QuizQuestion;
use crate::schema::{
    CharacterInfo, DEGRADED_MESSAGE, ReplySuggestions, Script, Structured, Translation,
    WritingCorrection, WritingTopic,
};

/// Pattern card with examples, vocabulary and learned count
#[must_use]
pub fn pattern_card(pattern: &Pattern, learned: u32) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} ({})", pattern.pattern, pattern.pinyin);
    let _ = writeln!(out, "  {}", pattern.meaning);
    let _ = writeln!(out, "  Structure: {}", pattern.structure);

    if !pattern.examples.is_empty() {
        out.push_str("\nExamples:\n");
        for (i, ex) in pattern.examples.iter().enumerate() {
            let _ = writeln!(out, "  {}. {}", i + 1, ex.chinese);
            let _ = writeln!(out, "     {}", ex.pinyin);
            let _ = writeln!(out, "     {}", ex.english);
        }
    }

    if !pattern.vocab.is_empty() {
        out.push_str("\nVocabulary:\n");
        for v in &pattern.vocab {
            let _ = writeln!(out, "  {} ({}) {}", v.word, v.pinyin, v.meaning);
        }
    }

    let _ = write!(out, "\nLearned {learned} time{}", plural(learned));
    out
}

/// Chat transcript; a roleplay seed is shown as a scenario banner
#[must_use]
pub fn transcript(turns: &[Turn]) -> String {
    let mut out = String::new();
    for turn in turns {
        match turn {
            Turn::System { context } => {
                let _ = writeln!(out, "[Scenario: {context}]");
            }
            Turn::Message { role, text } => {
                let who = match role {
                    Role::User => "You",
                    Role::Model => "Tutor",
                };
                let _ = writeln!(out, "{who}: {text}");
            }
        }
    }
    out
}

/// Numbered script lines with pinyin and translation
#[must_use]
pub fn script(script: &Script) -> String {
    let mut out = String::new();
    if let Some(title) = &script.title {
        let _ = writeln!(out, "{title}\n");
    }
    for (i, line) in script.lines.iter().enumerate() {
        let _ = writeln!(out, "{:>2}. {}: {}", i + 1, line.speaker, line.text);
        if let Some(pinyin) = &line.pinyin {
            let _ = writeln!(out, "    {pinyin}");
        }
        if let Some(translation) = &line.translation {
            let _ = writeln!(out, "    {translation}");
        }
    }
    out
}

/// Stored corrections, newest first
#[must_use]
pub fn correction_history(entries: &[CorrectionEntry]) -> String {
    if entries.is_empty() {
        return "No corrections yet.".to_string();
    }

    let mut out = String::new();
    for entry in entries {
        let _ = writeln!(out, "{}", entry.timestamp.format("%Y-%m-%d %H:%M"));
        let _ = writeln!(out, "  - {}", entry.original);
        let _ = writeln!(out, "  + {}", entry.corrected);
        if !entry.explanation.is_empty() {
            let _ = writeln!(out, "  {}", entry.explanation);
        }
    }
    out
}

/// Quiz question with lettered options
#[must_use]
pub fn quiz_question(number: usize, question: &QuizQuestion) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Q{number}. Which pattern means \"{}\"?", question.meaning);
    for (i, option) in question.options.iter().enumerate() {
        let _ = writeln!(out, "  {}) {option}", option_letter(i));
    }
    out
}

/// Letter shown next to option `index`
#[must_use]
pub fn option_letter(index: usize) -> char {
    u8::try_from(index)
        .ok()
        .and_then(|i| b'a'.checked_add(i))
        .map_or('?', char::from)
}

/// Parse a typed option letter back into an index
#[must_use]
pub fn parse_option(input: &str, options: usize) -> Option<usize> {
    let c = input.trim().chars().next()?.to_ascii_lowercase();
    let index = (c as usize).checked_sub('a' as usize)?;
    (index < options).then_some(index)
}

#[must_use]
pub fn translation(result: &Structured<Translation>) -> String {
    degraded_or(result, |t| {
        let mut out = t.translation.clone();
        if let Some(pinyin) = &t.pinyin {
            let _ = write!(out, "\n{pinyin}");
        }
        if let Some(notes) = &t.notes {
            let _ = write!(out, "\n\n{notes}");
        }
        out
    })
}

#[must_use]
pub fn correction(result: &Structured<WritingCorrection>) -> String {
    degraded_or(result, |c| format!("{}\n\n{}", c.corrected, c.explanation))
}

#[must_use]
pub fn writing_topic(result: &Structured<WritingTopic>) -> String {
    degraded_or(result, |t| match &t.prompt {
        Some(prompt) => format!("{}\n{prompt}", t.topic),
        None => t.topic.clone(),
    })
}

#[must_use]
pub fn character(result: &Structured<CharacterInfo>) -> String {
    degraded_or(result, |c| {
        let mut out = format!("{} ({}) {}", c.character, c.pinyin, c.meaning);
        if let Some(radical) = &c.radical {
            let _ = write!(out, "\nRadical: {radical}");
        }
        if let Some(strokes) = c.strokes {
            let _ = write!(out, "\nStrokes: {strokes}");
        }
        for ex in &c.examples {
            let _ = write!(out, "\n  {ex}");
        }
        out
    })
}

#[must_use]
pub fn suggestions(result: &Structured<ReplySuggestions>) -> String {
    degraded_or(result, |s| {
        s.suggestions
            .iter()
            .map(|s| {
                let mut line = format!("* {}", s.chinese);
                if let Some(pinyin) = &s.pinyin {
                    let _ = write!(line, " ({pinyin})");
                }
                if let Some(english) = &s.english {
                    let _ = write!(line, " {english}");
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n")
    })
}

fn degraded_or<T>(result: &Structured<T>, render: impl FnOnce(&T) -> String) -> String {
    match result {
        Structured::Parsed(value) => render(value),
        Structured::Degraded { .. } => DEGRADED_MESSAGE.to_string(),
    }
}

const fn plural(n: u32) -> &'static str {
    if n == 1 { "" } else { "s" }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use chrono::Utc;

    use super::*;
    use crate::patterns::PatternSet;

    #[test]
    fn card_shows_learned_count() {
        let set = PatternSet::bundled().unwrap();
        let pattern = set.iter().next().unwrap();

        let card = pattern_card(pattern, 1);
        assert!(card.starts_with(&pattern.pattern));
        assert!(card.contains(&pattern.structure));
        assert!(card.ends_with("Learned 1 time"));
        assert!(pattern_card(pattern, 3).ends_with("Learned 3 times"));
    }

    #[test]
    fn transcript_shows_scenario_banner() {
        let turns = vec![
            Turn::System {
                context: "ordering food".to_string(),
            },
            Turn::Message {
                role: Role::Model,
                text: "欢迎光临！".to_string(),
            },
            Turn::Message {
                role: Role::User,
                text: "我要一碗面".to_string(),
            },
        ];
        assert_eq!(
            transcript(&turns),
            "[Scenario: ordering food]\nTutor: 欢迎光临！\nYou: 我要一碗面\n"
        );
    }

    #[test]
    fn empty_history_message() {
        assert_eq!(correction_history(&[]), "No corrections yet.");

        let entry = CorrectionEntry {
            original: "我去了学校昨天".to_string(),
            corrected: "我昨天去了学校".to_string(),
            explanation: "Time words go before the verb.".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap(),
        };
        let text = correction_history(&[entry]);
        assert!(text.starts_with("2024-03-01 09:30\n"));
        assert!(text.contains("  + 我昨天去了学校\n"));
    }

    #[test]
    fn option_letters_round_trip() {
        assert_eq!(option_letter(0), 'a');
        assert_eq!(option_letter(3), 'd');
        assert_eq!(parse_option("C", 4), Some(2));
        assert_eq!(parse_option(" b ", 4), Some(1));
        assert_eq!(parse_option("e", 4), None);
        assert_eq!(parse_option("", 4), None);
    }

    #[test]
    fn degraded_results_use_placeholder() {
        let degraded: Structured<Translation> = Structured::Degraded {
            reason: "no json".to_string(),
            raw: "hmm".to_string(),
        };
        assert_eq!(translation(&degraded), DEGRADED_MESSAGE);
    }
}
