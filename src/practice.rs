//! Practice sprees: a run of generated problems for one pattern

use serde::{Deserialize, Serialize};

/// Default number of problems in a spree
pub const DEFAULT_SPREE_GOAL: u32 = 5;

/// Unreadable problems in a row before a spree gives up
pub const MAX_UNREADABLE_IN_A_ROW: u32 = 3;

/// Progress through a spree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PracticeSpree {
    pub pattern: String,
    pub goal: u32,
    pub answered: u32,
    pub correct: u32,
    /// Questions already asked, sent back so they are not repeated
    pub asked: Vec<String>,
    #[serde(default)]
    pub unreadable_in_a_row: u32,
}

impl PracticeSpree {
    #[must_use]
    pub fn new(pattern: impl Into<String>, goal: u32) -> Self {
        Self {
            pattern: pattern.into(),
            goal: goal.max(1),
            answered: 0,
            correct: 0,
            asked: Vec::new(),
            unreadable_in_a_row: 0,
        }
    }

    /// Remember a question that was shown
    pub fn record_question(&mut self, question: &str) {
        self.unreadable_in_a_row = 0;
        self.asked.push(question.to_string());
    }

    /// Count a problem the tutor returned in an unreadable form
    pub fn record_unreadable(&mut self) {
        self.unreadable_in_a_row += 1;
        if self.gave_up() {
            tracing::warn!(
                pattern = %self.pattern,
                attempts = self.unreadable_in_a_row,
                "practice spree abandoned after unreadable problems"
            );
        }
    }

    /// Too many unreadable problems in a row
    #[must_use]
    pub const fn gave_up(&self) -> bool {
        self.unreadable_in_a_row >= MAX_UNREADABLE_IN_A_ROW
    }

    /// Grade an answer against the expected one and count it
    pub fn record_answer(&mut self, expected: &str, given: &str) -> bool {
        let ok = answers_match(expected, given);
        self.answered += 1;
        if ok {
            self.correct += 1;
        }
        tracing::debug!(
            pattern = %self.pattern,
            answered = self.answered,
            correct = self.correct,
            ok,
            "practice answer recorded"
        );
        ok
    }

    #[must_use]
    pub const fn is_finished(&self) -> bool {
        self.answered >= self.goal || self.gave_up()
    }

    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.goal.saturating_sub(self.answered)
    }
}

/// Compare answers ignoring whitespace, punctuation and ASCII case
#[must_use]
pub fn answers_match(expected: &str, given: &str) -> bool {
    let norm = |s: &str| -> String {
        s.chars()
            .filter(|c| !c.is_whitespace() && !is_punctuation(*c))
            .flat_map(char::to_lowercase)
            .collect()
    };
    let expected = norm(expected);
    !expected.is_empty() && expected == norm(given)
}

fn is_punctuation(c: char) -> bool {
    c.is_ascii_punctuation() || "。，、！？；：“”‘’（）《》…—·".contains(c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn punctuation_and_spacing_ignored() {
        assert!(answers_match("我是坐火车来的。", "我是坐火车来的"));
        assert!(answers_match("我是坐火车来的。", " 我是 坐火车来的！"));
        assert!(answers_match("Hello, world", "hello world"));
        assert!(!answers_match("我是坐火车来的。", "我坐火车来了"));
        assert!(!answers_match("。", ""));
    }

    #[test]
    fn spree_finishes_at_goal() {
        let mut spree = PracticeSpree::new("把", 2);
        spree.record_question("Q1");
        assert!(spree.record_answer("请把门关上", "请把门关上。"));
        assert_eq!(spree.remaining(), 1);
        assert!(!spree.is_finished());

        spree.record_question("Q2");
        assert!(!spree.record_answer("我把作业做完了", "不知道"));
        assert!(spree.is_finished());
        assert_eq!(spree.correct, 1);
        assert_eq!(spree.asked, vec!["Q1", "Q2"]);
    }

    #[test]
    fn unreadable_streak_ends_spree() {
        let mut spree = PracticeSpree::new("把", 5);
        spree.record_unreadable();
        spree.record_unreadable();
        spree.record_question("Q1");
        assert_eq!(spree.unreadable_in_a_row, 0);

        for _ in 0..MAX_UNREADABLE_IN_A_ROW {
            assert!(!spree.is_finished());
            spree.record_unreadable();
        }
        assert!(spree.gave_up());
        assert!(spree.is_finished());
        assert_eq!(spree.answered, 0);
    }

    #[test]
    fn zero_goal_is_raised_to_one() {
        assert_eq!(PracticeSpree::new("被", 0).goal, 1);
    }
}
