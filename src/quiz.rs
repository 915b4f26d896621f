//! Multiple-choice pattern quiz

use rand::Rng;
use rand::seq::SliceRandom;

use crate::patterns::PatternSet;

/// Options shown per question
pub const OPTIONS_PER_QUESTION: usize = 4;

/// Pick the pattern that matches a meaning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizQuestion {
    pub meaning: String,
    pub options: Vec<String>,
    pub answer: usize,
}

impl QuizQuestion {
    #[must_use]
    pub const fn is_correct(&self, choice: usize) -> bool {
        choice == self.answer
    }
}

/// Build up to `count` questions from distinct patterns
///
/// Each question has one correct option and distinct distractors drawn from
/// the rest of the set; fewer options are used when the set is small.
pub fn build_quiz<R: Rng + ?Sized>(
    patterns: &PatternSet,
    count: usize,
    rng: &mut R,
) -> Vec<QuizQuestion> {
    let all: Vec<_> = patterns.iter().collect();
    let targets: Vec<_> = all.choose_multiple(rng, count).copied().collect();

    targets
        .into_iter()
        .map(|target| {
            let distractors: Vec<&String> = all
                .iter()
                .filter(|p| p.pattern != target.pattern)
                .map(|p| &p.pattern)
                .collect();

            let mut options: Vec<String> = distractors
                .choose_multiple(rng, OPTIONS_PER_QUESTION - 1)
                .map(|p| (*p).clone())
                .collect();
            options.push(target.pattern.clone());
            options.shuffle(rng);

            let answer = options
                .iter()
                .position(|o| *o == target.pattern)
                .unwrap_or_default();

            QuizQuestion {
                meaning: target.meaning.clone(),
                options,
                answer,
            }
        })
        .collect()
}

/// Running tally of a quiz
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QuizScore {
    pub correct: usize,
    pub total: usize,
}

impl QuizScore {
    /// Grade a choice, `None` when the input named no option
    pub fn record(&mut self, question: &QuizQuestion, choice: Option<usize>) -> bool {
        let ok = choice.is_some_and(|c| question.is_correct(c));
        self.total += 1;
        if ok {
            self.correct += 1;
        }
        ok
    }
}

impl std::fmt::Display for QuizScore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.correct, self.total)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    #[test]
    fn questions_are_well_formed() {
        let set = PatternSet::bundled().unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let quiz = build_quiz(&set, 5, &mut rng);

        assert_eq!(quiz.len(), 5);
        for q in &quiz {
            assert_eq!(q.options.len(), OPTIONS_PER_QUESTION);
            let unique: HashSet<_> = q.options.iter().collect();
            assert_eq!(unique.len(), q.options.len());

            let expected = set.iter().find(|p| p.meaning == q.meaning).unwrap();
            assert_eq!(q.options[q.answer], expected.pattern);
            assert!(q.is_correct(q.answer));
        }

        let meanings: HashSet<_> = quiz.iter().map(|q| &q.meaning).collect();
        assert_eq!(meanings.len(), quiz.len());
    }

    #[test]
    fn score_counts_every_question() {
        let question = QuizQuestion {
            meaning: "emphasis on how".to_string(),
            options: vec!["把".to_string(), "是……的".to_string()],
            answer: 1,
        };
        let mut score = QuizScore::default();

        assert!(score.record(&question, Some(1)));
        assert!(!score.record(&question, Some(0)));
        assert!(!score.record(&question, None));
        assert_eq!(score, QuizScore { correct: 1, total: 3 });
        assert_eq!(score.to_string(), "1/3");
    }

    #[test]
    fn count_is_capped_by_set_size() {
        let set = PatternSet::bundled().unwrap();
        let quiz = build_quiz(&set, 100, &mut StdRng::seed_from_u64(1));
        assert_eq!(quiz.len(), set.len());
    }
}
