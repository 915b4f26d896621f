//! Tutor session
//!
//! Ties the pattern set, learner state, conversation and playback together.
//! Front ends call into a [`Tutor`] the way UI handlers would.

pub mod requests;

use std::sync::Arc;

use chrono::{Local, NaiveDate, Utc};
use rand::Rng;

use crate::audio::PlaybackController;
use crate::conversation::Conversation;
use crate::db::{
    CorrectionEntry, CorrectionHistory, DailyStore, DbPool, KvStore, LearningCounts, QuizLog,
};
use crate::gateway::ApiGateway;
use crate::patterns::{Pattern, PatternSet};
use crate::practice::PracticeSpree;
use crate::quiz::{QuizQuestion, build_quiz};
use crate::schema::{
    CharacterInfo, PracticeProblem, PronunciationFeedback, ReplySuggestions, Script, Structured,
    Translation, WritingCorrection, WritingTopic,
};
use crate::Result;

/// One learner's tutor session
pub struct Tutor {
    gateway: ApiGateway,
    patterns: PatternSet,
    counts: LearningCounts,
    corrections: CorrectionHistory,
    daily: DailyStore,
    quiz_log: QuizLog,
    conversation: Conversation,
    playback: Arc<PlaybackController>,
}

impl Tutor {
    /// Create a session over an initialized database
    ///
    /// # Errors
    ///
    /// Returns error if learner state cannot be loaded
    pub fn new(
        gateway: ApiGateway,
        patterns: PatternSet,
        pool: DbPool,
        playback: Arc<PlaybackController>,
    ) -> Result<Self> {
        let kv = KvStore::new(pool);
        Ok(Self {
            gateway,
            patterns,
            counts: LearningCounts::load(kv.clone())?,
            corrections: CorrectionHistory::new(kv.clone()),
            daily: DailyStore::new(kv.clone()),
            quiz_log: QuizLog::new(kv),
            conversation: Conversation::new(),
            playback,
        })
    }

    #[must_use]
    pub const fn patterns(&self) -> &PatternSet {
        &self.patterns
    }

    #[must_use]
    pub const fn gateway(&self) -> &ApiGateway {
        &self.gateway
    }

    #[must_use]
    pub const fn playback(&self) -> &Arc<PlaybackController> {
        &self.playback
    }

    #[must_use]
    pub const fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    #[must_use]
    pub const fn learning_counts(&self) -> &LearningCounts {
        &self.counts
    }

    /// Find a pattern by text or pinyin
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PatternNotFound`] when nothing matches
    pub fn pattern(&self, query: &str) -> Result<&Pattern> {
        self.patterns.find(query)
    }

    /// Mark a pattern learned once more
    ///
    /// # Errors
    ///
    /// Returns error if the pattern is unknown or the count cannot be saved
    pub fn mark_learned(&mut self, query: &str) -> Result<u32> {
        let name = self.patterns.find(query)?.pattern.clone();
        self.counts.mark_learned(&name)
    }

    /// Today's patterns
    ///
    /// # Errors
    ///
    /// Returns error if the selection cannot be read or saved
    pub fn daily_patterns(&self, force_new: bool) -> Result<Vec<&Pattern>> {
        let today = Local::now().date_naive();
        self.daily_patterns_on(today, force_new, &mut rand::thread_rng())
    }

    /// Patterns for a given day
    ///
    /// # Errors
    ///
    /// Returns error if the selection cannot be read or saved
    pub fn daily_patterns_on<R: Rng + ?Sized>(
        &self,
        date: NaiveDate,
        force_new: bool,
        rng: &mut R,
    ) -> Result<Vec<&Pattern>> {
        let selection = self
            .daily
            .for_day(date, &self.patterns.names(), force_new, rng)?;
        Ok(selection
            .patterns
            .iter()
            .filter_map(|name| self.patterns.get(name))
            .collect())
    }

    /// Translate a sentence
    ///
    /// # Errors
    ///
    /// Returns the gateway error when the request fails
    pub async fn translate(&self, text: &str) -> Result<Structured<Translation>> {
        requests::translate(&self.gateway, text).await
    }

    /// Start an open chat with no history
    pub fn start_chat(&mut self) {
        self.conversation.start_chat();
    }

    /// Start a chat about a pattern; returns the tutor's opening line
    ///
    /// # Errors
    ///
    /// Returns error if the pattern is unknown or the request fails
    pub async fn start_chat_with_pattern(&mut self, query: &str) -> Result<String> {
        let pattern = self.patterns.find(query)?;
        self.conversation.start_chat();
        let opening = requests::start_chat_with_pattern(&self.gateway, pattern).await?;
        self.conversation.push_model(opening.clone());
        Ok(opening)
    }

    /// Start a roleplay; returns the tutor's opening line
    ///
    /// # Errors
    ///
    /// Returns the gateway error when the request fails
    pub async fn start_roleplay(&mut self, scenario: &str) -> Result<String> {
        self.conversation.start_roleplay(scenario);
        let opening = requests::start_roleplay(&self.gateway, scenario).await?;
        self.conversation.push_model(opening.clone());
        Ok(opening)
    }

    /// Send a chat message and record both sides
    ///
    /// On failure the unanswered message is dropped from the history.
    ///
    /// # Errors
    ///
    /// Returns the gateway error when the request fails
    pub async fn send_chat(&mut self, message: &str) -> Result<String> {
        let history = self.conversation.for_api();
        let context = self.conversation.roleplay_context().map(str::to_string);
        self.conversation.push_user(message);

        match requests::chat(&self.gateway, &history, message, context.as_deref()).await {
            Ok(reply) => {
                self.conversation.push_model(reply.clone());
                Ok(reply)
            }
            Err(e) => {
                self.conversation.pop_unanswered();
                Err(e)
            }
        }
    }

    /// Suggest replies for the current chat
    ///
    /// # Errors
    ///
    /// Returns the gateway error when the request fails
    pub async fn suggest_reply(&self) -> Result<Structured<ReplySuggestions>> {
        requests::suggest_reply(
            &self.gateway,
            &self.conversation.for_api(),
            self.conversation.roleplay_context(),
        )
        .await
    }

    /// Correct writing and keep the correction in the history
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the history cannot be saved
    pub async fn correct_writing(&self, text: &str) -> Result<Structured<WritingCorrection>> {
        let result = requests::correct_writing(&self.gateway, text).await?;
        if let Structured::Parsed(c) = &result {
            self.corrections.push(CorrectionEntry {
                original: text.to_string(),
                corrected: c.corrected.clone(),
                explanation: c.explanation.clone(),
                timestamp: Utc::now(),
            })?;
        }
        Ok(result)
    }

    /// Stored corrections, newest first
    ///
    /// # Errors
    ///
    /// Returns error if the history cannot be read
    pub fn correction_history(&self) -> Result<Vec<CorrectionEntry>> {
        self.corrections.list()
    }

    /// Suggest a writing topic
    ///
    /// # Errors
    ///
    /// Returns the gateway error when the request fails
    pub async fn writing_topic(&self, pattern: Option<&str>) -> Result<Structured<WritingTopic>> {
        requests::get_writing_topic(&self.gateway, pattern).await
    }

    /// Explain a character
    ///
    /// # Errors
    ///
    /// Returns the gateway error when the request fails
    pub async fn character_info(&self, character: &str) -> Result<Structured<CharacterInfo>> {
        requests::get_character_info(&self.gateway, character).await
    }

    /// Grade a spoken attempt
    ///
    /// # Errors
    ///
    /// Returns the gateway error when the request fails
    pub async fn evaluate_pronunciation(
        &self,
        reference: &str,
        spoken: &str,
    ) -> Result<Structured<PronunciationFeedback>> {
        requests::evaluate_pronunciation(&self.gateway, reference, spoken).await
    }

    /// Listening script around a pattern
    ///
    /// # Errors
    ///
    /// Returns error if the pattern is unknown or the request fails
    pub async fn conversation_script(&self, query: &str) -> Result<Structured<Script>> {
        let pattern = self.patterns.find(query)?;
        requests::generate_conversation_script(&self.gateway, pattern).await
    }

    /// Listening script for a situation
    ///
    /// # Errors
    ///
    /// Returns the gateway error when the request fails
    pub async fn situational_script(&self, scenario: &str) -> Result<Structured<Script>> {
        requests::generate_situational_script(&self.gateway, scenario).await
    }

    /// Begin a practice spree for a pattern
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::PatternNotFound`] when nothing matches
    pub fn start_spree(&self, query: &str, goal: u32) -> Result<PracticeSpree> {
        let pattern = self.patterns.find(query)?;
        Ok(PracticeSpree::new(pattern.pattern.clone(), goal))
    }

    /// Next problem for a spree
    ///
    /// A parsed question is recorded as asked; an unreadable one counts
    /// toward the spree giving up.
    ///
    /// # Errors
    ///
    /// Returns error if the pattern is unknown or the request fails
    pub async fn next_problem(
        &self,
        spree: &mut PracticeSpree,
    ) -> Result<Structured<PracticeProblem>> {
        let pattern = self.patterns.find(&spree.pattern)?;
        let problem = requests::generate_practice(&self.gateway, pattern, &spree.asked).await?;
        match &problem {
            Structured::Parsed(p) => spree.record_question(&p.question),
            Structured::Degraded { .. } => spree.record_unreadable(),
        }
        Ok(problem)
    }

    /// Questions for a quiz
    #[must_use]
    pub fn quiz(&self, count: usize) -> Vec<QuizQuestion> {
        build_quiz(&self.patterns, count, &mut rand::thread_rng())
    }

    /// Record that today's quiz was finished
    ///
    /// # Errors
    ///
    /// Returns error if the date cannot be saved
    pub fn complete_quiz(&self) -> Result<()> {
        self.quiz_log.record_completion(Local::now().date_naive())
    }

    /// Whether a quiz was already finished today
    ///
    /// # Errors
    ///
    /// Returns error if the date cannot be read
    pub fn quiz_done_today(&self) -> Result<bool> {
        self.quiz_log.completed_on(Local::now().date_naive())
    }
}
