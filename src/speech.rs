//! Speech input toggle
//!
//! One recognition session runs at a time. Pressing the listening button
//! stops it; pressing another button stops the old session, waits for the
//! engine to release, then starts the new one. Recognized text is either
//! written into a field or sent for pronunciation evaluation.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;

use crate::error::RecognitionErrorKind;
use crate::gateway::ApiGateway;
use crate::schema::{DEGRADED_MESSAGE, PronunciationFeedback, Structured};
use crate::tutor::requests;
use crate::view::{ControlId, FieldId, View};
use crate::{Error, Result};

/// Wait after stopping one session before starting another
pub const RELEASE_DELAY: Duration = Duration::from_millis(300);

/// Wait before auto-submitting a filled field
pub const SUBMIT_DELAY: Duration = Duration::from_millis(500);

/// Event reported by a recognition engine
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionEvent {
    /// Final transcript
    Result(String),
    /// Speech was heard but not understood
    NoMatch,
    /// Engine failure
    Error(RecognitionErrorKind),
    /// Session ended
    End,
}

/// Speech recognition engine
///
/// `start` begins a session that reports on `events` and finishes with
/// [`RecognitionEvent::End`]; `stop` ends the current session early.
pub trait Recognizer: Send + Sync {
    /// Begin listening
    ///
    /// # Errors
    ///
    /// Returns error if the engine cannot start
    fn start(&self, events: mpsc::UnboundedSender<RecognitionEvent>) -> Result<()>;

    /// Stop listening
    fn stop(&self);
}

/// What recognized speech is used for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechMode {
    /// Write the transcript into a field
    Fill(FieldId),
    /// Grade the transcript against a reference sentence
    Evaluate { reference: String },
}

/// What a button press should do given the listening button
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToggleAction {
    /// Nothing is listening: start
    Start,
    /// The pressed button is listening: stop it
    Stop,
    /// Another button is listening: stop it, then start
    Switch,
}

/// Decide the toggle action for a press
#[must_use]
pub fn toggle(active: Option<&ControlId>, pressed: &ControlId) -> ToggleAction {
    match active {
        None => ToggleAction::Start,
        Some(current) if current == pressed => ToggleAction::Stop,
        Some(_) => ToggleAction::Switch,
    }
}

/// How a press ended
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechOutcome {
    /// The press stopped a session, or this session was replaced
    Stopped,
    /// Session ended without a transcript
    Ended,
    /// Speech was not understood
    NoMatch,
    /// Transcript written into a field
    Filled {
        text: String,
        submitted: bool,
    },
    /// Transcript graded
    Evaluated {
        text: String,
        feedback: Structured<PronunciationFeedback>,
    },
}

struct Session {
    id: u64,
    button: ControlId,
}

/// Microphone toggle bound to a recognition engine
pub struct SpeechInput {
    recognizer: Arc<dyn Recognizer>,
    gateway: ApiGateway,
    view: Arc<dyn View>,
    active: Mutex<Option<Session>>,
    next_id: AtomicU64,
    release_delay: Duration,
    submit_delay: Duration,
}

impl SpeechInput {
    #[must_use]
    pub fn new(recognizer: Arc<dyn Recognizer>, gateway: ApiGateway, view: Arc<dyn View>) -> Self {
        Self {
            recognizer,
            gateway,
            view,
            active: Mutex::new(None),
            next_id: AtomicU64::new(1),
            release_delay: RELEASE_DELAY,
            submit_delay: SUBMIT_DELAY,
        }
    }

    /// Button currently listening
    #[must_use]
    pub fn listening(&self) -> Option<ControlId> {
        self.lock().as_ref().map(|s| s.button.clone())
    }

    /// Handle a microphone button press
    ///
    /// Resolves when the session this press started has ended.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Recognition`] when the engine fails, or the gateway
    /// error when evaluation cannot be requested; both are alerted first
    pub async fn press(&self, button: &ControlId, mode: SpeechMode) -> Result<SpeechOutcome> {
        let current = self.listening();
        match toggle(current.as_ref(), button) {
            ToggleAction::Stop => {
                tracing::debug!(%button, "speech toggle: stop");
                self.end_active();
                return Ok(SpeechOutcome::Stopped);
            }
            ToggleAction::Switch => {
                tracing::debug!(%button, "speech toggle: switch");
                self.end_active();
                tokio::time::sleep(self.release_delay).await;
            }
            ToggleAction::Start => {}
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, mut rx) = mpsc::unbounded_channel();
        *self.lock() = Some(Session {
            id,
            button: button.clone(),
        });
        self.view.render_listening(Some(button));

        if let Err(e) = self.recognizer.start(tx) {
            tracing::error!(error = %e, "recognizer failed to start");
            self.reset(id);
            self.view.alert(&e.user_message());
            return Err(e);
        }

        let mut outcome = SpeechOutcome::Ended;
        while let Some(event) = rx.recv().await {
            if !self.owns(id) {
                return Ok(SpeechOutcome::Stopped);
            }

            match event {
                RecognitionEvent::Result(text) => {
                    tracing::debug!(%text, "speech recognized");
                    match self.deliver(text, &mode).await {
                        Ok(delivered) => outcome = delivered,
                        Err(e) => {
                            self.reset(id);
                            return Err(e);
                        }
                    }
                }
                RecognitionEvent::NoMatch => {
                    self.reset(id);
                    self.view.alert("Sorry, I didn't catch that. Please try again.");
                    return Ok(SpeechOutcome::NoMatch);
                }
                RecognitionEvent::Error(kind) => {
                    self.reset(id);
                    let err = Error::Recognition { kind };
                    tracing::warn!(error = %err, "speech recognition failed");
                    self.view.alert(&err.user_message());
                    return Err(err);
                }
                RecognitionEvent::End => break,
            }
        }

        if !self.owns(id) {
            return Ok(SpeechOutcome::Stopped);
        }
        self.reset(id);
        Ok(outcome)
    }

    async fn deliver(&self, text: String, mode: &SpeechMode) -> Result<SpeechOutcome> {
        match mode {
            SpeechMode::Fill(field) => {
                self.view.fill_field(field, &text);
                let submitted = field.auto_submits();
                if submitted {
                    tokio::time::sleep(self.submit_delay).await;
                    self.view.submit_field(field);
                }
                Ok(SpeechOutcome::Filled { text, submitted })
            }
            SpeechMode::Evaluate { reference } => {
                let feedback =
                    match requests::evaluate_pronunciation(&self.gateway, reference, &text).await {
                        Ok(f) => f,
                        Err(e) => {
                            self.view.alert(&e.user_message());
                            return Err(e);
                        }
                    };
                self.view.alert(&format_feedback(&feedback));
                Ok(SpeechOutcome::Evaluated { text, feedback })
            }
        }
    }

    /// Stop the engine and forget the session
    fn end_active(&self) {
        self.recognizer.stop();
        *self.lock() = None;
        self.view.render_listening(None);
    }

    fn reset(&self, id: u64) {
        let mut active = self.lock();
        if active.as_ref().is_some_and(|s| s.id == id) {
            *active = None;
            drop(active);
            self.view.render_listening(None);
        }
    }

    fn owns(&self, id: u64) -> bool {
        self.lock().as_ref().is_some_and(|s| s.id == id)
    }

    fn lock(&self) -> MutexGuard<'_, Option<Session>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Alert text for an evaluation
#[must_use]
pub fn format_feedback(feedback: &Structured<PronunciationFeedback>) -> String {
    match feedback {
        Structured::Parsed(f) => {
            let mut out = String::new();
            if let Some(score) = f.score {
                out.push_str(&format!("Score: {score}/100\n"));
            }
            out.push_str(&f.feedback);
            for m in &f.mistakes {
                out.push_str(&format!("\n- {m}"));
            }
            out
        }
        Structured::Degraded { .. } => DEGRADED_MESSAGE.to_string(),
    }
}
