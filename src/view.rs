//! Presentation seam
//!
//! Controllers keep their state as plain values and project it through a
//! [`View`]. The terminal front end implements it by printing; tests record
//! the calls.

use std::fmt;

use crate::audio::PlaybackState;

/// Identifier of an on-screen control (a play button, a script line, a mic button)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ControlId(String);

impl ControlId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Identifier of line `index` under a script control
    #[must_use]
    pub fn line(script: &Self, index: usize) -> Self {
        Self(format!("{}#{index}", script.0))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ControlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Text input that speech can be written into
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldId {
    /// Chat message box
    ChatInput,
    /// Practice-problem answer box
    PracticeAnswer,
    /// Any other input
    Other(String),
}

impl FieldId {
    /// Whether filling this field should submit it automatically
    #[must_use]
    pub const fn auto_submits(&self) -> bool {
        matches!(self, Self::ChatInput | Self::PracticeAnswer)
    }
}

/// Projection of controller state onto the user interface
///
/// Every method but [`View::alert`] defaults to doing nothing.
pub trait View: Send + Sync {
    /// Playing markers changed
    fn render_playback(&self, _state: &PlaybackState) {}

    /// A "play all" control started or stopped
    fn render_script(&self, _control: &ControlId, _running: bool) {}

    /// The listening microphone button changed
    fn render_listening(&self, _active: Option<&ControlId>) {}

    /// Recognized speech should be written into a field
    fn fill_field(&self, _field: &FieldId, _text: &str) {}

    /// A field should be submitted
    fn submit_field(&self, _field: &FieldId) {}

    /// Show a message the user must see
    fn alert(&self, message: &str);
}

/// View that only logs alerts
#[derive(Debug, Default, Clone, Copy)]
pub struct LogView;

impl View for LogView {
    fn alert(&self, message: &str) {
        tracing::warn!(message, "alert");
    }
}
