//! Error types for hanzi-deck

use thiserror::Error;

/// Result type alias for hanzi-deck operations
pub type Result<T> = std::result::Result<T, Error>;

/// Reason a speech recognition session failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionErrorKind {
    /// Microphone permission was denied
    NotAllowed,
    /// No speech was heard before the engine gave up
    NoSpeech,
    /// Audio capture device failed or is missing
    AudioCapture,
    /// Recognition service could not be reached
    Network,
    /// Session was aborted by the engine
    Aborted,
    /// Any other engine-reported failure
    Other,
}

impl RecognitionErrorKind {
    /// Parse an engine-reported error code
    #[must_use]
    pub fn from_code(code: &str) -> Self {
        match code {
            "not-allowed" | "service-not-allowed" => Self::NotAllowed,
            "no-speech" => Self::NoSpeech,
            "audio-capture" => Self::AudioCapture,
            "network" => Self::Network,
            "aborted" => Self::Aborted,
            _ => Self::Other,
        }
    }

    /// Message shown to the user for this failure
    #[must_use]
    pub const fn user_message(self) -> &'static str {
        match self {
            Self::NotAllowed => {
                "Microphone access was denied. Allow microphone access and try again."
            }
            Self::NoSpeech => "No speech was detected. Please try again.",
            Self::AudioCapture => "No microphone was found.",
            Self::Network => "Speech recognition needs a network connection.",
            Self::Aborted => "Speech recognition was interrupted.",
            Self::Other => "Speech recognition failed.",
        }
    }
}

impl std::fmt::Display for RecognitionErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let code = match self {
            Self::NotAllowed => "not-allowed",
            Self::NoSpeech => "no-speech",
            Self::AudioCapture => "audio-capture",
            Self::Network => "network",
            Self::Aborted => "aborted",
            Self::Other => "other",
        };
        f.write_str(code)
    }
}

/// Errors that can occur in hanzi-deck
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Tutor API did not answer within the request timeout
    #[error("request timed out")]
    Timeout,

    /// Tutor API answered with a failure status
    #[error("server error {status}: {message}")]
    Server {
        /// HTTP status code
        status: u16,
        /// Message supplied by the server
        message: String,
    },

    /// Tutor API could not be reached
    #[error("network error: {0}")]
    Network(String),

    /// Response text did not contain the expected structure
    #[error("parse error: {0}")]
    Parse(String),

    /// Audio could not be decoded or played
    #[error("playback error: {0}")]
    Playback(String),

    /// Playback was stopped before it finished
    #[error("playback stopped")]
    PlaybackStopped,

    /// Speech recognition failed
    #[error("recognition error: {kind}")]
    Recognition {
        /// Classified engine failure
        kind: RecognitionErrorKind,
    },

    /// Pattern not found in the bundled dataset
    #[error("pattern not found: {0}")]
    PatternNotFound(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Database error
    #[error("database error: {0}")]
    Database(String),

    /// `SQLite` error
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

impl Error {
    /// Whether a failed tutor call may succeed if sent again
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Network(_) | Self::Http(_) => true,
            Self::Server { status, .. } => crate::gateway::is_retryable_status(*status),
            _ => false,
        }
    }

    /// Whether this error came from an explicit playback stop
    ///
    /// Sequential playback treats this as a normal way to end.
    #[must_use]
    pub const fn is_stopped(&self) -> bool {
        matches!(self, Self::PlaybackStopped)
    }

    /// Message suitable for showing to the user
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::Timeout => "The tutor took too long to answer. Please try again.".to_string(),
            Self::Server { message, .. } => format!("The tutor reported an error: {message}"),
            Self::Network(_) | Self::Http(_) => {
                "Could not reach the tutor. Check your connection.".to_string()
            }
            Self::Recognition { kind } => kind.user_message().to_string(),
            Self::Playback(msg) => format!("Could not play audio: {msg}"),
            other => other.to_string(),
        }
    }
}
