//! hanzi-deck - Chinese grammar-pattern flashcards with an AI tutor
//!
//! This library provides the core of the hanzi-deck learning tool:
//! - A bundled set of grammar patterns with daily picks and learned counts
//! - Tutor features (translation, chat, roleplay, corrections, scripts)
//!   served by a single remote endpoint through a retrying gateway
//! - Spoken examples with a two-tier audio cache and one-clip-at-a-time playback
//! - Speech input for chat answers and pronunciation checks
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                   Front end (CLI)                    │
//! │      render  │  View  │  Recognizer  │  AudioOutput  │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │                      Tutor                           │
//! │  patterns │ db │ conversation │ playback │ speech    │
//! └────────────────────┬────────────────────────────────┘
//!                      │
//! ┌────────────────────▼────────────────────────────────┐
//! │              ApiGateway (retry, timeout)             │
//! │          one endpoint, {"action": ..., ...}          │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod audio;
pub mod config;
pub mod conversation;
pub mod db;
pub mod error;
pub mod extract;
pub mod gateway;
pub mod patterns;
pub mod practice;
pub mod quiz;
pub mod render;
pub mod schema;
pub mod speech;
pub mod tutor;
pub mod view;

pub use audio::{AudioCache, AudioOutput, PlaybackController, PlaybackState};
pub use config::Config;
pub use conversation::Conversation;
pub use db::{DbConn, DbPool};
pub use error::{Error, RecognitionErrorKind, Result};
pub use gateway::{Action, ApiGateway, RetryPolicy, Transport};
pub use patterns::{Pattern, PatternSet};
pub use schema::Structured;
pub use speech::{Recognizer, SpeechInput, SpeechMode};
pub use tutor::Tutor;
pub use view::{ControlId, FieldId, View};
