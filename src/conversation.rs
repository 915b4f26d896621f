//! Chat and roleplay conversation history

use serde::Serialize;

/// Speaker of a conversation turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Model,
}

/// One entry of the conversation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Turn {
    /// Spoken turn
    Message { role: Role, text: String },
    /// Roleplay scenario seed; never sent to the API as a turn
    System { context: String },
}

/// Turn in the shape the tutor API expects
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiTurn {
    pub role: Role,
    pub parts: Vec<ApiPart>,
}

/// Text part of an [`ApiTurn`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApiPart {
    pub text: String,
}

/// Ordered conversation for one chat or roleplay session
#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<Turn>,
}

impl Conversation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh free chat
    pub fn start_chat(&mut self) {
        self.turns.clear();
    }

    /// Start a fresh roleplay seeded with a scenario
    pub fn start_roleplay(&mut self, context: impl Into<String>) {
        self.turns.clear();
        self.turns.push(Turn::System {
            context: context.into(),
        });
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::Message {
            role: Role::User,
            text: text.into(),
        });
    }

    pub fn push_model(&mut self, text: impl Into<String>) {
        self.turns.push(Turn::Message {
            role: Role::Model,
            text: text.into(),
        });
    }

    /// Drop the most recent turn if it was the user's
    ///
    /// Used when a chat request fails so the unanswered turn is not resent.
    pub fn pop_unanswered(&mut self) -> Option<String> {
        match self.turns.last() {
            Some(Turn::Message {
                role: Role::User, ..
            }) => match self.turns.pop() {
                Some(Turn::Message { text, .. }) => Some(text),
                _ => None,
            },
            _ => None,
        }
    }

    /// Every turn, including scenario markers
    #[must_use]
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Active roleplay scenario, if any
    #[must_use]
    pub fn roleplay_context(&self) -> Option<&str> {
        self.turns.iter().find_map(|t| match t {
            Turn::System { context } => Some(context.as_str()),
            Turn::Message { .. } => None,
        })
    }

    /// Turns to send to the API, scenario markers removed
    #[must_use]
    pub fn for_api(&self) -> Vec<ApiTurn> {
        self.turns
            .iter()
            .filter_map(|t| match t {
                Turn::Message { role, text } => Some(ApiTurn {
                    role: *role,
                    parts: vec![ApiPart { text: text.clone() }],
                }),
                Turn::System { .. } => None,
            })
            .collect()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
