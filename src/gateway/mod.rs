//! Tutor API gateway
//!
//! Every feature request goes through [`ApiGateway::call`], which applies the
//! per-attempt timeout and the retry policy for the action. The wire format is
//! a single JSON body `{"action": <name>, ...payload}` posted to one endpoint.

mod response;
mod retry;
mod transport;

use std::sync::Arc;

use serde_json::Value;

pub use response::{response_audio, response_text, server_message};
pub use retry::{
    Backoff, DEFAULT_BACKOFF, DEFAULT_MAX_RETRIES, DEFAULT_TIMEOUT, RetryPolicy,
    is_retryable_status,
};
pub use transport::{HttpTransport, Transport, TransportResponse};

use crate::{Error, Result};

/// Operation requested from the tutor endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Translate,
    Chat,
    StartChatWithPattern,
    StartRoleplay,
    SuggestReply,
    GeneratePractice,
    CorrectWriting,
    GetWritingTopic,
    GetCharacterInfo,
    EvaluatePronunciation,
    GenerateConversationScript,
    GenerateSituationalScript,
    TextToSpeech,
}

impl Action {
    /// Wire name of the action
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Translate => "translate",
            Self::Chat => "chat",
            Self::StartChatWithPattern => "start-chat-with-pattern",
            Self::StartRoleplay => "start-roleplay",
            Self::SuggestReply => "suggest-reply",
            Self::GeneratePractice => "generate-practice",
            Self::CorrectWriting => "correct-writing",
            Self::GetWritingTopic => "get-writing-topic",
            Self::GetCharacterInfo => "get-character-info",
            Self::EvaluatePronunciation => "evaluate-pronunciation",
            Self::GenerateConversationScript => "generate-conversation-script",
            Self::GenerateSituationalScript => "generate-situational-script",
            Self::TextToSpeech => "text-to-speech",
        }
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outbound call point for the tutor API
#[derive(Clone)]
pub struct ApiGateway {
    transport: Arc<dyn Transport>,
    policy: RetryPolicy,
}

impl ApiGateway {
    /// Create a gateway with the default retry policy
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            policy: RetryPolicy::default(),
        }
    }

    /// Replace the base retry policy
    #[must_use]
    pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Base retry policy
    #[must_use]
    pub const fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Call an action with the policy configured for it
    ///
    /// # Errors
    ///
    /// Returns [`Error::Timeout`], [`Error::Server`] or [`Error::Network`]
    /// once the retry budget is spent, or a serialization error if the
    /// successful body is not JSON
    pub async fn call(&self, action: Action, payload: Value) -> Result<Value> {
        let policy = self.policy.for_action(action);
        self.call_with(action, payload, &policy).await
    }

    /// Call an action with an explicit policy
    ///
    /// # Errors
    ///
    /// See [`ApiGateway::call`]
    pub async fn call_with(
        &self,
        action: Action,
        payload: Value,
        policy: &RetryPolicy,
    ) -> Result<Value> {
        let body = request_body(action, payload);
        let mut retries_left = policy.max_retries;
        let mut attempt = 0u32;

        loop {
            let err = match tokio::time::timeout(policy.timeout, self.transport.post(&body)).await
            {
                Ok(Ok(response)) if response.is_success() => {
                    tracing::debug!(%action, attempt, "tutor call succeeded");
                    return Ok(serde_json::from_str(&response.body)?);
                }
                Ok(Ok(response)) => Error::Server {
                    status: response.status,
                    message: server_message(&response.body),
                },
                Ok(Err(e)) => e,
                Err(_) => Error::Timeout,
            };

            if retries_left == 0 || !policy.should_retry(&err) {
                tracing::warn!(%action, attempt, error = %err, "tutor call failed");
                return Err(err);
            }

            let delay = policy.backoff.delay(attempt);
            tracing::debug!(
                %action,
                attempt,
                retries_left,
                delay_ms = delay.as_millis(),
                error = %err,
                "retrying tutor call"
            );
            tokio::time::sleep(delay).await;

            retries_left -= 1;
            attempt += 1;
        }
    }
}

/// Merge the action name into the payload object
fn request_body(action: Action, payload: Value) -> Value {
    let mut body = match payload {
        Value::Object(map) => map,
        Value::Null => serde_json::Map::new(),
        other => {
            let mut map = serde_json::Map::new();
            map.insert("payload".to_string(), other);
            map
        }
    };
    body.insert("action".to_string(), Value::String(action.as_str().to_string()));
    Value::Object(body)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn body_carries_action_and_payload() {
        let body = request_body(Action::Translate, json!({"text": "你好"}));
        assert_eq!(body, json!({"action": "translate", "text": "你好"}));
    }

    #[test]
    fn non_object_payload_is_wrapped() {
        let body = request_body(Action::Chat, json!("hi"));
        assert_eq!(body, json!({"action": "chat", "payload": "hi"}));

        let body = request_body(Action::GetWritingTopic, Value::Null);
        assert_eq!(body, json!({"action": "get-writing-topic"}));
    }

    #[test]
    fn action_names_are_kebab_case() {
        assert_eq!(Action::TextToSpeech.as_str(), "text-to-speech");
        assert_eq!(
            Action::GenerateSituationalScript.to_string(),
            "generate-situational-script"
        );
    }
}
