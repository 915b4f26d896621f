//! Feature requests to the tutor API
//!
//! Each function builds the payload for one action, sends it through the
//! gateway and reads the reply into its schema. Unreadable replies come back
//! as [`Structured::Degraded`]; only transport failures are errors.

use serde::de::DeserializeOwned;
use serde_json::{Value, json};

use crate::conversation::ApiTurn;
use crate::gateway::{Action, ApiGateway, response_text};
use crate::patterns::Pattern;
use crate::schema::{
    CharacterInfo, PracticeProblem, PronunciationFeedback, ReplySuggestions, Script, Structured,
    Translation, Validate, WritingCorrection, WritingTopic, parse_structured,
};
use crate::Result;

/// Reply used when a chat answer has no readable text
pub const CHAT_FALLBACK: &str = "抱歉，我没听清楚。Sorry, I didn't catch that. Could you say it again?";

async fn ask<T>(gateway: &ApiGateway, action: Action, payload: Value) -> Result<Structured<T>>
where
    T: DeserializeOwned + Validate,
{
    let response = gateway.call(action, payload).await?;
    Ok(match response_text(&response) {
        Some(text) => parse_structured(&text),
        None => {
            tracing::warn!(%action, "reply carried no text");
            Structured::Degraded {
                reason: "reply has no text".to_string(),
                raw: response.to_string(),
            }
        }
    })
}

async fn ask_text(gateway: &ApiGateway, action: Action, payload: Value) -> Result<String> {
    let response = gateway.call(action, payload).await?;
    Ok(response_text(&response)
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| {
            tracing::warn!(%action, "reply carried no text, using fallback");
            CHAT_FALLBACK.to_string()
        }))
}

/// Translate between Chinese and English
///
/// # Errors
///
/// Returns the gateway error when the request fails
pub async fn translate(gateway: &ApiGateway, text: &str) -> Result<Structured<Translation>> {
    ask(gateway, Action::Translate, json!({ "text": text })).await
}

/// Send one chat turn and return the tutor's reply
///
/// # Errors
///
/// Returns the gateway error when the request fails
pub async fn chat(
    gateway: &ApiGateway,
    history: &[ApiTurn],
    message: &str,
    context: Option<&str>,
) -> Result<String> {
    let payload = json!({ "history": history, "message": message, "context": context });
    ask_text(gateway, Action::Chat, payload).await
}

/// Open a chat focused on a pattern
///
/// # Errors
///
/// Returns the gateway error when the request fails
pub async fn start_chat_with_pattern(gateway: &ApiGateway, pattern: &Pattern) -> Result<String> {
    let payload = json!({
        "pattern": pattern.pattern,
        "meaning": pattern.meaning,
        "structure": pattern.structure,
    });
    ask_text(gateway, Action::StartChatWithPattern, payload).await
}

/// Open a roleplay for a scenario
///
/// # Errors
///
/// Returns the gateway error when the request fails
pub async fn start_roleplay(gateway: &ApiGateway, scenario: &str) -> Result<String> {
    ask_text(gateway, Action::StartRoleplay, json!({ "scenario": scenario })).await
}

/// Suggest what the learner could say next
///
/// # Errors
///
/// Returns the gateway error when the request fails
pub async fn suggest_reply(
    gateway: &ApiGateway,
    history: &[ApiTurn],
    context: Option<&str>,
) -> Result<Structured<ReplySuggestions>> {
    let payload = json!({ "history": history, "context": context });
    ask(gateway, Action::SuggestReply, payload).await
}

/// Generate a practice problem, avoiding questions already asked
///
/// # Errors
///
/// Returns the gateway error when the request fails
pub async fn generate_practice(
    gateway: &ApiGateway,
    pattern: &Pattern,
    asked: &[String],
) -> Result<Structured<PracticeProblem>> {
    let payload = json!({
        "pattern": pattern.pattern,
        "meaning": pattern.meaning,
        "structure": pattern.structure,
        "previous": asked,
    });
    ask(gateway, Action::GeneratePractice, payload).await
}

/// Correct a piece of learner writing
///
/// # Errors
///
/// Returns the gateway error when the request fails
pub async fn correct_writing(
    gateway: &ApiGateway,
    text: &str,
) -> Result<Structured<WritingCorrection>> {
    ask(gateway, Action::CorrectWriting, json!({ "text": text })).await
}

/// Suggest a writing topic, optionally built around a pattern
///
/// # Errors
///
/// Returns the gateway error when the request fails
pub async fn get_writing_topic(
    gateway: &ApiGateway,
    pattern: Option<&str>,
) -> Result<Structured<WritingTopic>> {
    ask(gateway, Action::GetWritingTopic, json!({ "pattern": pattern })).await
}

/// Explain a single character
///
/// # Errors
///
/// Returns the gateway error when the request fails
pub async fn get_character_info(
    gateway: &ApiGateway,
    character: &str,
) -> Result<Structured<CharacterInfo>> {
    ask(gateway, Action::GetCharacterInfo, json!({ "character": character })).await
}

/// Grade a spoken attempt against the reference sentence
///
/// # Errors
///
/// Returns the gateway error when the request fails
pub async fn evaluate_pronunciation(
    gateway: &ApiGateway,
    reference: &str,
    spoken: &str,
) -> Result<Structured<PronunciationFeedback>> {
    let payload = json!({ "original": reference, "spoken": spoken });
    ask(gateway, Action::EvaluatePronunciation, payload).await
}

/// Listening dialogue built around a pattern
///
/// # Errors
///
/// Returns the gateway error when the request fails
pub async fn generate_conversation_script(
    gateway: &ApiGateway,
    pattern: &Pattern,
) -> Result<Structured<Script>> {
    let payload = json!({ "pattern": pattern.pattern, "meaning": pattern.meaning });
    ask(gateway, Action::GenerateConversationScript, payload).await
}

/// Listening dialogue for an everyday situation
///
/// # Errors
///
/// Returns the gateway error when the request fails
pub async fn generate_situational_script(
    gateway: &ApiGateway,
    scenario: &str,
) -> Result<Structured<Script>> {
    ask(gateway, Action::GenerateSituationalScript, json!({ "scenario": scenario })).await
}
