//! Provider response envelope
//!
//! The tutor endpoint forwards the model provider's JSON. Generated text sits
//! in `candidates[0].content.parts[*].text`; synthesized speech in
//! `candidates[0].content.parts[*].inlineData.data`.

use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Default, Deserialize)]
struct Envelope {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    audio: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default, rename = "inlineData")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
}

fn envelope(value: &Value) -> Envelope {
    Envelope::deserialize(value).unwrap_or_default()
}

fn first_parts(env: &Envelope) -> &[Part] {
    env.candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map_or(&[][..], |c| c.parts.as_slice())
}

/// Extract the generated text from a response
///
/// Text parts of the first candidate are concatenated. A top-level `text`
/// field is accepted when no candidate text exists.
#[must_use]
pub fn response_text(value: &Value) -> Option<String> {
    let env = envelope(value);
    let text: String = first_parts(&env)
        .iter()
        .filter_map(|p| p.text.as_deref())
        .collect();

    if text.is_empty() { env.text } else { Some(text) }
}

/// Extract base64 audio from a text-to-speech response
#[must_use]
pub fn response_audio(value: &Value) -> Option<String> {
    let env = envelope(value);
    first_parts(&env)
        .iter()
        .find_map(|p| p.inline_data.as_ref().map(|d| d.data.clone()))
        .or(env.audio)
}

/// Extract the server-provided message from a failure body
///
/// Accepts `{"error": "..."}`, `{"error": {"message": "..."}}` and
/// `{"message": "..."}`; anything else is returned as trimmed text.
#[must_use]
pub fn server_message(body: &str) -> String {
    if let Ok(v) = serde_json::from_str::<Value>(body) {
        let found = match v.get("error") {
            Some(Value::String(s)) => Some(s.clone()),
            Some(err) => err.get("message").and_then(Value::as_str).map(String::from),
            None => v.get("message").and_then(Value::as_str).map(String::from),
        };
        if let Some(msg) = found {
            return msg;
        }
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        "empty response".to_string()
    } else {
        trimmed.to_string()
    }
}
