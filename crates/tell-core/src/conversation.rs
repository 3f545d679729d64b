//! Replays a previous exchange so the model can continue from it.

use serde::Serialize;
use tell_types::{CommandResponse, HistoryEntry, Message};

/// Serialized field order matches what the system prompt asks the model for.
#[derive(Serialize)]
struct ReplayPayload<'a> {
    command: &'a str,
    show_details: bool,
    details: &'a str,
}

/// Builds continuation context from a previous successful entry.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConversationBuilder;

impl ConversationBuilder {
    pub fn new() -> Self {
        Self
    }

    /// The user/assistant exchange that produced `parent`.
    pub fn replay(&self, parent: &HistoryEntry) -> [Message; 2] {
        let response = CommandResponse::new(
            parent.command.as_str(),
            parent.details.as_str(),
            parent.show_details,
        );
        [
            Message::user(parent.prompt.as_str()),
            Message::assistant(serialize_response(&response)),
        ]
    }

    /// Full message sequence for a continuation request.
    pub fn continuation(&self, parent: &HistoryEntry, prompt: &str) -> Vec<Message> {
        let mut messages = Vec::with_capacity(3);
        messages.extend(self.replay(parent));
        messages.push(Message::user(prompt));
        messages
    }
}

/// Encode a response the way the model would have written it.
///
/// Never fails: if the encoder errors, falls back to a hand-built object with
/// the same three fields.
pub fn serialize_response(response: &CommandResponse) -> String {
    let payload = ReplayPayload {
        command: &response.command,
        show_details: response.show_details,
        details: &response.details,
    };
    match serde_json::to_string(&payload) {
        Ok(json) => json,
        Err(e) => {
            tracing::warn!(target: "tell::generate", "Falling back to manual response encoding: {}", e);
            manual_encode(response)
        }
    }
}

fn manual_encode(response: &CommandResponse) -> String {
    format!(
        r#"{{"command":"{}","show_details":{},"details":"{}"}}"#,
        escape(&response.command),
        response.show_details,
        escape(&response.details)
    )
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{8}' => out.push_str("\\b"),
            '\u{c}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out
}
