//! Parser for the structured command output the model is asked to produce.
//!
//! The model answers with a JSON object, possibly wrapped in prose or a code
//! fence. The payload is the span from the first `{` to the last `}`; it must
//! decode as an object with a non-empty `command`. There is no fallback: text
//! that does not meet the contract is rejected rather than guessed at.

use crate::error::ParseError;
use serde::Deserialize;
use tell_types::CommandResponse;

/// Wire shape of the payload. Optional keys are defaulted.
#[derive(Debug, Deserialize)]
struct RawResponse {
    #[serde(default)]
    command: Option<String>,
    #[serde(default)]
    details: Option<String>,
    #[serde(default)]
    show_details: Option<bool>,
}

/// Extracts a `CommandResponse` from raw model text.
#[derive(Debug, Default, Clone, Copy)]
pub struct ResponseParser;

impl ResponseParser {
    pub fn new() -> Self {
        Self
    }

    /// Parse model output into a validated response.
    pub fn parse(&self, text: &str) -> Result<CommandResponse, ParseError> {
        let payload = extract_json_object(text).ok_or(ParseError::NoJsonObject)?;

        let raw: RawResponse = serde_json::from_str(payload).map_err(|e| {
            tracing::debug!(target: "tell::parser", "Rejected payload: {}", payload);
            ParseError::InvalidJson(e)
        })?;

        let command = raw.command.unwrap_or_default();
        if command.trim().is_empty() {
            return Err(ParseError::MissingCommand);
        }

        Ok(CommandResponse {
            command,
            show_details: raw.show_details.unwrap_or(false),
            details: raw.details.unwrap_or_default(),
        })
    }
}

/// Slice from the first `{` to the last `}` inclusive, if both exist in order.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&text[start..=end])
}
