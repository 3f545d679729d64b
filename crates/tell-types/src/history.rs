//! Persisted generation history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One recorded generation attempt, successful or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Row id assigned by the store.
    pub id: i64,
    /// When the store recorded the attempt.
    pub timestamp: DateTime<Utc>,
    /// Natural-language request as typed by the user.
    pub prompt: String,
    /// Generated command. Empty when generation failed.
    pub command: String,
    pub details: String,
    pub show_details: bool,
    /// Set when generation or parsing failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub favorite: bool,
    /// Entry this one continues from. May point at a deleted row.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<i64>,
}

impl HistoryEntry {
    /// True when the attempt recorded an error, regardless of `command`.
    pub fn is_failed(&self) -> bool {
        self.error_message
            .as_deref()
            .is_some_and(|msg| !msg.is_empty())
    }

    /// True when this entry can seed a continuation.
    pub fn is_successful(&self) -> bool {
        !self.is_failed() && !self.command.is_empty()
    }
}
