//! Structured model output and usage accounting.

use serde::{Deserialize, Serialize};

/// A shell command produced by the model, with its explanation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResponse {
    /// The command to run. Never empty once parsed.
    pub command: String,
    /// Whether the model thinks `details` is worth showing.
    #[serde(default)]
    pub show_details: bool,
    /// Free-text explanation of the command.
    #[serde(default)]
    pub details: String,
}

impl CommandResponse {
    pub fn new(command: impl Into<String>, details: impl Into<String>, show_details: bool) -> Self {
        Self {
            command: command.into(),
            show_details,
            details: details.into(),
        }
    }
}

/// Token usage reported by the provider for one call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmUsage {
    /// Model that served the request (e.g., "claude-3-haiku-20240307").
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
}
