//! Core generation and history logic for tell.

mod conversation;
mod error;
mod generator;
mod history;
mod llm;
mod parser;
mod prompt;

pub use conversation::{serialize_response, ConversationBuilder};
pub use error::{ErrorKind, ParseError, TellError};
pub use generator::{GenerateOptions, Generation, Generator};
pub use history::{HistoryFilter, HistoryStore, StoreOptions};
pub use llm::{AnthropicClient, LlmClient, LlmReply};
pub use parser::ResponseParser;
pub use prompt::{build_system_prompt, gather_directory_context, PromptSettings, MAX_CONTEXT_ENTRIES};

/// Result type for tell operations.
pub type Result<T> = std::result::Result<T, TellError>;
