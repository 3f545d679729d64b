//! Error types for tell.

use thiserror::Error;

/// Failure category, for callers that branch on what went wrong.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Parse,
    Storage,
    NotFound,
    InvalidArgument,
    Upstream,
}

/// Why model output could not be turned into a command.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("no JSON object found in model response")]
    NoJsonObject,

    #[error("invalid JSON in model response: {0}")]
    InvalidJson(#[source] serde_json::Error),

    #[error("model response has no command")]
    MissingCommand,
}

#[derive(Error, Debug)]
pub enum TellError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Database error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("History unavailable: {0}")]
    StorageUnavailable(String),

    #[error("No history entry found with ID {0}")]
    EntryNotFound(i64),

    #[error("No previous successful command found")]
    NoSuccessfulEntry,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("LLM request failed: {message}")]
    Upstream {
        message: String,
        #[source]
        source: Option<reqwest::Error>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TellError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            TellError::Parse(_) | TellError::Json(_) => ErrorKind::Parse,
            TellError::Storage(_) | TellError::StorageUnavailable(_) | TellError::Io(_) => {
                ErrorKind::Storage
            }
            TellError::EntryNotFound(_) | TellError::NoSuccessfulEntry => ErrorKind::NotFound,
            TellError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            TellError::Upstream { .. } => ErrorKind::Upstream,
        }
    }

    /// Upstream failure with no underlying transport error.
    pub fn upstream(message: impl Into<String>) -> Self {
        TellError::Upstream {
            message: message.into(),
            source: None,
        }
    }
}

impl From<reqwest::Error> for TellError {
    fn from(err: reqwest::Error) -> Self {
        TellError::Upstream {
            message: err.to_string(),
            source: Some(err),
        }
    }
}
