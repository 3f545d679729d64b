//! Terminal rendering for generations and history entries.

use std::fmt::Write as _;
use tell_types::{CommandResponse, HistoryEntry};

const SEPARATOR_WIDTH: usize = 80;

/// How a generated command is printed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(format!("Invalid output format: '{}'. Use 'text' or 'json'.", s)),
        }
    }
}

/// Render a generated command for stdout.
pub fn response(resp: &CommandResponse, format: OutputFormat, no_explain: bool) -> serde_json::Result<String> {
    match format {
        OutputFormat::Json => serde_json::to_string(resp),
        OutputFormat::Text => {
            let mut out = resp.command.clone();
            if !no_explain && resp.show_details && !resp.details.is_empty() {
                out.push_str("\n\n");
                out.push_str(&resp.details);
            }
            Ok(out)
        }
    }
}

/// Compact listing used by `tell history`.
pub fn history_list(entries: &[HistoryEntry]) -> String {
    if entries.is_empty() {
        return "No history entries found.".to_string();
    }

    let mut out = String::new();
    for entry in entries {
        let _ = write!(out, "[{}] {}", entry.id, entry.timestamp.format("%Y-%m-%d %H:%M:%S"));
        if entry.favorite {
            out.push_str(" ⭐");
        }
        if let Some(parent_id) = entry.parent_id {
            let _ = write!(out, " (continues from {})", parent_id);
        }
        out.push('\n');

        let _ = writeln!(out, "Prompt: {}", entry.prompt);
        match entry.error_message.as_deref().filter(|_| entry.command.is_empty()) {
            Some(error) => {
                let _ = writeln!(out, "Error: {}", error);
            }
            None => {
                let _ = writeln!(out, "Command: {}", entry.command);
            }
        }
        out.push_str(&"-".repeat(SEPARATOR_WIDTH));
        out.push('\n');
    }
    out.truncate(out.trim_end().len());
    out
}

/// Full detail view used by `tell history show`.
pub fn history_entry(entry: &HistoryEntry) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "ID: {}", entry.id);
    let _ = writeln!(out, "Time: {}", entry.timestamp.to_rfc2822());
    let _ = writeln!(out, "Favorite: {}", entry.favorite);
    if let Some(parent_id) = entry.parent_id {
        let _ = writeln!(out, "Continues from: {}", parent_id);
    }
    let _ = writeln!(out, "Model: {}", entry.model);
    let _ = writeln!(out, "Input Tokens: {}", entry.input_tokens);
    let _ = writeln!(out, "Output Tokens: {}", entry.output_tokens);
    let _ = writeln!(out, "\nPrompt: {}", entry.prompt);
    let _ = writeln!(out, "\nCommand: {}", entry.command);
    if !entry.details.is_empty() {
        let _ = writeln!(out, "\nDetails: {}", entry.details);
    }
    if let Some(error) = &entry.error_message {
        let _ = writeln!(out, "\nError: {}", error);
    }
    out.truncate(out.trim_end().len());
    out
}

/// One-line message for an error on its way to the user. Causes are joined
/// with ": ", skipping any whose text a previous layer already printed.
pub fn error_message(err: &anyhow::Error) -> String {
    let mut out = String::new();
    for cause in err.chain() {
        let text = cause.to_string();
        if text.is_empty() || out.contains(&text) {
            continue;
        }
        if !out.is_empty() {
            out.push_str(": ");
        }
        out.push_str(&text);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use tell_core::{ParseError, TellError};
    use chrono::{TimeZone, Utc};

    fn entry() -> HistoryEntry {
        HistoryEntry {
            id: 3,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap(),
            prompt: "find pdf files".to_string(),
            command: "fd -e pdf".to_string(),
            details: "recursive".to_string(),
            show_details: false,
            error_message: None,
            model: "claude-3-haiku-20240307".to_string(),
            input_tokens: 10,
            output_tokens: 4,
            favorite: true,
            parent_id: Some(1),
        }
    }

    #[test]
    fn test_response_text() {
        let resp = CommandResponse::new("du -h | sort -hr", "sorts by size", true);
        assert_eq!(
            response(&resp, OutputFormat::Text, false).unwrap(),
            "du -h | sort -hr\n\nsorts by size"
        );
        assert_eq!(response(&resp, OutputFormat::Text, true).unwrap(), "du -h | sort -hr");

        let quiet = CommandResponse::new("ls", "lists", false);
        assert_eq!(response(&quiet, OutputFormat::Text, false).unwrap(), "ls");
    }

    #[test]
    fn test_response_json() {
        let resp = CommandResponse::new("ls", "lists", false);
        let json = response(&resp, OutputFormat::Json, false).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["command"], "ls");
        assert_eq!(value["show_details"], false);
        assert_eq!(value["details"], "lists");
    }

    #[test]
    fn test_history_list() {
        let out = history_list(&[entry()]);
        assert!(out.starts_with("[3] 2024-03-01 12:30:45 ⭐ (continues from 1)\n"));
        assert!(out.contains("Prompt: find pdf files\nCommand: fd -e pdf\n"));
        assert!(out.ends_with(&"-".repeat(80)));
        assert_eq!(history_list(&[]), "No history entries found.");
    }

    #[test]
    fn test_history_list_shows_error_for_failed_entry() {
        let mut failed = entry();
        failed.command = String::new();
        failed.error_message = Some("LLM request failed: timeout".into());
        assert!(history_list(&[failed]).contains("Error: LLM request failed: timeout"));
    }

    #[test]
    fn test_history_entry() {
        let out = history_entry(&entry());
        assert!(out.starts_with("ID: 3\n"));
        assert!(out.contains("Continues from: 1\n"));
        assert!(out.contains("Input Tokens: 10\n"));
        assert!(out.ends_with("Details: recursive"));
    }

    #[test]
    fn test_error_message_parse_error_once() {
        let json_err = serde_json::from_str::<serde_json::Value>("{command: ls}").unwrap_err();
        let err = anyhow::Error::from(TellError::from(ParseError::InvalidJson(json_err)));
        let shown = error_message(&err);
        assert!(!shown.contains('\n'));
        assert_eq!(shown.matches("key must be a string").count(), 1);
        assert!(shown.starts_with("invalid JSON in model response"));
    }

    #[test]
    fn test_error_message_not_found() {
        let err = anyhow::Error::from(TellError::EntryNotFound(7));
        assert_eq!(error_message(&err), "No history entry found with ID 7");
    }

    #[test]
    fn test_error_message_keeps_context() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = anyhow::Error::from(TellError::from(io)).context("could not open history database /x/tell.db");
        assert_eq!(
            error_message(&err),
            "could not open history database /x/tell.db: IO error: denied"
        );
    }

    #[test]
    fn test_output_format_from_str() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
