//! System prompt construction.

use std::fmt::Write as _;
use std::path::Path;

/// Maximum number of directory entries listed in the context block.
pub const MAX_CONTEXT_ENTRIES: usize = 100;

/// User preferences that shape the system prompt.
#[derive(Debug, Clone, Default)]
pub struct PromptSettings {
    pub preferred_commands: Vec<String>,
    pub extra_instructions: Vec<String>,
    /// Target shell, when known (e.g., "zsh").
    pub shell: Option<String>,
}

const INTRO: &str = "You are TELL (Terminal English Language Liaison), an expert in Unix/Linux command line tools.
Your task is to convert natural language requests into shell commands.

";

const FORMATTING: &str = r"Command formatting guidelines:
- Use backslashes (\) to break long commands into multiple lines for readability
- Include proper quoting for filenames and variables
- Prefer safe commands that won't accidentally destroy data
- Use modern alternatives to legacy commands when appropriate

";

const OUTPUT_FORMAT: &str = r#"Respond with only a JSON object of this exact shape:
{"command": "<the exact command to run>", "show_details": <true or false>, "details": "<brief explanation>"}
- "command" must be non-empty and contain nothing but the command
- Set "show_details" to true when the explanation contains something the user should read before running the command
- Do not wrap the object in prose or code fences
"#;

/// Build the system prompt sent ahead of every request.
pub fn build_system_prompt(settings: &PromptSettings, directory_context: Option<&str>) -> String {
    let mut out = String::from(INTRO);

    if let Some(shell) = settings.shell.as_deref().filter(|s| !s.is_empty()) {
        let _ = writeln!(out, "Target shell: {shell}\n");
    }

    if !settings.preferred_commands.is_empty() {
        let _ = writeln!(
            out,
            "Preferred commands: {}\n",
            settings.preferred_commands.join(", ")
        );
    }

    if !settings.extra_instructions.is_empty() {
        out.push_str("Additional guidelines:\n");
        for instruction in &settings.extra_instructions {
            let _ = writeln!(out, "- {instruction}");
        }
        out.push('\n');
    }

    out.push_str(FORMATTING);

    if let Some(context) = directory_context {
        out.push_str("Current directory context:\n");
        out.push_str(context);
        out.push('\n');
    }

    out.push_str(OUTPUT_FORMAT);
    out
}

/// Describe a directory: its path and a sorted, capped listing.
pub fn gather_directory_context(dir: &Path) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Current directory: {}", dir.display());

    let mut entries: Vec<_> = match std::fs::read_dir(dir) {
        Ok(rd) => rd.filter_map(|e| e.ok()).collect(),
        Err(e) => {
            tracing::debug!(target: "tell::generate", "Could not list {}: {}", dir.display(), e);
            return out;
        }
    };
    entries.sort_by_key(|e| e.file_name());

    out.push_str("Directory contents:\n");
    for entry in entries.iter().take(MAX_CONTEXT_ENTRIES) {
        let name = entry.file_name();
        let name = name.to_string_lossy();
        match entry.metadata() {
            Ok(meta) => {
                let kind = if meta.is_dir() { "dir" } else { "file" };
                let _ = writeln!(out, "- {} ({}, {} bytes)", name, kind, meta.len());
            }
            Err(_) => {
                let _ = writeln!(out, "- {name}");
            }
        }
    }
    if entries.len() > MAX_CONTEXT_ENTRIES {
        let _ = writeln!(
            out,
            "- ... and {} more",
            entries.len() - MAX_CONTEXT_ENTRIES
        );
    }
    out
}
