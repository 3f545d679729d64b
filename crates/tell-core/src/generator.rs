//! End-to-end generation: optional parent lookup, one LLM call, strict
//! parsing, and a history write.
//!
//! Failures after the parent lookup are still recorded in history before
//! they are returned. A failed history write is logged and never changes the
//! outcome of the generation.

use crate::conversation::ConversationBuilder;
use crate::history::HistoryStore;
use crate::llm::LlmClient;
use crate::parser::ResponseParser;
use crate::prompt::{build_system_prompt, gather_directory_context, PromptSettings};
use crate::{Result, TellError};
use std::path::PathBuf;
use tell_types::{CommandResponse, HistoryEntry, LlmUsage, Message};

/// Per-call switches.
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    /// Continue from the most recent successful history entry.
    pub continue_last: bool,
    /// Describe this directory to the model.
    pub context_dir: Option<PathBuf>,
}

/// Outcome of a successful generation.
#[derive(Debug, Clone)]
pub struct Generation {
    pub response: CommandResponse,
    pub usage: LlmUsage,
    /// Entry this generation continued from.
    pub parent: Option<HistoryEntry>,
    /// Id of the recorded entry, if the history write succeeded.
    pub history_id: Option<i64>,
}

/// Coordinates a single generation attempt.
pub struct Generator<'a, C> {
    client: C,
    store: Option<&'a HistoryStore>,
    settings: PromptSettings,
    parser: ResponseParser,
    conversation: ConversationBuilder,
}

impl<'a, C: LlmClient> Generator<'a, C> {
    /// `store` may be absent when the history database could not be opened;
    /// generation still works but nothing is recorded.
    pub fn new(client: C, store: Option<&'a HistoryStore>, settings: PromptSettings) -> Self {
        Self {
            client,
            store,
            settings,
            parser: ResponseParser::new(),
            conversation: ConversationBuilder::new(),
        }
    }

    pub fn generate(&self, prompt: &str, options: &GenerateOptions) -> Result<Generation> {
        validate_prompt(prompt)?;
        let parent = self.resolve_parent(options)?;
        self.generate_from(prompt, parent, options)
    }

    /// The entry a generation with these options continues from, if any.
    /// Fails when continuing is requested but no parent can be found.
    pub fn resolve_parent(&self, options: &GenerateOptions) -> Result<Option<HistoryEntry>> {
        if !options.continue_last {
            return Ok(None);
        }
        let store = self.store.ok_or_else(|| {
            TellError::StorageUnavailable("cannot continue without command history".into())
        })?;
        let parent = store.most_recent_successful()?;
        debug_assert!(parent.is_successful());
        Ok(Some(parent))
    }

    /// Generate with an already resolved parent. `options.continue_last` is
    /// ignored here.
    pub fn generate_from(
        &self,
        prompt: &str,
        parent: Option<HistoryEntry>,
        options: &GenerateOptions,
    ) -> Result<Generation> {
        validate_prompt(prompt)?;
        let parent_id = parent.as_ref().map(|p| p.id);

        let messages = match &parent {
            Some(p) => {
                tracing::debug!(target: "tell::generate", "Continuing from entry {}", p.id);
                self.conversation.continuation(p, prompt)
            }
            None => vec![Message::user(prompt)],
        };

        let context = options.context_dir.as_deref().map(gather_directory_context);
        let system_prompt = build_system_prompt(&self.settings, context.as_deref());

        let reply = match self.client.send(&system_prompt, &messages) {
            Ok(reply) => reply,
            Err(err) => {
                tracing::debug!(target: "tell::generate", "{}", err);
                self.record(prompt, None, None, Some(&err.to_string()), parent_id);
                return Err(err);
            }
        };

        let response = match self.parser.parse(&reply.text) {
            Ok(response) => response,
            Err(parse_err) => {
                let err = TellError::from(parse_err);
                tracing::debug!(target: "tell::generate", "{}", err);
                self.record(
                    prompt,
                    None,
                    Some(&reply.usage),
                    Some(&err.to_string()),
                    parent_id,
                );
                return Err(err);
            }
        };

        let history_id = self.record(prompt, Some(&response), Some(&reply.usage), None, parent_id);

        Ok(Generation {
            response,
            usage: reply.usage,
            parent,
            history_id,
        })
    }

    /// Best-effort history write.
    fn record(
        &self,
        prompt: &str,
        response: Option<&CommandResponse>,
        usage: Option<&LlmUsage>,
        error_message: Option<&str>,
        parent_id: Option<i64>,
    ) -> Option<i64> {
        let store = self.store?;
        match store.add(prompt, response, usage, error_message, parent_id) {
            Ok(id) => Some(id),
            Err(e) => {
                tracing::warn!(target: "tell::history", "Failed to save to history: {}", e);
                None
            }
        }
    }
}

fn validate_prompt(prompt: &str) -> Result<()> {
    if prompt.trim().is_empty() {
        return Err(TellError::InvalidArgument("prompt cannot be empty".into()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ErrorKind, ParseError};
    use crate::history::{HistoryFilter, StoreOptions};
    use crate::llm::LlmReply;
    use std::cell::RefCell;
    use std::collections::VecDeque;
    use tempfile::TempDir;

    enum Step {
        Reply(&'static str),
        Fail(&'static str),
    }

    /// Replays canned replies and records what it was sent.
    struct ScriptedClient {
        steps: RefCell<VecDeque<Step>>,
        calls: RefCell<Vec<(String, Vec<Message>)>>,
    }

    impl ScriptedClient {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: RefCell::new(steps.into()),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl LlmClient for ScriptedClient {
        fn send(&self, system_prompt: &str, messages: &[Message]) -> Result<LlmReply> {
            self.calls
                .borrow_mut()
                .push((system_prompt.to_string(), messages.to_vec()));
            match self.steps.borrow_mut().pop_front() {
                Some(Step::Reply(text)) => Ok(LlmReply {
                    text: text.to_string(),
                    usage: LlmUsage {
                        model: "claude-3-haiku-20240307".to_string(),
                        input_tokens: 100,
                        output_tokens: 30,
                    },
                }),
                Some(Step::Fail(msg)) => Err(TellError::upstream(msg)),
                None => panic!("unexpected LLM call"),
            }
        }
    }

    const DU_REPLY: &str = r#"Here you go: {"command": "du -h | sort -hr", "show_details": true, "details": "sorts by size descending"}"#;

    #[test]
    fn test_generate_success_is_recorded() {
        let store = HistoryStore::open_in_memory().unwrap();
        let client = ScriptedClient::new(vec![Step::Reply(DU_REPLY)]);
        let generator = Generator::new(&client, Some(&store), PromptSettings::default());

        let generation = generator
            .generate("list files by size", &GenerateOptions::default())
            .unwrap();
        assert_eq!(generation.response.command, "du -h | sort -hr");
        assert!(generation.response.show_details);
        assert_eq!(generation.usage.input_tokens, 100);
        assert!(generation.parent.is_none());

        let id = generation.history_id.unwrap();
        let recent = store.most_recent_successful().unwrap();
        assert_eq!(recent.id, id);
        assert_eq!(recent.prompt, "list files by size");
        assert_eq!(recent.output_tokens, 30);

        let calls = client.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, vec![Message::user("list files by size")]);
    }

    #[test]
    fn test_parse_failure_is_recorded_with_usage() {
        let store = HistoryStore::open_in_memory().unwrap();
        let client = ScriptedClient::new(vec![Step::Reply("ls -la\n\nLists everything")]);
        let generator = Generator::new(&client, Some(&store), PromptSettings::default());

        let err = generator
            .generate("list everything", &GenerateOptions::default())
            .unwrap_err();
        assert!(matches!(err, TellError::Parse(ParseError::NoJsonObject)));

        let entries = store.list(&HistoryFilter::default()).unwrap();
        assert_eq!(entries.len(), 1);
        let entry = &entries[0];
        assert_eq!(entry.command, "");
        assert_eq!(entry.input_tokens, 100);
        assert_eq!(entry.error_message.as_deref(), Some(err.to_string().as_str()));
    }

    #[test]
    fn test_upstream_failure_is_recorded_without_usage() {
        let store = HistoryStore::open_in_memory().unwrap();
        let client = ScriptedClient::new(vec![Step::Fail("API request failed with status 529")]);
        let generator = Generator::new(&client, Some(&store), PromptSettings::default());

        let err = generator
            .generate("anything", &GenerateOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Upstream);

        let entries = store.list(&HistoryFilter::default()).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].model, "");
        assert_eq!(entries[0].input_tokens, 0);
        assert!(entries[0].is_failed());
    }

    #[test]
    fn test_continuation_replays_parent() {
        let store = HistoryStore::open_in_memory().unwrap();
        let client = ScriptedClient::new(vec![
            Step::Reply(DU_REPLY),
            Step::Reply(r#"{"command": "du -h ~/docs | sort -hr", "details": ""}"#),
        ]);
        let generator = Generator::new(&client, Some(&store), PromptSettings::default());

        let first = generator
            .generate("list files by size", &GenerateOptions::default())
            .unwrap();
        let options = GenerateOptions {
            continue_last: true,
            ..Default::default()
        };
        let second = generator.generate("only in docs", &options).unwrap();

        let parent = second.parent.unwrap();
        assert_eq!(Some(parent.id), first.history_id);
        let child = store.get(second.history_id.unwrap()).unwrap();
        assert_eq!(child.parent_id, first.history_id);

        let calls = client.calls.borrow();
        let messages = &calls[1].1;
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], Message::user("list files by size"));
        assert!(messages[1].content.contains(r#""command":"du -h | sort -hr""#));
        assert_eq!(messages[2], Message::user("only in docs"));
    }

    #[test]
    fn test_continuation_skips_failed_entries() {
        let store = HistoryStore::open_in_memory().unwrap();
        let good = CommandResponse::new("ls", "", false);
        let good_id = store.add("list", Some(&good), None, None, None).unwrap();
        store.add("broken", None, None, Some("boom"), None).unwrap();

        let client = ScriptedClient::new(vec![Step::Reply(r#"{"command": "ls -a"}"#)]);
        let generator = Generator::new(&client, Some(&store), PromptSettings::default());
        let options = GenerateOptions {
            continue_last: true,
            ..Default::default()
        };
        let generation = generator.generate("include hidden", &options).unwrap();
        assert_eq!(generation.parent.unwrap().id, good_id);
    }

    #[test]
    fn test_continuation_without_parent_aborts_before_call() {
        let store = HistoryStore::open_in_memory().unwrap();
        let client = ScriptedClient::new(vec![]);
        let generator = Generator::new(&client, Some(&store), PromptSettings::default());
        let options = GenerateOptions {
            continue_last: true,
            ..Default::default()
        };

        let err = generator.generate("more", &options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert!(client.calls.borrow().is_empty());
        assert_eq!(store.count().unwrap(), 0);
    }

    #[test]
    fn test_continuation_without_store() {
        let client = ScriptedClient::new(vec![]);
        let generator = Generator::new(&client, None, PromptSettings::default());
        let options = GenerateOptions {
            continue_last: true,
            ..Default::default()
        };
        let err = generator.generate("more", &options).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Storage);
        assert!(client.calls.borrow().is_empty());
    }

    #[test]
    fn test_generate_without_store() {
        let client = ScriptedClient::new(vec![Step::Reply(DU_REPLY)]);
        let generator = Generator::new(&client, None, PromptSettings::default());
        let generation = generator
            .generate("list files by size", &GenerateOptions::default())
            .unwrap();
        assert_eq!(generation.response.command, "du -h | sort -hr");
        assert_eq!(generation.history_id, None);
    }

    #[test]
    fn test_history_write_failure_does_not_fail_generation() {
        let dir = TempDir::new().unwrap();
        let db_path = dir.path().join("tell.db");
        let store = HistoryStore::open(&db_path, &StoreOptions::default()).unwrap();
        rusqlite::Connection::open(&db_path)
            .unwrap()
            .execute_batch("DROP TABLE command_history;")
            .unwrap();

        let client = ScriptedClient::new(vec![Step::Reply(DU_REPLY), Step::Fail("down")]);
        let generator = Generator::new(&client, Some(&store), PromptSettings::default());

        let generation = generator
            .generate("list files by size", &GenerateOptions::default())
            .unwrap();
        assert_eq!(generation.response.command, "du -h | sort -hr");
        assert_eq!(generation.history_id, None);

        // The upstream error is surfaced, not the storage error
        let err = generator
            .generate("again", &GenerateOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Upstream);
    }

    #[test]
    fn test_resolve_parent_then_generate_from() {
        let store = HistoryStore::open_in_memory().unwrap();
        let good = CommandResponse::new("fd -e pdf", "", false);
        let parent_id = store.add("find pdfs", Some(&good), None, None, None).unwrap();

        let client = ScriptedClient::new(vec![Step::Fail("overloaded")]);
        let generator = Generator::new(&client, Some(&store), PromptSettings::default());
        let options = GenerateOptions {
            continue_last: true,
            ..Default::default()
        };

        // The parent is known before the LLM is called
        let parent = generator.resolve_parent(&options).unwrap().unwrap();
        assert_eq!(parent.id, parent_id);
        assert!(client.calls.borrow().is_empty());

        let err = generator
            .generate_from("only in docs", Some(parent), &options)
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Upstream);
        assert_eq!(client.calls.borrow()[0].1.len(), 3);

        let failed = store.list(&HistoryFilter::default()).unwrap();
        assert_eq!(failed[0].parent_id, Some(parent_id));
        assert!(failed[0].is_failed());
    }

    #[test]
    fn test_resolve_parent_without_continue() {
        let store = HistoryStore::open_in_memory().unwrap();
        let client = ScriptedClient::new(vec![]);
        let generator = Generator::new(&client, Some(&store), PromptSettings::default());
        assert!(generator
            .resolve_parent(&GenerateOptions::default())
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_empty_prompt_rejected() {
        let client = ScriptedClient::new(vec![]);
        let generator = Generator::new(&client, None, PromptSettings::default());
        let err = generator
            .generate("   ", &GenerateOptions::default())
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn test_context_dir_reaches_system_prompt() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("report.pdf"), "x").unwrap();

        let client = ScriptedClient::new(vec![Step::Reply(r#"{"command": "ls *.pdf"}"#)]);
        let generator = Generator::new(&client, None, PromptSettings::default());
        let options = GenerateOptions {
            context_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        };
        generator.generate("list pdfs", &options).unwrap();

        let calls = client.calls.borrow();
        assert!(calls[0].0.contains("- report.pdf (file, 1 bytes)"));
    }
}
