//! LLM transport.
//!
//! [`LlmClient`] is the seam the generator talks to; [`AnthropicClient`] is
//! the production implementation against the Anthropic Messages API.

use crate::{Result, TellError};
use serde::{Deserialize, Serialize};
use std::fmt;
use tell_types::{LlmUsage, Message};

const ANTHROPIC_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Raw model reply: concatenated text content plus usage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LlmReply {
    pub text: String,
    pub usage: LlmUsage,
}

/// Sends a system prompt and message sequence to a model.
pub trait LlmClient {
    fn send(&self, system_prompt: &str, messages: &[Message]) -> Result<LlmReply>;
}

impl<C: LlmClient + ?Sized> LlmClient for &C {
    fn send(&self, system_prompt: &str, messages: &[Message]) -> Result<LlmReply> {
        (**self).send(system_prompt, messages)
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    system: &'a str,
    messages: &'a [Message],
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    usage: Usage,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u64,
    #[serde(default)]
    output_tokens: u64,
}

/// Blocking client for the Anthropic Messages API.
pub struct AnthropicClient {
    http: reqwest::blocking::Client,
    api_key: String,
    model: String,
    max_tokens: u32,
}

// Keep the API key out of debug output
impl fmt::Debug for AnthropicClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnthropicClient")
            .field("api_key", &"[REDACTED]")
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .finish()
    }
}

impl AnthropicClient {
    /// Create a client. Fails if no API key is configured.
    pub fn new(api_key: &str, model: &str, max_tokens: u32) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(TellError::InvalidArgument(
                "Anthropic API key not set. Add anthropic_api_key to the config or set ANTHROPIC_API_KEY".into(),
            ));
        }
        let http = reqwest::blocking::Client::builder()
            .user_agent(concat!("tell/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.trim().to_string(),
            model: model.to_string(),
            max_tokens,
        })
    }
}

impl LlmClient for AnthropicClient {
    fn send(&self, system_prompt: &str, messages: &[Message]) -> Result<LlmReply> {
        let request = MessagesRequest {
            model: &self.model,
            system: system_prompt,
            messages,
            max_tokens: self.max_tokens,
        };

        tracing::debug!(
            target: "tell::llm",
            "Sending request (model: {}, messages: {})",
            self.model,
            messages.len()
        );

        let resp = self
            .http
            .post(ANTHROPIC_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&request)
            .send()
            .map_err(|e| TellError::Upstream {
                message: format!("could not reach {}: {}", ANTHROPIC_URL, e),
                source: Some(e),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().unwrap_or_default();
            return Err(TellError::upstream(format!(
                "API request failed with status {}: {}",
                status.as_u16(),
                body.trim()
            )));
        }

        let body: MessagesResponse = resp
            .json()
            .map_err(|e| TellError::Upstream {
                message: format!("failed to decode response: {e}"),
                source: Some(e),
            })?;

        into_reply(body, &self.model)
    }
}

fn into_reply(body: MessagesResponse, requested_model: &str) -> Result<LlmReply> {
    let text: String = body
        .content
        .iter()
        .filter(|block| block.kind.is_empty() || block.kind == "text")
        .filter_map(|block| block.text.as_deref())
        .collect();

    if text.is_empty() {
        return Err(TellError::upstream("empty response from API"));
    }

    let usage = LlmUsage {
        model: body.model.unwrap_or_else(|| requested_model.to_string()),
        input_tokens: body.usage.input_tokens,
        output_tokens: body.usage.output_tokens,
    };

    tracing::debug!(
        target: "tell::llm",
        "Received response (input tokens: {}, output tokens: {})",
        usage.input_tokens,
        usage.output_tokens
    );

    Ok(LlmReply { text, usage })
}
