//! Language-model boundary and an OpenAI-compatible chat-completions client.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use regsearch_core::config::LlmSettings;
use regsearch_core::error::Error;

use crate::messages::{Message, Role, ToolCall};
use crate::tools::ToolSchema;

/// `generate(messages, tools) -> message`; the reply may request tool calls.
pub trait ChatModel: Send + Sync {
    fn generate(&self, messages: &[Message], tools: &[ToolSchema]) -> Result<Message>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireFunction {
    pub name: String,
    /// JSON-encoded argument object.
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_type")]
    pub call_type: String,
    pub function: WireFunction,
}

fn function_type() -> String { "function".to_string() }

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: Role,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<WireToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        let tool_calls = message.has_tool_calls().then(|| {
            message
                .tool_calls
                .iter()
                .map(|c| WireToolCall {
                    id: c.id.clone(),
                    call_type: function_type(),
                    function: WireFunction { name: c.name.clone(), arguments: c.arguments.to_string() },
                })
                .collect()
        });
        Self { role: message.role, content: Some(message.content.clone()), tool_calls, tool_call_id: message.tool_call_id.clone() }
    }
}

impl From<WireMessage> for Message {
    fn from(wire: WireMessage) -> Self {
        let tool_calls = wire
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|c| {
                // Unparseable arguments stay a string; schema validation reports them.
                let arguments = serde_json::from_str(&c.function.arguments).unwrap_or(Value::String(c.function.arguments));
                ToolCall { id: c.id, name: c.function.name, arguments }
            })
            .collect();
        Message { role: wire.role, content: wire.content.unwrap_or_default(), tool_calls, tool_call_id: wire.tool_call_id }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
}

impl ChatRequest {
    pub fn new(model: &str, messages: &[Message], tools: &[ToolSchema]) -> Self {
        Self {
            model: model.to_string(),
            messages: messages.iter().map(WireMessage::from).collect(),
            tools: (!tools.is_empty()).then(|| tools.iter().map(ToolSchema::to_function_spec).collect()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: WireMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

pub struct OpenAiChat {
    client: reqwest::blocking::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenAiChat {
    pub fn new(base_url: &str, model: &str, api_key: Option<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder().timeout(timeout).build().context("failed to build HTTP client")?;
        Ok(Self { client, base_url: base_url.trim_end_matches('/').to_string(), model: model.to_string(), api_key })
    }

    /// Reads the API key from the env var named in `settings`; a missing key is
    /// allowed for local servers that do not check it.
    pub fn from_settings(settings: &LlmSettings) -> Result<Self> {
        let api_key = std::env::var(&settings.api_key_env).ok().filter(|k| !k.is_empty());
        if api_key.is_none() {
            debug!(var = %settings.api_key_env, "no API key set");
        }
        Self::new(&settings.base_url, &settings.model, api_key, Duration::from_secs(settings.timeout_secs))
    }

    pub fn model(&self) -> &str { &self.model }
}

impl ChatModel for OpenAiChat {
    fn generate(&self, messages: &[Message], tools: &[ToolSchema]) -> Result<Message> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = ChatRequest::new(&self.model, messages, tools);
        debug!(url = %url, messages = messages.len(), tools = tools.len(), "POST chat completion");

        let mut request = self.client.post(&url).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request.send().with_context(|| format!("request to {} failed", url))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().unwrap_or_default();
            return Err(Error::Operation(format!("chat completion returned {}: {}", status, text)).into());
        }
        let parsed: ChatResponse = response.json().context("invalid chat completion response")?;
        let choice = parsed.choices.into_iter().next().ok_or_else(|| anyhow!("chat completion returned no choices"))?;
        Ok(choice.message.into())
    }
}
