//! OpenAI-compatible request serialization and response parsing.
//!
//! The body never leaks internal `agent_core::Message` fields (like `id` /
//! `created_at`) and never carries a `tools` key when no tools are offered.

use agent_core::tools::{ToolCall, ToolCallFragment, ToolSchema};
use agent_core::Message;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::provider::{LLMError, Result};
use crate::types::LLMChunk;

/// Convert internal [`Message`] values to an OpenAI-compatible JSON array.
pub fn messages_to_openai_compat_json(messages: &[Message]) -> Vec<Value> {
    messages.iter().map(Message::to_wire).collect()
}

/// Convert internal [`ToolSchema`] values to the OpenAI `tools` array JSON.
pub fn tools_to_openai_compat_json(tools: &[ToolSchema]) -> Vec<Value> {
    tools.iter().map(|t| json!(t)).collect()
}

/// Build an OpenAI-compatible chat request body.
pub fn build_openai_compat_body(
    model: &str,
    messages: &[Message],
    tools: Option<&[ToolSchema]>,
    stream: bool,
    max_output_tokens: Option<u32>,
) -> Value {
    let mut body = json!({
        "model": model,
        "messages": messages_to_openai_compat_json(messages),
        "stream": stream,
    });

    if let Some(tools) = tools.filter(|tools| !tools.is_empty()) {
        body["tools"] = json!(tools_to_openai_compat_json(tools));
    }

    if let Some(max_tokens) = max_output_tokens {
        body["max_tokens"] = json!(max_tokens);
    }

    body
}

// --- Blocking response parsing ---

#[derive(Debug, Deserialize)]
struct OpenAICompatResponse {
    #[serde(default)]
    choices: Vec<OpenAICompatResponseChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatResponseChoice {
    message: OpenAICompatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatResponseMessage {
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

/// Turn a non-streaming completion body into the assistant [`Message`].
pub fn parse_openai_compat_response(body: &str) -> Result<Message> {
    let response: OpenAICompatResponse = serde_json::from_str(body)?;
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| LLMError::Api("completion response contained no choices".to_string()))?;

    Ok(Message::assistant(
        choice.message.content.unwrap_or_default(),
        choice.message.tool_calls,
    ))
}

// --- OpenAI-compatible streaming chunk parsing ---

#[derive(Debug, Deserialize)]
pub struct OpenAICompatStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAICompatChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatChoice {
    #[serde(default)]
    delta: OpenAICompatDelta,
}

#[derive(Debug, Deserialize, Default)]
struct OpenAICompatDelta {
    content: Option<String>,
    #[serde(rename = "tool_calls")]
    tool_calls: Option<Vec<OpenAICompatToolCallDelta>>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatToolCallDelta {
    #[serde(default)]
    index: u32,
    id: Option<String>,
    function: Option<OpenAICompatFunctionDelta>,
}

#[derive(Debug, Deserialize)]
struct OpenAICompatFunctionDelta {
    name: Option<String>,
    arguments: Option<String>,
}

/// Convert a single OpenAI-compatible stream chunk into [`LLMChunk`]s.
///
/// A delta may carry content and tool-call fragments at once; the content
/// comes first. Empty deltas yield nothing.
pub fn parse_openai_compat_chunk(chunk: OpenAICompatStreamChunk) -> Vec<LLMChunk> {
    let Some(choice) = chunk.choices.into_iter().next() else {
        return Vec::new();
    };

    let mut chunks = Vec::new();

    if let Some(content) = choice.delta.content.filter(|c| !c.is_empty()) {
        chunks.push(LLMChunk::Token(content));
    }

    if let Some(tool_calls) = choice.delta.tool_calls.filter(|calls| !calls.is_empty()) {
        let fragments = tool_calls
            .into_iter()
            .map(|tc| {
                let (name, arguments) = tc
                    .function
                    .map(|f| (f.name, f.arguments))
                    .unwrap_or_default();
                ToolCallFragment {
                    index: tc.index,
                    id: tc.id,
                    name,
                    arguments,
                }
            })
            .collect();

        chunks.push(LLMChunk::ToolCalls(fragments));
    }

    chunks
}

/// Parse an SSE `data:` payload in strict mode.
///
/// - `"[DONE]"` -> `[LLMChunk::Done]`
/// - Invalid JSON -> error
pub fn parse_openai_compat_sse_data_strict(data: &str) -> Result<Vec<LLMChunk>> {
    if data.trim() == "[DONE]" {
        return Ok(vec![LLMChunk::Done]);
    }

    let chunk: OpenAICompatStreamChunk = serde_json::from_str(data)?;
    Ok(parse_openai_compat_chunk(chunk))
}
