use crate::types::LLMChunk;
use agent_core::{tools::ToolSchema, Message, ToolCallAccumulator};
use async_trait::async_trait;
use futures::{Stream, StreamExt};
use std::pin::Pin;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LLMError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Stream error: {0}")]
    Stream(String),

    #[error("API error: {0}")]
    Api(String),
}

pub type Result<T> = std::result::Result<T, LLMError>;

pub type LLMStream = Pin<Box<dyn Stream<Item = Result<LLMChunk>> + Send>>;

/// Completion gateway.
///
/// `tools` is `None` when no tools are available; implementations must then
/// leave the tools field out of the request entirely.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Stream chat completion
    async fn chat_stream(
        &self,
        messages: &[Message],
        tools: Option<&[ToolSchema]>,
    ) -> Result<LLMStream>;

    /// Single blocking completion returning the assistant turn.
    ///
    /// The default drains [`LLMProvider::chat_stream`] and assembles the result.
    async fn chat(&self, messages: &[Message], tools: Option<&[ToolSchema]>) -> Result<Message> {
        let mut stream = self.chat_stream(messages, tools).await?;
        let mut content = String::new();
        let mut tool_calls = ToolCallAccumulator::new();

        while let Some(chunk) = stream.next().await {
            match chunk? {
                LLMChunk::Token(token) => content.push_str(&token),
                LLMChunk::ToolCalls(fragments) => tool_calls.extend(fragments),
                LLMChunk::Done => break,
            }
        }

        Ok(Message::assistant(content, Some(tool_calls.finish())))
    }
}
