#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::Value;

use agent_core::tools::{
    ToolCallFragment, ToolError, ToolExecutor, ToolRegistry, ToolSchema, ToolSpec,
};
use agent_core::Message;
use agent_llm::{LLMChunk, LLMError, LLMProvider, LLMStream};

/// What the scripted gateway does on one call.
pub enum Reply {
    Chunks(Vec<LLMChunk>),
    Fail(String),
    Hang,
}

/// One observed gateway call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub messages: Vec<Message>,
    pub tool_names: Option<Vec<String>>,
}

/// Gateway that plays back scripted replies in order and records every call.
pub struct ScriptedLLM {
    replies: Mutex<VecDeque<Reply>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedLLM {
    pub fn new(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            calls: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LLMProvider for ScriptedLLM {
    async fn chat_stream(
        &self,
        messages: &[Message],
        tools: Option<&[ToolSchema]>,
    ) -> Result<LLMStream, LLMError> {
        self.calls.lock().unwrap().push(RecordedCall {
            messages: messages.to_vec(),
            tool_names: tools.map(|tools| {
                tools.iter().map(|t| t.function.name.clone()).collect()
            }),
        });

        let reply = self.replies.lock().unwrap().pop_front();
        match reply {
            Some(Reply::Chunks(chunks)) => {
                Ok(Box::pin(futures::stream::iter(chunks.into_iter().map(Ok))))
            }
            Some(Reply::Fail(message)) => Err(LLMError::Api(message)),
            Some(Reply::Hang) => Ok(Box::pin(futures::stream::pending())),
            None => Err(LLMError::Api("script exhausted".to_string())),
        }
    }
}

pub fn text(parts: &[&str]) -> Reply {
    let mut chunks: Vec<LLMChunk> = parts
        .iter()
        .map(|part| LLMChunk::Token(part.to_string()))
        .collect();
    chunks.push(LLMChunk::Done);
    Reply::Chunks(chunks)
}

/// A single complete call delivered as one fragment.
pub fn call(index: u32, id: &str, name: &str, arguments: &str) -> LLMChunk {
    LLMChunk::ToolCalls(vec![ToolCallFragment {
        index,
        id: Some(id.to_string()),
        name: Some(name.to_string()),
        arguments: Some(arguments.to_string()),
    }])
}

pub fn tool_round(calls: Vec<LLMChunk>) -> Reply {
    let mut chunks = calls;
    chunks.push(LLMChunk::Done);
    Reply::Chunks(chunks)
}

type Handler = dyn Fn(&str, Value) -> Result<String, ToolError> + Send + Sync;

/// Executor whose behavior is a closure over (tool name, arguments).
pub struct FnExecutor {
    label: String,
    specs: Vec<ToolSpec>,
    handler: Box<Handler>,
    invocations: Mutex<Vec<(String, Value)>>,
}

impl FnExecutor {
    pub fn new<F>(label: &str, tools: &[&str], handler: F) -> Arc<Self>
    where
        F: Fn(&str, Value) -> Result<String, ToolError> + Send + Sync + 'static,
    {
        Arc::new(Self {
            label: label.to_string(),
            specs: tools
                .iter()
                .map(|name| {
                    ToolSpec::new(
                        *name,
                        format!("{} tool", name),
                        serde_json::json!({"type": "object", "properties": {}}),
                    )
                })
                .collect(),
            handler: Box::new(handler),
            invocations: Mutex::new(Vec::new()),
        })
    }

    pub fn invocations(&self) -> Vec<(String, Value)> {
        self.invocations.lock().unwrap().clone()
    }
}

#[async_trait]
impl ToolExecutor for FnExecutor {
    fn label(&self) -> &str {
        &self.label
    }

    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolError> {
        Ok(self.specs.clone())
    }

    async fn invoke(&self, name: &str, arguments: Value) -> Result<String, ToolError> {
        self.invocations
            .lock()
            .unwrap()
            .push((name.to_string(), arguments.clone()));
        (self.handler)(name, arguments)
    }
}

pub async fn registry_with(executors: Vec<Arc<dyn ToolExecutor>>) -> Arc<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    for executor in executors {
        registry.register(executor).await.unwrap();
    }
    Arc::new(registry)
}
