use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::tools::ToolSpec;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Tool not found: {0}")]
    NotFound(String),

    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Timed out: {0}")]
    Timeout(String),
}

pub type Result<T> = std::result::Result<T, ToolError>;

/// Something that hosts tools: it can describe them and run them by name.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Short identifier used in logs.
    fn label(&self) -> &str;

    async fn list_tools(&self) -> Result<Vec<ToolSpec>>;

    async fn invoke(&self, name: &str, arguments: Value) -> Result<String>;
}

/// Parse raw call arguments. Blank input means "no arguments" and yields `{}`;
/// anything else must be a JSON object.
pub fn parse_tool_args(raw: &str) -> Result<Value> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }

    let value: Value =
        serde_json::from_str(raw).map_err(|e| ToolError::InvalidArguments(e.to_string()))?;

    if value.is_object() {
        Ok(value)
    } else {
        Err(ToolError::InvalidArguments(format!(
            "expected a JSON object, got {}",
            json_kind(&value)
        )))
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
