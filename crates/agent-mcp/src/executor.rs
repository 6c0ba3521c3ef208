use agent_core::tools::{ToolError, ToolExecutor, ToolSpec};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error};

use crate::error::McpError;
use crate::manager::McpServerManager;

/// Exposes the tools of one MCP server through [`ToolExecutor`].
pub struct McpToolExecutor {
    manager: Arc<McpServerManager>,
    server_id: String,
}

impl McpToolExecutor {
    pub fn new(manager: Arc<McpServerManager>, server_id: impl Into<String>) -> Self {
        Self {
            manager,
            server_id: server_id.into(),
        }
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }
}

fn to_tool_error(error: McpError) -> ToolError {
    match error {
        McpError::Timeout(message) => ToolError::Timeout(message),
        McpError::ServerNotFound(id) => ToolError::NotFound(format!("MCP server '{}' not found", id)),
        other => ToolError::Execution(format!("MCP error: {}", other)),
    }
}

#[async_trait]
impl ToolExecutor for McpToolExecutor {
    fn label(&self) -> &str {
        &self.server_id
    }

    async fn list_tools(&self) -> Result<Vec<ToolSpec>, ToolError> {
        let tools = self
            .manager
            .server_tools(&self.server_id)
            .await
            .map_err(to_tool_error)?;

        Ok(tools.into_iter().map(ToolSpec::from).collect())
    }

    async fn invoke(&self, name: &str, arguments: Value) -> Result<String, ToolError> {
        let exposed = self
            .manager
            .exposes_tool(&self.server_id, name)
            .await
            .map_err(to_tool_error)?;
        if !exposed {
            return Err(ToolError::NotFound(format!(
                "MCP tool '{}' not found on '{}'",
                name, self.server_id
            )));
        }

        debug!("Executing MCP tool '{}' on '{}'", name, self.server_id);

        let result = self
            .manager
            .call_tool(&self.server_id, name, arguments)
            .await
            .map_err(|e| {
                error!("MCP tool '{}' on '{}' failed: {}", name, self.server_id, e);
                to_tool_error(e)
            })?;

        let text = result.text();
        if result.is_error {
            return Err(ToolError::Execution(text));
        }
        Ok(text)
    }
}
