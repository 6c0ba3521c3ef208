use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use agent_core::tools::ToolSpec;

use crate::protocol::models::{McpContentItem, McpToolInfo};

/// MCP tool metadata from server
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct McpTool {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input_schema: serde_json::Value,
}

impl From<McpToolInfo> for McpTool {
    fn from(info: McpToolInfo) -> Self {
        Self {
            name: info.name,
            description: info.description,
            input_schema: info.input_schema.unwrap_or(serde_json::Value::Null),
        }
    }
}

impl From<McpTool> for ToolSpec {
    fn from(tool: McpTool) -> Self {
        ToolSpec {
            name: tool.name,
            description: tool.description,
            input_schema: tool.input_schema,
        }
    }
}

/// Result of calling an MCP tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpCallResult {
    pub content: Vec<McpContentItem>,
    #[serde(default)]
    pub is_error: bool,
}

impl McpCallResult {
    /// Flatten content items into one text block.
    pub fn text(&self) -> String {
        self.content
            .iter()
            .map(|item| match item {
                McpContentItem::Text { text } => text.clone(),
                McpContentItem::Image { data, mime_type } => {
                    format!("[Image: {} ({} bytes)]", mime_type, data.len())
                }
                McpContentItem::Resource { resource } => match &resource.text {
                    Some(text) => format!("[Resource {}]: {}", resource.uri, text),
                    None => format!("[Resource {}]", resource.uri),
                },
                McpContentItem::Unsupported => "[Unsupported content]".to_string(),
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Server runtime status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServerStatus {
    Connecting,
    Ready,
    Stopped,
    Error,
}

impl std::fmt::Display for ServerStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServerStatus::Connecting => write!(f, "connecting"),
            ServerStatus::Ready => write!(f, "ready"),
            ServerStatus::Stopped => write!(f, "stopped"),
            ServerStatus::Error => write!(f, "error"),
        }
    }
}

/// Runtime information for an MCP server
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeInfo {
    pub status: ServerStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connected_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disconnected_at: Option<DateTime<Utc>>,
    pub tool_count: usize,
}

impl Default for RuntimeInfo {
    fn default() -> Self {
        Self {
            status: ServerStatus::Connecting,
            server_name: None,
            last_error: None,
            connected_at: None,
            disconnected_at: None,
            tool_count: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::models::McpResourceInfo;

    #[test]
    fn text_flattens_each_content_kind() {
        let result = McpCallResult {
            content: vec![
                McpContentItem::Text { text: "user 42 deleted".into() },
                McpContentItem::Image { data: "abcd".into(), mime_type: "image/png".into() },
                McpContentItem::Resource {
                    resource: McpResourceInfo {
                        uri: "file:///a.txt".into(),
                        mime_type: None,
                        text: Some("hello".into()),
                        blob: None,
                    },
                },
            ],
            is_error: false,
        };

        assert_eq!(
            result.text(),
            "user 42 deleted\n[Image: image/png (4 bytes)]\n[Resource file:///a.txt]: hello"
        );
    }

    #[test]
    fn tool_without_schema_converts_to_null_schema_spec() {
        let tool = McpTool::from(McpToolInfo {
            name: "ping".into(),
            description: None,
            input_schema: None,
        });

        let spec = ToolSpec::from(tool);

        assert_eq!(spec.name, "ping");
        assert!(spec.input_schema.is_null());
    }
}
