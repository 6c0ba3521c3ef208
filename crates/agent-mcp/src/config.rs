use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

use crate::error::{McpError, Result};

/// Root MCP configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub servers: Vec<McpServerConfig>,
}

fn default_version() -> u32 {
    1
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            version: 1,
            servers: Vec::new(),
        }
    }
}

impl McpConfig {
    /// Read a JSON config file. A missing file yields an empty config.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };

        let config: Self = serde_json::from_str(&content).map_err(|e| {
            McpError::InvalidConfig(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Server ids must be non-empty and unique.
    pub fn validate(&self) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for server in &self.servers {
            if server.id.trim().is_empty() {
                return Err(McpError::InvalidConfig("server id must not be empty".into()));
            }
            if !seen.insert(server.id.as_str()) {
                return Err(McpError::InvalidConfig(format!(
                    "duplicate server id '{}'",
                    server.id
                )));
            }
        }
        Ok(())
    }

    pub fn enabled_servers(&self) -> impl Iterator<Item = &McpServerConfig> {
        self.servers.iter().filter(|s| s.enabled)
    }
}

/// Single MCP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfig {
    /// Unique identifier for this server
    pub id: String,
    /// Human-readable name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Whether this server is enabled
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Transport configuration
    pub transport: TransportConfig,
    /// Request timeout in milliseconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    /// List of allowed tools (empty = all allowed)
    #[serde(default)]
    pub allowed_tools: Vec<String>,
    /// List of denied tools
    #[serde(default)]
    pub denied_tools: Vec<String>,
}

impl McpServerConfig {
    /// Whether `tool_name` passes the allow/deny lists.
    pub fn is_tool_allowed(&self, tool_name: &str) -> bool {
        if self.denied_tools.iter().any(|t| t == tool_name) {
            return false;
        }
        self.allowed_tools.is_empty() || self.allowed_tools.iter().any(|t| t == tool_name)
    }
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    60000 // 60 seconds
}

/// Transport configuration variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransportConfig {
    Stdio(StdioConfig),
    Http(HttpConfig),
}

/// Stdio transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StdioConfig {
    /// Command to execute
    pub command: String,
    /// Arguments for the command
    #[serde(default)]
    pub args: Vec<String>,
    /// Working directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    /// Environment variables
    #[serde(default)]
    pub env: HashMap<String, String>,
}

/// Streamable HTTP transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// MCP endpoint URL, e.g. `http://localhost:8005/mcp`
    pub url: String,
    /// Extra request headers
    #[serde(default)]
    pub headers: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    const SAMPLE: &str = r#"{
        "servers": [
            {
                "id": "users",
                "transport": { "type": "http", "url": "http://localhost:8005/mcp" }
            },
            {
                "id": "fetch",
                "enabled": false,
                "request_timeout_ms": 5000,
                "denied_tools": ["fetch_raw"],
                "transport": {
                    "type": "stdio",
                    "command": "uvx",
                    "args": ["mcp-server-fetch"],
                    "env": { "LOG_LEVEL": "warn" }
                }
            }
        ]
    }"#;

    #[test]
    fn parses_both_transport_kinds_with_defaults() {
        let config: McpConfig = serde_json::from_str(SAMPLE).unwrap();

        assert_eq!(config.version, 1);
        assert_eq!(config.servers.len(), 2);

        let users = &config.servers[0];
        assert!(users.enabled);
        assert_eq!(users.request_timeout_ms, 60000);
        match &users.transport {
            TransportConfig::Http(http) => {
                assert_eq!(http.url, "http://localhost:8005/mcp");
                assert!(http.headers.is_empty());
            }
            other => panic!("expected http transport, got {other:?}"),
        }

        let fetch = &config.servers[1];
        assert!(!fetch.enabled);
        match &fetch.transport {
            TransportConfig::Stdio(stdio) => {
                assert_eq!(stdio.command, "uvx");
                assert_eq!(stdio.args, vec!["mcp-server-fetch"]);
                assert_eq!(stdio.env.get("LOG_LEVEL").map(String::as_str), Some("warn"));
            }
            other => panic!("expected stdio transport, got {other:?}"),
        }

        let enabled: Vec<_> = config.enabled_servers().map(|s| s.id.as_str()).collect();
        assert_eq!(enabled, vec!["users"]);
    }

    #[test]
    fn allow_and_deny_lists() {
        let config: McpConfig = serde_json::from_str(SAMPLE).unwrap();
        let fetch = &config.servers[1];

        assert!(fetch.is_tool_allowed("fetch"));
        assert!(!fetch.is_tool_allowed("fetch_raw"));

        let mut restricted = fetch.clone();
        restricted.allowed_tools = vec!["fetch".to_string()];
        assert!(restricted.is_tool_allowed("fetch"));
        assert!(!restricted.is_tool_allowed("other"));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let config = McpConfig {
            version: 1,
            servers: vec![
                serde_json::from_str(r#"{"id":"a","transport":{"type":"http","url":"http://x"}}"#)
                    .unwrap(),
                serde_json::from_str(r#"{"id":"a","transport":{"type":"http","url":"http://y"}}"#)
                    .unwrap(),
            ],
        };

        assert!(matches!(config.validate(), Err(McpError::InvalidConfig(_))));
    }

    #[tokio::test]
    async fn load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();

        let config = assert_ok!(McpConfig::load(dir.path().join("mcp.json")).await);

        assert!(config.servers.is_empty());
    }

    #[tokio::test]
    async fn load_reads_file_and_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("mcp.json");
        let bad = dir.path().join("broken.json");
        tokio::fs::write(&good, SAMPLE).await.unwrap();
        tokio::fs::write(&bad, "{ not json").await.unwrap();

        let config = assert_ok!(McpConfig::load(&good).await);
        assert_eq!(config.servers.len(), 2);

        let error = assert_err!(McpConfig::load(&bad).await);
        assert!(matches!(error, McpError::InvalidConfig(_)));
    }
}
