use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use agent_core::tools::SharedExecutor;

use crate::config::{McpConfig, McpServerConfig, TransportConfig};
use crate::error::{McpError, Result};
use crate::executor::McpToolExecutor;
use crate::protocol::{McpProtocolClient, McpTransport};
use crate::transports::{HttpTransport, StdioTransport};
use crate::types::{McpCallResult, McpTool, RuntimeInfo, ServerStatus};

/// Runtime state for a connected MCP server
struct ServerRuntime {
    config: McpServerConfig,
    client: RwLock<McpProtocolClient>,
    info: RwLock<RuntimeInfo>,
    tools: RwLock<Vec<McpTool>>,
}

/// Manages MCP server connections and tool execution
pub struct McpServerManager {
    runtimes: DashMap<String, Arc<ServerRuntime>>,
}

impl McpServerManager {
    pub fn new() -> Self {
        Self {
            runtimes: DashMap::new(),
        }
    }

    /// Start every enabled server and return one executor per server that came
    /// up, in config order. Servers that fail to start are logged and skipped.
    pub async fn initialize_from_config(self: &Arc<Self>, config: &McpConfig) -> Vec<SharedExecutor> {
        let mut executors: Vec<SharedExecutor> = Vec::new();

        for server_config in config.enabled_servers() {
            match self.start_server(server_config.clone()).await {
                Ok(()) => executors.push(Arc::new(self.executor(&server_config.id))),
                Err(e) => error!("Failed to start MCP server '{}': {}", server_config.id, e),
            }
        }

        executors
    }

    /// Executor view of one server.
    pub fn executor(self: &Arc<Self>, server_id: &str) -> McpToolExecutor {
        McpToolExecutor::new(self.clone(), server_id)
    }

    /// Start a new MCP server connection
    pub async fn start_server(&self, config: McpServerConfig) -> Result<()> {
        let server_id = config.id.clone();

        if self.runtimes.contains_key(&server_id) {
            return Err(McpError::AlreadyRunning(server_id));
        }

        info!("Starting MCP server '{}'", server_id);

        let transport: Box<dyn McpTransport> = match &config.transport {
            TransportConfig::Stdio(stdio_config) => {
                Box::new(StdioTransport::new(stdio_config.clone()))
            }
            TransportConfig::Http(http_config) => Box::new(HttpTransport::new(http_config.clone())),
        };

        let mut client = McpProtocolClient::new(transport);
        client.connect().await?;

        let handshake = async {
            let init = client.initialize(config.request_timeout_ms).await?;
            let tools = client.list_tools(config.request_timeout_ms).await?;
            Ok::<_, McpError>((init, tools))
        }
        .await;

        let (init_result, tools) = match handshake {
            Ok(ok) => ok,
            Err(e) => {
                if let Err(disconnect_error) = client.disconnect().await {
                    warn!(
                        "Error disconnecting MCP server '{}': {}",
                        server_id, disconnect_error
                    );
                }
                return Err(e);
            }
        };

        info!(
            "MCP server '{}' initialized: {} v{} with {} tools",
            server_id,
            init_result.server_info.name,
            init_result.server_info.version,
            tools.len()
        );

        let runtime = Arc::new(ServerRuntime {
            config,
            client: RwLock::new(client),
            info: RwLock::new(RuntimeInfo {
                status: ServerStatus::Ready,
                server_name: Some(init_result.server_info.name),
                last_error: None,
                connected_at: Some(Utc::now()),
                disconnected_at: None,
                tool_count: tools.len(),
            }),
            tools: RwLock::new(tools),
        });

        self.runtimes.insert(server_id, runtime);
        Ok(())
    }

    /// Stop an MCP server connection
    pub async fn stop_server(&self, server_id: &str) -> Result<()> {
        let (_, runtime) = self
            .runtimes
            .remove(server_id)
            .ok_or_else(|| McpError::ServerNotFound(server_id.to_string()))?;

        info!("Stopping MCP server '{}'", server_id);

        let mut client = runtime.client.write().await;
        if let Err(e) = client.disconnect().await {
            warn!("Error disconnecting MCP server '{}': {}", server_id, e);
        }

        let mut info = runtime.info.write().await;
        info.status = ServerStatus::Stopped;
        info.disconnected_at = Some(Utc::now());

        Ok(())
    }

    fn runtime(&self, server_id: &str) -> Result<Arc<ServerRuntime>> {
        self.runtimes
            .get(server_id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| McpError::ServerNotFound(server_id.to_string()))
    }

    /// Call a tool on a specific server
    pub async fn call_tool(
        &self,
        server_id: &str,
        tool_name: &str,
        args: serde_json::Value,
    ) -> Result<McpCallResult> {
        let runtime = self.runtime(server_id)?;
        let client = runtime.client.read().await;

        let result = client
            .call_tool(tool_name, args, runtime.config.request_timeout_ms)
            .await;

        if let Err(e) = &result {
            let mut info = runtime.info.write().await;
            info.last_error = Some(e.to_string());
        }

        result
    }

    /// Tools of a server that pass its allow/deny lists.
    pub async fn server_tools(&self, server_id: &str) -> Result<Vec<McpTool>> {
        let runtime = self.runtime(server_id)?;
        let tools = runtime.tools.read().await;

        Ok(tools
            .iter()
            .filter(|tool| runtime.config.is_tool_allowed(&tool.name))
            .cloned()
            .collect())
    }

    /// Whether `tool_name` is exposed by the server after filtering.
    pub async fn exposes_tool(&self, server_id: &str, tool_name: &str) -> Result<bool> {
        let runtime = self.runtime(server_id)?;
        let tools = runtime.tools.read().await;

        Ok(runtime.config.is_tool_allowed(tool_name) && tools.iter().any(|t| t.name == tool_name))
    }

    /// Re-read the tool list from a server
    pub async fn refresh_tools(&self, server_id: &str) -> Result<usize> {
        let runtime = self.runtime(server_id)?;

        let client = runtime.client.read().await;
        let new_tools = client.list_tools(runtime.config.request_timeout_ms).await?;
        drop(client);

        let count = new_tools.len();
        *runtime.tools.write().await = new_tools;
        runtime.info.write().await.tool_count = count;

        info!("Refreshed {} tools for MCP server '{}'", count, server_id);
        Ok(count)
    }

    /// Get all server IDs
    pub fn list_servers(&self) -> Vec<String> {
        self.runtimes.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Get runtime info for a server
    pub async fn get_server_info(&self, server_id: &str) -> Option<RuntimeInfo> {
        let runtime = self.runtime(server_id).ok()?;
        let info = runtime.info.read().await.clone();
        Some(info)
    }

    pub fn is_server_running(&self, server_id: &str) -> bool {
        self.runtimes.contains_key(server_id)
    }

    /// Shutdown all servers
    pub async fn shutdown_all(&self) {
        for server_id in self.list_servers() {
            if let Err(e) = self.stop_server(&server_id).await {
                error!("Error stopping server '{}': {}", server_id, e);
            }
        }
    }
}

impl Default for McpServerManager {
    fn default() -> Self {
        Self::new()
    }
}
