use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{oneshot, RwLock};
use tracing::{debug, error, warn};

use crate::error::{McpError, Result};
use crate::protocol::models::*;
use crate::types::{McpCallResult, McpTool};

/// Transport trait for MCP communication
#[async_trait]
pub trait McpTransport: Send + Sync {
    async fn connect(&mut self) -> Result<()>;
    async fn disconnect(&mut self) -> Result<()>;
    async fn send(&self, message: String) -> Result<()>;
    /// Next inbound message, or `Ok(None)` when nothing arrived in time.
    async fn receive(&self) -> Result<Option<String>>;
    fn is_connected(&self) -> bool;
}

type PendingMap = HashMap<u64, oneshot::Sender<Result<JsonRpcResponse>>>;

/// MCP protocol client
///
/// Requests are correlated with responses by JSON-RPC id; a background task
/// drains the transport and completes the matching waiter.
pub struct McpProtocolClient {
    transport: Arc<RwLock<Box<dyn McpTransport>>>,
    next_id: AtomicU64,
    pending_requests: Arc<RwLock<PendingMap>>,
    message_handler: Option<tokio::task::JoinHandle<()>>,
}

impl McpProtocolClient {
    pub fn new(transport: Box<dyn McpTransport>) -> Self {
        Self {
            transport: Arc::new(RwLock::new(transport)),
            next_id: AtomicU64::new(1),
            pending_requests: Arc::new(RwLock::new(HashMap::new())),
            message_handler: None,
        }
    }

    pub async fn connect(&mut self) -> Result<()> {
        let mut transport = self.transport.write().await;
        transport.connect().await?;
        drop(transport);

        self.start_message_handler();

        Ok(())
    }

    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(handler) = self.message_handler.take() {
            handler.abort();
        }

        // Wake everyone still waiting so they fail fast instead of timing out.
        for (_, sender) in self.pending_requests.write().await.drain() {
            let _ = sender.send(Err(McpError::Disconnected));
        }

        let mut transport = self.transport.write().await;
        transport.disconnect().await
    }

    fn start_message_handler(&mut self) {
        let transport = self.transport.clone();
        let pending_requests = self.pending_requests.clone();

        let handler = tokio::spawn(async move {
            loop {
                let transport = transport.read().await;
                if !transport.is_connected() {
                    break;
                }

                match transport.receive().await {
                    Ok(Some(message)) => {
                        drop(transport);
                        if let Err(e) = Self::handle_message(&message, &pending_requests).await {
                            warn!("Failed to handle message: {}", e);
                        }
                    }
                    Ok(None) => {
                        drop(transport);
                        tokio::task::yield_now().await;
                    }
                    Err(e) => {
                        error!("Transport error: {}", e);
                        break;
                    }
                }
            }

            for (_, sender) in pending_requests.write().await.drain() {
                let _ = sender.send(Err(McpError::Disconnected));
            }
        });

        self.message_handler = Some(handler);
    }

    async fn handle_message(message: &str, pending_requests: &RwLock<PendingMap>) -> Result<()> {
        let value: Value = serde_json::from_str(message)?;

        // Server-initiated requests and notifications carry a method.
        if let Some(method) = value.get("method").and_then(Value::as_str) {
            debug!("Ignoring server message '{}'", method);
            return Ok(());
        }

        let response: JsonRpcResponse = serde_json::from_value(value)?;
        match pending_requests.write().await.remove(&response.id) {
            Some(sender) => {
                let _ = sender.send(Ok(response));
            }
            None => warn!("Response for unknown request id {}", response.id),
        }
        Ok(())
    }

    async fn send_request(
        &self,
        method: &str,
        params: Option<Value>,
        timeout_ms: u64,
    ) -> Result<Value> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let request = JsonRpcRequest::new(id, method, params);
        let request_json = serde_json::to_string(&request)?;

        let (tx, rx) = oneshot::channel();
        self.pending_requests.write().await.insert(id, tx);

        let transport = self.transport.read().await;
        if let Err(e) = transport.send(request_json).await {
            drop(transport);
            self.pending_requests.write().await.remove(&id);
            return Err(e);
        }
        drop(transport);

        match tokio::time::timeout(tokio::time::Duration::from_millis(timeout_ms), rx).await {
            Ok(Ok(Ok(response))) => {
                if let Some(error) = response.error {
                    return Err(McpError::Protocol(format!("{}: {}", error.code, error.message)));
                }
                response
                    .result
                    .ok_or_else(|| McpError::Protocol(format!("Missing result for '{}'", method)))
            }
            Ok(Ok(Err(e))) => Err(e),
            Ok(Err(_)) => Err(McpError::Disconnected),
            Err(_) => {
                self.pending_requests.write().await.remove(&id);
                Err(McpError::Timeout(format!(
                    "'{}' request {} timed out after {}ms",
                    method, id, timeout_ms
                )))
            }
        }
    }

    async fn send_notification(&self, method: &str) -> Result<()> {
        let notification = JsonRpcNotification::new(method);
        let transport = self.transport.read().await;
        transport.send(serde_json::to_string(&notification)?).await
    }

    pub async fn initialize(&self, timeout_ms: u64) -> Result<McpInitializeResult> {
        let params = serde_json::to_value(McpInitializeRequest::default())?;

        let result = self.send_request("initialize", Some(params), timeout_ms).await?;
        let result: McpInitializeResult = serde_json::from_value(result)?;

        self.send_notification("notifications/initialized").await?;

        Ok(result)
    }

    /// All tools of the server, following `nextCursor` pagination.
    pub async fn list_tools(&self, timeout_ms: u64) -> Result<Vec<McpTool>> {
        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = cursor.take().map(|c| serde_json::json!({ "cursor": c }));
            let result = self.send_request("tools/list", params, timeout_ms).await?;
            let page: McpToolListResult = serde_json::from_value(result)?;

            tools.extend(page.tools.into_iter().map(McpTool::from));

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        Ok(tools)
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Value,
        timeout_ms: u64,
    ) -> Result<McpCallResult> {
        let request = McpToolCallRequest {
            name: name.to_string(),
            arguments: Some(arguments),
        };
        let params = serde_json::to_value(request)?;

        let result = self.send_request("tools/call", Some(params), timeout_ms).await?;
        let result: McpToolCallResult = serde_json::from_value(result)?;

        Ok(McpCallResult {
            content: result.content,
            is_error: result.is_error,
        })
    }
}

impl Drop for McpProtocolClient {
    fn drop(&mut self) {
        if let Some(handler) = self.message_handler.take() {
            handler.abort();
        }
    }
}
