use async_trait::async_trait;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Client, Response, StatusCode};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::config::HttpConfig;
use crate::error::{McpError, Result};
use crate::protocol::client::McpTransport;

pub const SESSION_HEADER: &str = "mcp-session-id";

/// Streamable HTTP transport.
///
/// Every outbound message is its own POST. The server answers with either a
/// JSON body or an SSE stream of JSON-RPC messages; both are queued for
/// [`McpTransport::receive`]. A session id handed out by the server is sent
/// back on every later request.
pub struct HttpTransport {
    config: HttpConfig,
    client: Client,
    connected: AtomicBool,
    session_id: Mutex<Option<String>>,
    message_tx: mpsc::Sender<String>,
    message_rx: Mutex<mpsc::Receiver<String>>,
}

impl HttpTransport {
    pub fn new(config: HttpConfig) -> Self {
        let (message_tx, message_rx) = mpsc::channel(100);
        Self {
            config,
            client: Client::new(),
            connected: AtomicBool::new(false),
            session_id: Mutex::new(None),
            message_tx,
            message_rx: Mutex::new(message_rx),
        }
    }

    fn build_headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/event-stream"),
        );

        for (name, value) in &self.config.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| McpError::InvalidConfig(format!("Invalid header name: {}", e)))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| McpError::InvalidConfig(format!("Invalid header value: {}", e)))?;
            headers.insert(header_name, header_value);
        }

        Ok(headers)
    }

    async fn remember_session(&self, response: &Response) {
        let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        else {
            return;
        };

        let mut current = self.session_id.lock().await;
        if current.as_deref() != Some(session) {
            debug!("MCP session established: {}", session);
            *current = Some(session.to_string());
        }
    }

    fn forward_sse(&self, response: Response) {
        let message_tx = self.message_tx.clone();
        let url = self.config.url.clone();

        tokio::spawn(async move {
            let mut stream = response.bytes_stream().eventsource();
            while let Some(event) = stream.next().await {
                match event {
                    Ok(event) if event.event == "message" || event.event.is_empty() => {
                        if event.data.trim().is_empty() {
                            continue;
                        }
                        if message_tx.send(event.data).await.is_err() {
                            break;
                        }
                    }
                    Ok(event) => debug!("Ignoring SSE event '{}' from {}", event.event, url),
                    Err(e) => {
                        warn!("SSE stream error from {}: {}", url, e);
                        break;
                    }
                }
            }
        });
    }
}

#[async_trait]
impl McpTransport for HttpTransport {
    async fn connect(&mut self) -> Result<()> {
        // Fail on bad headers up front rather than on the first request.
        self.build_headers()?;
        self.connected.store(true, Ordering::SeqCst);
        info!("MCP HTTP transport ready for {}", self.config.url);
        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);

        let session = self.session_id.lock().await.take();
        if let Some(session) = session {
            let result = self
                .client
                .delete(&self.config.url)
                .headers(self.build_headers()?)
                .header(SESSION_HEADER, session)
                .send()
                .await;
            if let Err(e) = result {
                debug!("Failed to close MCP session at {}: {}", self.config.url, e);
            }
        }

        info!("MCP HTTP transport closed for {}", self.config.url);
        Ok(())
    }

    async fn send(&self, message: String) -> Result<()> {
        if !self.is_connected() {
            return Err(McpError::Disconnected);
        }

        let mut request = self
            .client
            .post(&self.config.url)
            .headers(self.build_headers()?)
            .header(CONTENT_TYPE, "application/json")
            .body(message);

        if let Some(session) = self.session_id.lock().await.clone() {
            request = request.header(SESSION_HEADER, session);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(McpError::Transport(format!("POST failed: {} - {}", status, body)));
        }

        self.remember_session(&response).await;

        if status == StatusCode::ACCEPTED {
            return Ok(());
        }

        let is_sse = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("text/event-stream"));

        if is_sse {
            self.forward_sse(response);
            return Ok(());
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(());
        }

        self.message_tx
            .send(body)
            .await
            .map_err(|_| McpError::Disconnected)
    }

    async fn receive(&self) -> Result<Option<String>> {
        if !self.is_connected() {
            return Err(McpError::Disconnected);
        }

        let mut rx = self.message_rx.lock().await;
        match tokio::time::timeout(tokio::time::Duration::from_millis(100), rx.recv()).await {
            Ok(Some(message)) => Ok(Some(message)),
            Ok(None) => Err(McpError::Disconnected),
            Err(_) => Ok(None),
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}
