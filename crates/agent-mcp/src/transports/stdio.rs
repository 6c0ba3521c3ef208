use async_trait::async_trait;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::StdioConfig;
use crate::error::{McpError, Result};
use crate::protocol::client::McpTransport;

/// Child process speaking newline-delimited JSON-RPC on stdin/stdout.
pub struct StdioTransport {
    config: StdioConfig,
    child: Option<Child>,
    stdin: Option<Mutex<ChildStdin>>,
    /// Complete stdout lines, forwarded by the reader task.
    lines: Option<Mutex<mpsc::Receiver<String>>>,
    reader: Option<JoinHandle<()>>,
    alive: Arc<AtomicBool>,
}

impl StdioTransport {
    pub fn new(config: StdioConfig) -> Self {
        Self {
            config,
            child: None,
            stdin: None,
            lines: None,
            reader: None,
            alive: Arc::new(AtomicBool::new(false)),
        }
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.config.command);
        cmd.args(&self.config.args)
            .envs(&self.config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        if let Some(cwd) = &self.config.cwd {
            cmd.current_dir(cwd);
        }
        cmd
    }
}

#[async_trait]
impl McpTransport for StdioTransport {
    async fn connect(&mut self) -> Result<()> {
        info!(
            "Starting MCP server process: {} {:?}",
            self.config.command, self.config.args
        );

        let mut child = self.command().spawn().map_err(|e| {
            error!("Failed to spawn MCP server process: {}", e);
            McpError::Connection(format!("Failed to spawn '{}': {}", self.config.command, e))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| McpError::Transport("Failed to capture stdin".to_string()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| McpError::Transport("Failed to capture stdout".to_string()))?;

        if let Some(stderr) = child.stderr.take() {
            let command = self.config.command.clone();
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("[{} stderr] {}", command, line);
                }
            });
        }

        let (line_tx, line_rx) = mpsc::channel(100);
        self.alive.store(true, Ordering::SeqCst);
        self.reader = Some(spawn_reader(stdout, line_tx, self.alive.clone()));

        self.child = Some(child);
        self.stdin = Some(Mutex::new(stdin));
        self.lines = Some(Mutex::new(line_rx));

        Ok(())
    }

    async fn disconnect(&mut self) -> Result<()> {
        self.alive.store(false, Ordering::SeqCst);

        // Closing stdin is the shutdown signal for well-behaved servers.
        self.stdin = None;
        self.lines = None;
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }

        if let Some(mut child) = self.child.take() {
            match tokio::time::timeout(tokio::time::Duration::from_secs(5), child.wait()).await {
                Ok(Ok(status)) => info!("MCP server process exited: {}", status),
                _ => {
                    warn!("MCP server process did not exit, killing");
                    let _ = child.kill().await;
                }
            }
        }

        Ok(())
    }

    async fn send(&self, message: String) -> Result<()> {
        let stdin = self.stdin.as_ref().ok_or(McpError::Disconnected)?;

        let mut stdin = stdin.lock().await;
        stdin
            .write_all(format!("{}\n", message).as_bytes())
            .await
            .map_err(|e| McpError::Transport(format!("Failed to write: {}", e)))?;
        stdin
            .flush()
            .await
            .map_err(|e| McpError::Transport(format!("Failed to flush: {}", e)))?;

        debug!("Sent: {}", message);
        Ok(())
    }

    async fn receive(&self) -> Result<Option<String>> {
        let lines = self.lines.as_ref().ok_or(McpError::Disconnected)?;

        let mut lines = lines.lock().await;
        match tokio::time::timeout(tokio::time::Duration::from_millis(100), lines.recv()).await {
            Ok(Some(line)) => Ok(Some(line)),
            Ok(None) => {
                self.alive.store(false, Ordering::SeqCst);
                Err(McpError::Disconnected)
            }
            Err(_) => Ok(None),
        }
    }

    fn is_connected(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

/// Read stdout line by line on its own task. Lines only leave this task
/// once complete, so a receive that times out never loses partial output.
fn spawn_reader(
    stdout: ChildStdout,
    line_tx: mpsc::Sender<String>,
    alive: Arc<AtomicBool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut lines = BufReader::new(stdout).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    debug!("Received: {}", line);
                    if line_tx.send(line.to_string()).await.is_err() {
                        break;
                    }
                }
                Ok(None) => {
                    warn!("MCP server stdout closed (EOF)");
                    break;
                }
                Err(e) => {
                    error!("Failed to read MCP server stdout: {}", e);
                    break;
                }
            }
        }
        alive.store(false, Ordering::SeqCst);
    })
}
