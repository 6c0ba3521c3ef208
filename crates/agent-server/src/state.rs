use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

use agent_core::tools::ToolRegistry;
use agent_core::{FileStorage, Storage};
use agent_llm::{ApiFlavor, LLMProvider, OpenAIProvider};
use agent_loop::{AgentLoopConfig, DEFAULT_MAX_ROUNDS};
use agent_mcp::{McpConfig, McpServerManager};

pub const DEFAULT_PORT: u16 = 8011;
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 60;

/// Everything needed to bring the service up.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub llm_base_url: String,
    pub model: String,
    pub api_key: String,
    pub api_flavor: ApiFlavor,
    pub data_dir: PathBuf,
    /// Defaults to `<data_dir>/mcp.json`.
    pub mcp_config: Option<PathBuf>,
    pub system_prompt_file: Option<PathBuf>,
    pub max_rounds: usize,
    /// Zero disables the per-tool timeout.
    pub tool_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            llm_base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o".to_string(),
            api_key: String::new(),
            api_flavor: ApiFlavor::OpenAI,
            data_dir: default_data_dir(),
            mcp_config: None,
            system_prompt_file: None,
            max_rounds: DEFAULT_MAX_ROUNDS,
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS,
        }
    }
}

impl ServerConfig {
    pub fn mcp_config_path(&self) -> PathBuf {
        self.mcp_config
            .clone()
            .unwrap_or_else(|| self.data_dir.join("mcp.json"))
    }

    pub fn loop_config(&self) -> AgentLoopConfig {
        let config = AgentLoopConfig::default().with_max_rounds(self.max_rounds);
        if self.tool_timeout_secs > 0 {
            config.with_tool_timeout(Duration::from_secs(self.tool_timeout_secs))
        } else {
            config
        }
    }
}

pub fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(".tool-agent")
}

/// Shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub storage: Arc<dyn Storage>,
    pub llm: Arc<dyn LLMProvider>,
    pub registry: Arc<ToolRegistry>,
    pub loop_config: AgentLoopConfig,
    /// Seeded as the first turn of a conversation that has no history yet.
    pub system_prompt: Option<String>,
    /// One entry per conversation with a run in flight.
    pub cancel_tokens: Arc<DashMap<String, CancellationToken>>,
    pub mcp_manager: Option<Arc<McpServerManager>>,
}

impl AppState {
    pub fn new(
        storage: Arc<dyn Storage>,
        llm: Arc<dyn LLMProvider>,
        registry: Arc<ToolRegistry>,
        loop_config: AgentLoopConfig,
    ) -> Self {
        Self {
            storage,
            llm,
            registry,
            loop_config,
            system_prompt: None,
            cancel_tokens: Arc::new(DashMap::new()),
            mcp_manager: None,
        }
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        let prompt = prompt.into();
        self.system_prompt = Some(prompt).filter(|p| !p.trim().is_empty());
        self
    }

    /// Wire storage, gateway and MCP executors from configuration.
    ///
    /// MCP servers that fail to start are skipped; a broken MCP config file
    /// leaves the service without tools rather than refusing to start.
    pub async fn from_config(config: &ServerConfig) -> io::Result<Self> {
        let conversations_dir = config.data_dir.join("conversations");
        log::info!("Initializing storage at: {:?}", conversations_dir);
        let storage = FileStorage::new(&conversations_dir);
        storage.init().await?;

        log::info!(
            "Creating LLM provider ({:?}) with base URL: {} and model: {}",
            config.api_flavor,
            config.llm_base_url,
            config.model
        );
        let llm: Arc<dyn LLMProvider> = Arc::new(
            OpenAIProvider::new(config.api_key.clone())
                .with_base_url(config.llm_base_url.clone())
                .with_model(config.model.clone())
                .with_flavor(config.api_flavor),
        );

        let mcp_manager = Arc::new(McpServerManager::new());
        let mcp_config = load_mcp_config(&config.mcp_config_path()).await;
        let executors = mcp_manager.initialize_from_config(&mcp_config).await;

        let mut registry = ToolRegistry::new();
        for executor in executors {
            let label = executor.label().to_string();
            if let Err(e) = registry.register(executor).await {
                log::warn!("Failed to list tools of executor '{}': {}", label, e);
            }
        }
        log::info!("Tool registry ready with {} tools", registry.len());

        let mut state = Self::new(
            Arc::new(storage),
            llm,
            Arc::new(registry),
            config.loop_config(),
        );
        state.mcp_manager = Some(mcp_manager);

        if let Some(path) = &config.system_prompt_file {
            let prompt = tokio::fs::read_to_string(path).await?;
            log::info!(
                "Loaded system prompt from {:?} ({} chars)",
                path,
                prompt.len()
            );
            state = state.with_system_prompt(prompt.trim());
        }

        Ok(state)
    }

    /// Claim the run slot of a conversation. `None` when a run is already in flight.
    ///
    /// The slot stays claimed for as long as the returned guard lives.
    pub fn begin_run(&self, conversation_id: &str) -> Option<RunGuard> {
        match self.cancel_tokens.entry(conversation_id.to_string()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let token = CancellationToken::new();
                slot.insert(token.clone());
                Some(RunGuard {
                    tokens: self.cancel_tokens.clone(),
                    conversation_id: conversation_id.to_string(),
                    token,
                })
            }
        }
    }

    /// Signal the in-flight run, if any. The slot is released by the run itself.
    pub fn cancel_run(&self, conversation_id: &str) -> bool {
        match self.cancel_tokens.get(conversation_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&self, conversation_id: &str) -> bool {
        self.cancel_tokens.contains_key(conversation_id)
    }

    pub async fn shutdown(&self) {
        if let Some(manager) = &self.mcp_manager {
            log::info!("Shutting down MCP servers...");
            manager.shutdown_all().await;
        }
    }
}

/// Claimed run slot of one conversation, released on drop.
///
/// Dropping covers every way a run can end, including a handler future that
/// is abandoned when the client disconnects.
pub struct RunGuard {
    tokens: Arc<DashMap<String, CancellationToken>>,
    conversation_id: String,
    token: CancellationToken,
}

impl RunGuard {
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.tokens.remove(&self.conversation_id);
        log::debug!("[{}] Run slot released", self.conversation_id);
    }
}

async fn load_mcp_config(path: &Path) -> McpConfig {
    match McpConfig::load(path).await {
        Ok(config) => {
            log::info!(
                "Loaded MCP config from {:?} with {} servers",
                path,
                config.servers.len()
            );
            config
        }
        Err(e) => {
            log::error!("Failed to load MCP config {:?}: {}", path, e);
            McpConfig::default()
        }
    }
}
