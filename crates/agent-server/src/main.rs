use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;

use agent_llm::ApiFlavor;
use agent_server::logging::init_logging;
use agent_server::state::{default_data_dir, DEFAULT_PORT};
use agent_server::{run_server, ServerConfig};

#[derive(Parser, Debug, Clone)]
#[command(name = "agent-server")]
#[command(about = "Tool-calling agent HTTP server")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(long, env = "DEBUG", default_value = "false")]
    debug: bool,

    /// Server port
    #[arg(long, env = "PORT", default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Completion API base URL
    #[arg(long, env = "LLM_BASE_URL", default_value = "https://api.openai.com/v1")]
    llm_base_url: String,

    /// Model name (the deployment name for the DIAL flavor)
    #[arg(long, env = "LLM_MODEL", default_value = "gpt-4o")]
    model: String,

    /// Completion API key
    #[arg(long, env = "LLM_API_KEY", default_value = "")]
    api_key: String,

    /// Completion API flavor: openai or dial
    #[arg(long, env = "LLM_API_FLAVOR", default_value = "openai")]
    api_flavor: ApiFlavor,

    /// Directory for stored conversations and the default MCP config
    #[arg(long, env = "DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// MCP servers config file (defaults to <data-dir>/mcp.json)
    #[arg(long, env = "MCP_CONFIG")]
    mcp_config: Option<PathBuf>,

    /// File holding the system prompt for new conversations
    #[arg(long, env = "SYSTEM_PROMPT_FILE")]
    system_prompt_file: Option<PathBuf>,

    /// Maximum completion rounds per chat
    #[arg(long, env = "MAX_ROUNDS", default_value = "10")]
    max_rounds: usize,

    /// Per-tool timeout in seconds, 0 to disable
    #[arg(long, env = "TOOL_TIMEOUT_SECS", default_value = "60")]
    tool_timeout_secs: u64,
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        Self {
            port: cli.port,
            llm_base_url: cli.llm_base_url,
            model: cli.model,
            api_key: cli.api_key,
            api_flavor: cli.api_flavor,
            data_dir: cli.data_dir.unwrap_or_else(default_data_dir),
            mcp_config: cli.mcp_config,
            system_prompt_file: cli.system_prompt_file,
            max_rounds: cli.max_rounds,
            tool_timeout_secs: cli.tool_timeout_secs,
        }
    }
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.debug);

    log::info!("Starting agent server on port {}", cli.port);
    log::info!("LLM Configuration:");
    log::info!("  Flavor: {:?}", cli.api_flavor);
    log::info!("  Base URL: {}", cli.llm_base_url);
    log::info!("  Model: {}", cli.model);

    if cli.debug {
        log::debug!("Debug mode enabled");
        log::debug!("  Data dir: {:?}", cli.data_dir);
        log::debug!("  MCP config: {:?}", cli.mcp_config);
        log::debug!("  Max rounds: {}", cli.max_rounds);
        log::debug!("  Tool timeout: {}s", cli.tool_timeout_secs);
    }

    let config = ServerConfig::from(cli);
    let port = config.port;
    run_server(config)
        .await
        .with_context(|| format!("agent server on port {} failed", port))
}
