//! MCP (Model Context Protocol) client library.
//!
//! Connects to MCP servers over streamable HTTP or stdio and exposes each
//! server as an `agent_core::ToolExecutor`.

pub mod config;
pub mod error;
pub mod protocol;
pub mod transports;
pub mod types;

pub mod executor;
pub mod manager;

pub use config::*;
pub use error::{McpError, Result};
pub use executor::McpToolExecutor;
pub use manager::McpServerManager;
pub use protocol::*;
pub use transports::*;
pub use types::*;

#[cfg(test)]
pub(crate) mod test_support;
