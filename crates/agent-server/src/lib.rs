pub mod handlers;
pub mod logging;
pub mod server;
pub mod state;

pub use server::{app_config, run_server, run_server_with_state};
pub use state::{AppState, RunGuard, ServerConfig};
