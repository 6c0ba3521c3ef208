//! Tool-calling orchestration: alternate completion requests and tool
//! batches until the model produces a final answer.

pub mod config;
pub mod runner;
pub mod stream;

pub use config::{AgentLoopConfig, DEFAULT_MAX_ROUNDS};
pub use runner::{run_blocking, run_streaming};
