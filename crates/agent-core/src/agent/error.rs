use thiserror::Error;

/// Failures that abort an orchestration pass.
///
/// Tool failures never show up here: they are turned into tool-role messages.
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("LLM error: {0}")]
    LLM(String),

    #[error("Exceeded maximum of {0} rounds without a final answer")]
    MaxRoundsExceeded(usize),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Cancelled")]
    Cancelled,
}
