use std::time::Duration;

pub const DEFAULT_MAX_ROUNDS: usize = 10;

/// Configuration for the agent loop.
#[derive(Debug, Clone)]
pub struct AgentLoopConfig {
    /// Upper bound on gateway calls per run.
    pub max_rounds: usize,
    /// Per tool invocation.
    pub tool_timeout: Option<Duration>,
    /// For a blocking completion, or for each chunk of a streamed one.
    pub completion_timeout: Option<Duration>,
}

impl Default for AgentLoopConfig {
    fn default() -> Self {
        Self {
            max_rounds: DEFAULT_MAX_ROUNDS,
            tool_timeout: None,
            completion_timeout: None,
        }
    }
}

impl AgentLoopConfig {
    pub fn with_max_rounds(mut self, max_rounds: usize) -> Self {
        self.max_rounds = max_rounds;
        self
    }

    pub fn with_tool_timeout(mut self, timeout: Duration) -> Self {
        self.tool_timeout = Some(timeout);
        self
    }

    pub fn with_completion_timeout(mut self, timeout: Duration) -> Self {
        self.completion_timeout = Some(timeout);
        self
    }
}
