pub mod agent;
pub mod storage;
pub mod tools;

pub use agent::{
    AgentError, Conversation, ConversationSummary, Message, Role, StreamEvent, DONE_SENTINEL,
};
pub use storage::{FileStorage, Storage, StorageError};
pub use tools::{
    invoke_tool_call, ToolCall, ToolCallAccumulator, ToolCallFragment, ToolError, ToolExecutor,
    ToolRegistry, ToolSchema, ToolSpec,
};
