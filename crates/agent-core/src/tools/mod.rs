pub mod accumulator;
pub mod executor;
pub mod invoker;
pub mod registry;
pub mod types;

pub use accumulator::{PartialToolCall, ToolCallAccumulator};
pub use executor::{parse_tool_args, ToolError, ToolExecutor};
pub use invoker::{assign_missing_ids, invoke_tool_call, unidentified_call_turn};
pub use registry::{normalize_tool_spec, SharedExecutor, ToolRegistry};
pub use types::{FunctionCall, FunctionSchema, ToolCall, ToolCallFragment, ToolSchema, ToolSpec};
