use agent_core::tools::ToolCallFragment;

#[derive(Debug, Clone, PartialEq)]
pub enum LLMChunk {
    Token(String),
    ToolCalls(Vec<ToolCallFragment>),
    Done,
}
