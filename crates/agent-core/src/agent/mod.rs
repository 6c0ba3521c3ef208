pub mod error;
pub mod events;
pub mod types;

pub use error::AgentError;
pub use events::{StreamEvent, DONE_SENTINEL};
pub use types::{Conversation, ConversationSummary, Message, Role, DEFAULT_CONVERSATION_TITLE};
