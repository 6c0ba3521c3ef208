mod file;

pub use file::FileStorage;

use thiserror::Error;

use crate::agent::{Conversation, ConversationSummary, Message};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Conversation not found: {0}")]
    NotFound(String),
}

pub type Result<T> = std::result::Result<T, StorageError>;

#[async_trait::async_trait]
pub trait Storage: Send + Sync {
    async fn create_conversation(&self, title: Option<String>) -> Result<Conversation>;

    /// Summaries ordered by most recent update first.
    async fn list_conversations(&self) -> Result<Vec<ConversationSummary>>;

    async fn load_conversation(&self, conversation_id: &str) -> Result<Option<Conversation>>;

    /// Replace the stored history and bump `updated_at`.
    async fn save_messages(&self, conversation_id: &str, messages: &[Message]) -> Result<()>;

    async fn delete_conversation(&self, conversation_id: &str) -> Result<bool>;
}
