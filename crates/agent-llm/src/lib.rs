pub mod provider;
pub mod providers;
pub mod types;

pub use provider::{LLMError, LLMProvider, LLMStream};
pub use providers::{ApiFlavor, OpenAIProvider};
pub use types::LLMChunk;
