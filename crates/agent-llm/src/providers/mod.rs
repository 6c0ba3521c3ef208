//! LLM Providers
//!
//! OpenAI-compatible chat completions, either against the public API or a
//! deployment-scoped gateway (DIAL / Azure style).

pub(crate) mod common;
pub mod openai;

pub use openai::{ApiFlavor, OpenAIProvider};
