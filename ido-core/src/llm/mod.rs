//! LLM collaborator ports and adapters.

pub mod client;
pub mod json;

pub use client::{
    ChatCompletion, ChatMessage, ChatRole, LlmClient, ModelInfo,
    OpenAiChatClient,
};
pub use json::extract_json;
