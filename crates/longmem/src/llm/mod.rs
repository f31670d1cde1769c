//! Completion and embedding collaborators
//!
//! The engine depends only on these traits. `HttpModelClient` implements both
//! against OpenAI-compatible endpoints; tests substitute in-process fakes.

pub mod http_client;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

pub use http_client::HttpModelClient;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Generate the assistant reply for a conversation
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Single-turn completion of a user prompt
    async fn complete_prompt(&self, prompt: &str) -> Result<String> {
        self.complete(&[ChatMessage::user(prompt)]).await
    }
}

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Identifier stored alongside every vector this service produces
    fn model_id(&self) -> &str;

    /// Embed one text; an empty vector is an error
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;
}
