//! HTTP client for the local completion and embedding servers
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info};

use super::{ChatMessage, CompletionService, EmbeddingService};
use crate::config::Config;
use crate::error::{MemoryError, Result};

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

pub struct HttpModelClient {
    chat_url: String,
    embed_url: String,
    chat_model: String,
    embed_model: String,
    http_client: reqwest::Client,
}

impl HttpModelClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.http_timeout_seconds))
            .build()
            .map_err(|e| MemoryError::transport(format!("failed to build HTTP client: {}", e)))?;

        info!("Model client initialized: chat {} / embeddings {}", config.chat_url, config.embed_url);
        Ok(Self {
            chat_url: config.chat_url.clone(),
            embed_url: config.embed_url.clone(),
            chat_model: config.chat_model.clone(),
            embed_model: config.embed_model.clone(),
            http_client,
        })
    }

    async fn post_json<T: Serialize + ?Sized>(&self, url: &str, body: &T, what: &str) -> Result<Value> {
        let response = self
            .http_client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| MemoryError::transport(format!("{} request failed: {}", what, e)))?;

        let status = response.status();
        let text = response.text().await?;
        if !status.is_success() {
            return Err(MemoryError::transport(format!("{} endpoint returned {}: {}", what, status, text)));
        }

        let value: Value = serde_json::from_str(&text)
            .map_err(|e| MemoryError::transport(format!("{} endpoint returned non-JSON body: {}", what, e)))?;
        if let Some(message) = error_message(&value) {
            return Err(MemoryError::transport(format!("{} endpoint reported an error: {}", what, message)));
        }
        Ok(value)
    }
}

#[async_trait]
impl CompletionService for HttpModelClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        debug!("Requesting completion ({} messages)", messages.len());
        let request = ChatCompletionRequest { model: &self.chat_model, messages, stream: false };
        let value = self.post_json(&self.chat_url, &request, "Completion").await?;

        let content = completion_text(&value)
            .ok_or_else(|| MemoryError::validation("completion response carries no text"))?;
        Ok(content.trim().to_string())
    }
}

#[async_trait]
impl EmbeddingService for HttpModelClient {
    fn model_id(&self) -> &str {
        &self.embed_model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest { model: &self.embed_model, input: text };
        let value = self.post_json(&self.embed_url, &request, "Embedding").await?;

        let embedding = embedding_vector(&value).unwrap_or_default();
        if embedding.is_empty() {
            return Err(MemoryError::validation("embedding response carries no vector"));
        }
        debug!("Generated embedding (dim={})", embedding.len());
        Ok(embedding)
    }
}

/// An explicit `error` member, as a string or `{ "message": ... }`
fn error_message(value: &Value) -> Option<String> {
    match value.get("error")? {
        Value::Null => None,
        Value::String(s) if s.is_empty() => None,
        Value::String(s) => Some(s.clone()),
        other => Some(
            other
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| other.to_string()),
        ),
    }
}

fn completion_text(value: &Value) -> Option<String> {
    let first_choice = value.get("choices").and_then(|c| c.get(0));
    let candidates = [
        first_choice.and_then(|c| c.pointer("/message/content")),
        first_choice.and_then(|c| c.get("text")),
        value.pointer("/message/content"),
        value.get("content"),
        value.get("response"),
        value.get("text"),
    ];
    candidates.into_iter().flatten().find_map(|v| v.as_str().map(str::to_string))
}

fn embedding_vector(value: &Value) -> Option<Vec<f32>> {
    let candidates = [
        value.pointer("/data/0/embedding"),
        value.get("embedding"),
        value.pointer("/embeddings/0"),
    ];
    let array = candidates.into_iter().flatten().find_map(Value::as_array)?;
    array.iter().map(|v| v.as_f64().map(|f| f as f32)).collect()
}
