//! One embedding per (summary, model)
use std::sync::Arc;
use tracing::debug;

use crate::error::{MemoryError, Result};
use crate::llm::EmbeddingService;
use crate::memory_db::MemoryDatabase;
use crate::period::SummaryKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedOutcome {
    /// A vector for the configured model was already stored
    Existing,
    Created { dim: usize },
}

pub struct EmbeddingIndex {
    db: Arc<MemoryDatabase>,
    service: Arc<dyn EmbeddingService>,
}

impl EmbeddingIndex {
    pub fn new(db: Arc<MemoryDatabase>, service: Arc<dyn EmbeddingService>) -> Self {
        Self { db, service }
    }

    pub fn model_id(&self) -> &str {
        self.service.model_id()
    }

    /// Make sure the summary (kind, key) has a vector for the configured model
    pub async fn ensure(&self, text: &str, kind: SummaryKind, period_key: &str) -> Result<EmbedOutcome> {
        let summary_id = self
            .db
            .summaries
            .id_of(kind, period_key)?
            .ok_or_else(|| MemoryError::NotFound { kind: kind.to_string(), key: period_key.to_string() })?;
        self.ensure_for(summary_id, text).await
    }

    /// Same as [`ensure`](Self::ensure) for a known summary id
    pub async fn ensure_for(&self, summary_id: i64, text: &str) -> Result<EmbedOutcome> {
        let model = self.service.model_id();
        if self.db.embeddings.exists(summary_id, model)? {
            return Ok(EmbedOutcome::Existing);
        }
        if text.trim().is_empty() {
            return Err(MemoryError::validation(format!("summary {} has no index text", summary_id)));
        }

        let vector = self.service.embed(text).await?;
        if vector.is_empty() {
            return Err(MemoryError::validation("embedding service returned an empty vector"));
        }
        self.db.embeddings.insert(summary_id, model, &vector)?;
        debug!("Embedded summary {} with {} ({} dims)", summary_id, model, vector.len());
        Ok(EmbedOutcome::Created { dim: vector.len() })
    }
}
