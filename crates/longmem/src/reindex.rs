//! Embedding backfill for summaries that have no vector for the configured
//! model, e.g. after the embedding service was down or the model changed.

use serde::Serialize;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{MemoryError, Result};
use crate::index::{EmbedOutcome, EmbeddingIndex};
use crate::memory_db::MemoryDatabase;
use crate::period::SummaryKind;
use crate::summary::index_text;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReindexScope {
    Kind(SummaryKind),
    All,
}

impl ReindexScope {
    pub fn kinds(&self) -> Vec<SummaryKind> {
        match self {
            ReindexScope::Kind(kind) => vec![*kind],
            ReindexScope::All => SummaryKind::ALL.to_vec(),
        }
    }
}

impl FromStr for ReindexScope {
    type Err = MemoryError;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(ReindexScope::All);
        }
        s.parse().map(ReindexScope::Kind)
    }
}

impl fmt::Display for ReindexScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReindexScope::Kind(kind) => kind.fmt(f),
            ReindexScope::All => f.write_str("all"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReindexReport {
    pub total: usize,
    pub created: usize,
    /// Already embedded, or nothing to embed
    pub skipped: usize,
    pub failed: usize,
}

pub struct ReindexTool {
    db: Arc<MemoryDatabase>,
    index: Arc<EmbeddingIndex>,
}

impl ReindexTool {
    pub fn new(db: Arc<MemoryDatabase>, index: Arc<EmbeddingIndex>) -> Self {
        Self { db, index }
    }

    pub async fn reindex(&self, scope: ReindexScope) -> Result<ReindexReport> {
        let model = self.index.model_id().to_string();
        let records = self.db.summaries.list(&scope.kinds())?;
        let mut report = ReindexReport { total: records.len(), ..Default::default() };

        for record in records {
            if self.db.embeddings.exists(record.id, &model)? {
                report.skipped += 1;
                continue;
            }

            let text = match serde_json::from_str::<Value>(&record.body) {
                Ok(body) => index_text(&body),
                Err(e) => {
                    warn!("{} {} has a corrupt body: {}", record.kind, record.period_key, e);
                    report.failed += 1;
                    continue;
                }
            };
            if text.trim().is_empty() {
                warn!("{} {} has no index text", record.kind, record.period_key);
                report.skipped += 1;
                continue;
            }

            match self.index.ensure_for(record.id, &text).await {
                Ok(EmbedOutcome::Created { .. }) => report.created += 1,
                Ok(EmbedOutcome::Existing) => report.skipped += 1,
                Err(e) => {
                    warn!("Embedding {} {} failed: {}", record.kind, record.period_key, e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "Reindex {} with {}: total={} created={} skipped={} failed={}",
            scope, model, report.total, report.created, report.skipped, report.failed
        );
        Ok(report)
    }
}
