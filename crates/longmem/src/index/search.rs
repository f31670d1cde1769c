//! Cosine-similarity search over stored summary vectors
//!
//! A linear scan over every vector of the configured model. Rows that cannot
//! be scored (dimension mismatch, zero norm, short blob, non-finite score)
//! are left out of the results rather than failing the query.

use serde::Serialize;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::debug;

use super::vector;
use crate::error::Result;
use crate::llm::EmbeddingService;
use crate::memory_db::MemoryDatabase;
use crate::period::SummaryKind;
use crate::summary::SummaryBody;

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub score: f64,
    pub kind: SummaryKind,
    pub period_key: String,
    /// Readable rendering of the matched summary
    pub text: String,
}

#[derive(Default)]
struct Excluded {
    dimension: usize,
    zero_norm: usize,
    short_blob: usize,
    non_finite: usize,
}

pub struct SearchEngine {
    db: Arc<MemoryDatabase>,
    service: Arc<dyn EmbeddingService>,
}

impl SearchEngine {
    pub fn new(db: Arc<MemoryDatabase>, service: Arc<dyn EmbeddingService>) -> Self {
        Self { db, service }
    }

    pub async fn search(&self, query: &str, top_k: usize, min_score: f64) -> Result<Vec<SearchHit>> {
        let query = query.trim();
        if query.is_empty() || top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vec = self.service.embed(query).await?;
        let query_norm = vector::l2_norm(&query_vec);
        if query_vec.is_empty() || query_norm == 0.0 {
            debug!("Query embedding has zero norm; nothing to rank");
            return Ok(Vec::new());
        }

        let candidates = self.db.embeddings.candidates(self.service.model_id())?;
        let scanned = candidates.len();
        let mut excluded = Excluded::default();
        let mut hits = Vec::new();

        for candidate in candidates {
            if candidate.dim != query_vec.len() {
                excluded.dimension += 1;
                continue;
            }
            if candidate.l2_norm == 0.0 || !candidate.l2_norm.is_finite() {
                excluded.zero_norm += 1;
                continue;
            }
            let Some(stored) = vector::decode(&candidate.vector, candidate.dim) else {
                excluded.short_blob += 1;
                continue;
            };
            let Some(score) = vector::cosine(&query_vec, query_norm, &stored, candidate.l2_norm) else {
                excluded.non_finite += 1;
                continue;
            };
            if score < min_score {
                continue;
            }

            let text = match SummaryBody::from_stored(candidate.kind, &candidate.body) {
                Ok(body) => body.human_text(),
                Err(_) => format!("summary type: {}", candidate.kind),
            };
            hits.push(SearchHit { score, kind: candidate.kind, period_key: candidate.period_key, text });
        }

        debug!(
            "Scanned {} vectors; excluded {} dimension mismatch, {} zero norm, {} short blob, {} non-finite",
            scanned, excluded.dimension, excluded.zero_norm, excluded.short_blob, excluded.non_finite
        );

        hits.sort_by(compare_hits);
        hits.truncate(top_k);
        Ok(hits)
    }
}

/// Higher score first; ties go to the more recent period key
fn compare_hits(a: &SearchHit, b: &SearchHit) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| b.period_key.cmp(&a.period_key))
        .then_with(|| a.kind.cmp(&b.kind))
}
