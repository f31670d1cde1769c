//! Row types for the memory database
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;

use crate::period::SummaryKind;

/// A persisted summary row
#[derive(Debug, Clone, Serialize)]
pub struct SummaryRecord {
    pub id: i64,
    pub kind: SummaryKind,
    pub period_key: String,
    pub start_date: String,
    pub end_date: String,
    /// JSON document, tagged with its `type`
    pub body: String,
    pub index_text: String,
    pub source_path: String,
    pub created_at: String,
}

/// Values written by an upsert
#[derive(Debug, Clone)]
pub struct NewSummary<'a> {
    pub kind: SummaryKind,
    pub period_key: &'a str,
    pub start_date: &'a str,
    pub end_date: &'a str,
    pub body: &'a str,
    pub index_text: &'a str,
    pub source_path: &'a str,
}

/// A persisted embedding row; `vector` is the raw little-endian blob
#[derive(Debug, Clone)]
pub struct StoredEmbedding {
    pub id: i64,
    pub summary_id: i64,
    pub model: String,
    pub dim: usize,
    pub vector: Vec<u8>,
    pub l2_norm: f64,
    pub created_at: String,
}

/// An embedding joined with the summary that owns it, as scanned by search
#[derive(Debug, Clone)]
pub struct EmbeddingCandidate {
    pub summary_id: i64,
    pub kind: SummaryKind,
    pub period_key: String,
    pub body: String,
    pub dim: usize,
    pub vector: Vec<u8>,
    pub l2_norm: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DatabaseStats {
    pub daily_summaries: i64,
    pub weekly_summaries: i64,
    pub monthly_summaries: i64,
    pub total_embeddings: i64,
    pub database_size_bytes: i64,
}

impl ToSql for SummaryKind {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for SummaryKind {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        let s = value.as_str()?;
        s.parse().map_err(|e| FromSqlError::Other(Box::new(e)))
    }
}
