//! Embedding storage: one packed vector per (summary, model)
use chrono::Utc;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::error::{MemoryError, Result};
use crate::index::vector;
use crate::memory_db::schema::{EmbeddingCandidate, StoredEmbedding};

#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingStats {
    pub model: String,
    pub total_embeddings: usize,
    /// Distinct stored dimensions for the model; more than one means the
    /// model changed output size and older rows are skipped by search
    pub dimensions: Vec<usize>,
}

pub struct EmbeddingStore {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl EmbeddingStore {
    pub fn new(pool: Arc<Pool<SqliteConnectionManager>>) -> Self {
        Self { pool }
    }

    fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    pub fn exists(&self, summary_id: i64, model: &str) -> Result<bool> {
        let conn = self.get_conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM embeddings WHERE summary_id = ?1 AND model = ?2",
                params![summary_id, model],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Store a vector for (summary, model). An existing row for the pair is
    /// kept untouched; returns whether a row was written.
    pub fn insert(&self, summary_id: i64, model: &str, embedding: &[f32]) -> Result<bool> {
        if embedding.is_empty() {
            return Err(MemoryError::validation("refusing to store an empty embedding"));
        }
        let norm = vector::l2_norm(embedding);
        let conn = self.get_conn()?;
        let written = conn.execute(
            "INSERT INTO embeddings (summary_id, model, dim, vector, l2_norm, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(summary_id, model) DO NOTHING",
            params![
                summary_id,
                model,
                embedding.len() as i64,
                vector::encode(embedding),
                norm,
                Utc::now().to_rfc3339(),
            ],
        )?;
        debug!("Stored {}-dim embedding for summary {} ({})", embedding.len(), summary_id, model);
        Ok(written > 0)
    }

    pub fn get(&self, summary_id: i64, model: &str) -> Result<Option<StoredEmbedding>> {
        let conn = self.get_conn()?;
        let row = conn
            .query_row(
                "SELECT id, summary_id, model, dim, vector, l2_norm, created_at
                 FROM embeddings WHERE summary_id = ?1 AND model = ?2",
                params![summary_id, model],
                row_to_embedding,
            )
            .optional()?;
        Ok(row)
    }

    /// Every stored vector for `model` joined with its owning summary
    pub fn candidates(&self, model: &str) -> Result<Vec<EmbeddingCandidate>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT s.id, s.type, s.period_key, s.body, e.dim, e.vector, e.l2_norm
             FROM embeddings e
             JOIN summaries s ON s.id = e.summary_id
             WHERE e.model = ?1",
        )?;
        let rows = stmt.query_map([model], |row| {
            Ok(EmbeddingCandidate {
                summary_id: row.get(0)?,
                kind: row.get(1)?,
                period_key: row.get(2)?,
                body: row.get(3)?,
                dim: dim_from_row(row, 4)?,
                vector: row.get(5)?,
                l2_norm: row.get(6)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }

    pub fn delete_for_summary(&self, summary_id: i64) -> Result<usize> {
        let conn = self.get_conn()?;
        Ok(conn.execute("DELETE FROM embeddings WHERE summary_id = ?1", [summary_id])?)
    }

    pub fn get_stats(&self, model: &str) -> Result<EmbeddingStats> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM embeddings WHERE model = ?1",
            [model],
            |row| row.get(0),
        )?;
        let mut stmt = conn.prepare("SELECT DISTINCT dim FROM embeddings WHERE model = ?1 ORDER BY dim")?;
        let dimensions = stmt
            .query_map([model], |row| dim_from_row(row, 0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(EmbeddingStats { model: model.to_string(), total_embeddings: count as usize, dimensions })
    }
}

fn dim_from_row(row: &Row, idx: usize) -> rusqlite::Result<usize> {
    let dim: i64 = row.get(idx)?;
    usize::try_from(dim).map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Integer, Box::new(e)))
}

fn row_to_embedding(row: &Row) -> rusqlite::Result<StoredEmbedding> {
    Ok(StoredEmbedding {
        id: row.get(0)?,
        summary_id: row.get(1)?,
        model: row.get(2)?,
        dim: dim_from_row(row, 3)?,
        vector: row.get(4)?,
        l2_norm: row.get(5)?,
        created_at: row.get(6)?,
    })
}
