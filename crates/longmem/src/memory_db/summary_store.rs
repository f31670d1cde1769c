//! Summary storage and retrieval operations
use chrono::{NaiveDate, Utc};
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row};
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::Result;
use crate::memory_db::schema::{NewSummary, SummaryRecord};
use crate::period::{SummaryKind, DATE_FORMAT};
use crate::summary::SummaryBody;

const SUMMARY_COLUMNS: &str =
    "id, type, period_key, start_date, end_date, body, index_text, source_path, created_at";

/// Persisted summaries, one row per (type, period_key)
pub struct SummaryStore {
    pool: Arc<Pool<SqliteConnectionManager>>,
}

impl SummaryStore {
    pub fn new(pool: Arc<Pool<SqliteConnectionManager>>) -> Self {
        Self { pool }
    }

    fn get_conn(&self) -> Result<r2d2::PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    pub fn exists(&self, kind: SummaryKind, period_key: &str) -> Result<bool> {
        let conn = self.get_conn()?;
        let found = conn
            .query_row(
                "SELECT 1 FROM summaries WHERE type = ?1 AND period_key = ?2",
                params![kind, period_key],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Insert or replace the summary for (type, period_key); returns its id.
    ///
    /// On conflict the body, index text, source path and date range are
    /// replaced in place, so the row id and its embeddings survive.
    pub fn upsert(&self, summary: &NewSummary<'_>) -> Result<i64> {
        let conn = self.get_conn()?;

        debug!("Upserting {} summary {}", summary.kind, summary.period_key);

        let id = conn.query_row(
            "INSERT INTO summaries
             (type, period_key, start_date, end_date, body, index_text, source_path, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(type, period_key) DO UPDATE SET
                start_date = excluded.start_date,
                end_date = excluded.end_date,
                body = excluded.body,
                index_text = excluded.index_text,
                source_path = excluded.source_path
             RETURNING id",
            params![
                summary.kind,
                summary.period_key,
                summary.start_date,
                summary.end_date,
                summary.body,
                summary.index_text,
                summary.source_path,
                Utc::now().to_rfc3339(),
            ],
            |row| row.get(0),
        )?;

        Ok(id)
    }

    pub fn get(&self, kind: SummaryKind, period_key: &str) -> Result<Option<SummaryRecord>> {
        let conn = self.get_conn()?;
        let record = conn
            .query_row(
                &format!("SELECT {} FROM summaries WHERE type = ?1 AND period_key = ?2", SUMMARY_COLUMNS),
                params![kind, period_key],
                row_to_summary,
            )
            .optional()?;
        Ok(record)
    }

    pub fn get_by_id(&self, id: i64) -> Result<Option<SummaryRecord>> {
        let conn = self.get_conn()?;
        let record = conn
            .query_row(
                &format!("SELECT {} FROM summaries WHERE id = ?1", SUMMARY_COLUMNS),
                [id],
                row_to_summary,
            )
            .optional()?;
        Ok(record)
    }

    pub fn id_of(&self, kind: SummaryKind, period_key: &str) -> Result<Option<i64>> {
        let conn = self.get_conn()?;
        let id = conn
            .query_row(
                "SELECT id FROM summaries WHERE type = ?1 AND period_key = ?2",
                params![kind, period_key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    /// Decode the stored body of a summary, if present
    pub fn load_body(&self, kind: SummaryKind, period_key: &str) -> Result<Option<SummaryBody>> {
        match self.get(kind, period_key)? {
            Some(record) => Ok(Some(SummaryBody::from_stored(kind, &record.body)?)),
            None => Ok(None),
        }
    }

    /// Summaries of `kind` whose date range overlaps `[start, end]`, ordered
    /// by start date ascending
    pub fn range_query(&self, kind: SummaryKind, start: NaiveDate, end: NaiveDate) -> Result<Vec<SummaryRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM summaries
             WHERE type = ?1 AND start_date <= ?2 AND end_date >= ?3
             ORDER BY start_date ASC, period_key ASC",
            SUMMARY_COLUMNS
        ))?;

        let rows = stmt.query_map(
            params![kind, end.format(DATE_FORMAT).to_string(), start.format(DATE_FORMAT).to_string()],
            row_to_summary,
        )?;
        let records = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(records)
    }

    /// All summaries of the given kinds, oldest first
    pub fn list(&self, kinds: &[SummaryKind]) -> Result<Vec<SummaryRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM summaries WHERE type = ?1 ORDER BY start_date ASC, period_key ASC",
            SUMMARY_COLUMNS
        ))?;

        let mut records = Vec::new();
        for kind in kinds {
            let rows = stmt.query_map([kind], row_to_summary)?;
            for row in rows {
                records.push(row?);
            }
        }
        Ok(records)
    }

    /// Delete a summary and its embeddings in one transaction; returns
    /// whether a summary row existed
    pub fn delete(&self, kind: SummaryKind, period_key: &str) -> Result<bool> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction()?;

        let vectors = tx.execute(
            "DELETE FROM embeddings WHERE summary_id IN
             (SELECT id FROM summaries WHERE type = ?1 AND period_key = ?2)",
            params![kind, period_key],
        )?;
        let deleted = tx.execute(
            "DELETE FROM summaries WHERE type = ?1 AND period_key = ?2",
            params![kind, period_key],
        )?;
        tx.commit()?;

        if deleted > 0 {
            info!("Deleted {} summary {} ({} embeddings)", kind, period_key, vectors);
        }
        Ok(deleted > 0)
    }
}

fn row_to_summary(row: &Row) -> rusqlite::Result<SummaryRecord> {
    Ok(SummaryRecord {
        id: row.get(0)?,
        kind: row.get(1)?,
        period_key: row.get(2)?,
        start_date: row.get(3)?,
        end_date: row.get(4)?,
        body: row.get(5)?,
        index_text: row.get(6)?,
        source_path: row.get(7)?,
        created_at: row.get(8)?,
    })
}
