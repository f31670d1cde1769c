//! Append-only per-day conversation log
//!
//! One newline-delimited JSON file per local calendar day,
//! `<log_dir>/YYYY-MM-DD.jsonl`. When the day advances, the rollups for the
//! day, week and month that just closed run before the first write of the
//! new day, followed by an archive sweep. Those steps are best-effort.

use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::archive::ArchiveManager;
use crate::config::Config;
use crate::error::Result;
use crate::period::{month_key, week_key, SummaryKind, DATE_FORMAT};
use crate::rollup::RollupEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    #[serde(other)]
    Other,
}

/// One conversation turn as stored in the day log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub role: Role,
    pub content: String,
}

impl RawRecord {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Path of the raw log for `date`
pub fn day_file(log_dir: &Path, date: NaiveDate) -> PathBuf {
    log_dir.join(format!("{}.jsonl", date.format(DATE_FORMAT)))
}

/// Date of a raw day log file name (`YYYY-MM-DD.jsonl`)
pub fn parse_day_file_name(name: &str) -> Option<NaiveDate> {
    let stem = name.strip_suffix(".jsonl")?;
    NaiveDate::parse_from_str(stem, DATE_FORMAT).ok()
}

/// Raw text of a day's log; `None` when the file is absent
pub fn read_day_text(log_dir: &Path, date: NaiveDate) -> Result<Option<String>> {
    match fs::read(day_file(log_dir, date)) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// Parse the records of a day log, skipping lines that are not records
pub fn parse_records(text: &str) -> Vec<RawRecord> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| match serde_json::from_str(line) {
            Ok(record) => Some(record),
            Err(e) => {
                debug!("Skipping unreadable log line: {}", e);
                None
            }
        })
        .collect()
}

pub fn read_day(log_dir: &Path, date: NaiveDate) -> Result<Vec<RawRecord>> {
    Ok(read_day_text(log_dir, date)?.map(|text| parse_records(&text)).unwrap_or_default())
}

struct OpenDay {
    date: NaiveDate,
    file: File,
}

pub struct LogStore {
    config: Config,
    rollups: Arc<RollupEngine>,
    archive: Arc<ArchiveManager>,
    current: Mutex<Option<OpenDay>>,
}

impl LogStore {
    pub fn new(config: Config, rollups: Arc<RollupEngine>, archive: Arc<ArchiveManager>) -> Self {
        Self { config, rollups, archive, current: Mutex::new(None) }
    }

    /// Append a record to today's log (local calendar day)
    pub async fn append(&self, record: &RawRecord) -> Result<()> {
        self.append_on(Local::now().date_naive(), record).await
    }

    /// Append a record to the log of `today`.
    ///
    /// The first append after a restart treats the most recent earlier day
    /// file as the previous day, so boundaries crossed while the process was
    /// down still roll up.
    pub async fn append_on(&self, today: NaiveDate, record: &RawRecord) -> Result<()> {
        let mut current = self.current.lock().await;

        let previous = match current.as_ref() {
            Some(open) => Some(open.date),
            None => self.last_logged_day_before(today),
        };
        if let Some(previous) = previous.filter(|d| *d < today) {
            *current = None;
            self.on_day_boundary(previous, today).await;
        }

        if current.as_ref().map(|open| open.date) != Some(today) {
            fs::create_dir_all(&self.config.log_dir)?;
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(day_file(&self.config.log_dir, today))?;
            *current = Some(OpenDay { date: today, file });
        }

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');
        if let Some(open) = current.as_mut() {
            open.file.write_all(&line)?;
            open.file.flush()?;
        }
        Ok(())
    }

    /// Records of `date`, oldest first
    pub fn read_day(&self, date: NaiveDate) -> Result<Vec<RawRecord>> {
        read_day(&self.config.log_dir, date)
    }

    /// The last `n` records of `date`
    pub fn tail(&self, date: NaiveDate, n: usize) -> Result<Vec<RawRecord>> {
        let mut records = self.read_day(date)?;
        let skip = records.len().saturating_sub(n);
        records.drain(..skip);
        Ok(records)
    }

    async fn on_day_boundary(&self, previous: NaiveDate, today: NaiveDate) {
        info!("Day boundary crossed: {} -> {}", previous, today);

        let day_key = previous.format(DATE_FORMAT).to_string();
        if let Err(e) = self.rollups.ensure(SummaryKind::Daily, &day_key, false).await {
            warn!("Daily rollup for {} failed: {}", day_key, e);
        }

        let previous_week = week_key(previous);
        if previous_week != week_key(today) {
            if let Err(e) = self.rollups.ensure(SummaryKind::Weekly, &previous_week, false).await {
                warn!("Weekly rollup for {} failed: {}", previous_week, e);
            }
        }

        let previous_month = month_key(previous);
        if previous_month != month_key(today) {
            if let Err(e) = self.rollups.ensure(SummaryKind::Monthly, &previous_month, false).await {
                warn!("Monthly rollup for {} failed: {}", previous_month, e);
            }
        }

        match self.archive.sweep(today) {
            Ok(report) if report.archived > 0 || report.failed > 0 => {
                info!("Archive sweep: {} archived, {} failed", report.archived, report.failed)
            }
            Ok(_) => {}
            Err(e) => warn!("Archive sweep failed: {}", e),
        }
    }

    fn last_logged_day_before(&self, today: NaiveDate) -> Option<NaiveDate> {
        let entries = match fs::read_dir(&self.config.log_dir) {
            Ok(entries) => entries,
            Err(e) => {
                if e.kind() != ErrorKind::NotFound {
                    warn!("Failed to list {}: {}", self.config.log_dir.display(), e);
                }
                return None;
            }
        };
        entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| parse_day_file_name(&entry.file_name().to_string_lossy()))
            .filter(|date| *date < today)
            .max()
    }
}
