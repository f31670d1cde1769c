//! Cold storage for raw day logs
//!
//! A day file older than the retention window moves into its month's bundle,
//! `<archive_dir>/YYYY-MM.jsonl.gz`, once its daily summary exists. Each
//! archived day is appended as its own gzip member named after the day file,
//! so a bundle only grows and a day already inside it is never written twice.

use chrono::{Days, NaiveDate};
use flate2::bufread::GzDecoder;
use flate2::read::MultiGzDecoder;
use flate2::{Compression, GzBuilder};
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::log_store::parse_day_file_name;
use crate::memory_db::MemoryDatabase;
use crate::period::{month_key, SummaryKind, DATE_FORMAT};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArchiveReport {
    pub archived: usize,
    /// Old enough, but no daily summary yet
    pub awaiting_summary: usize,
    pub failed: usize,
}

pub struct ArchiveManager {
    config: Config,
    db: Arc<MemoryDatabase>,
}

impl ArchiveManager {
    pub fn new(config: Config, db: Arc<MemoryDatabase>) -> Self {
        Self { config, db }
    }

    pub fn bundle_path(&self, date: NaiveDate) -> PathBuf {
        self.config.archive_dir.join(format!("{}.jsonl.gz", month_key(date)))
    }

    /// Archive every day file dated strictly before
    /// `today - keep_raw_days` whose daily summary exists
    pub fn sweep(&self, today: NaiveDate) -> Result<ArchiveReport> {
        let mut report = ArchiveReport::default();
        let Some(cutoff) = today.checked_sub_days(Days::new(u64::from(self.config.keep_raw_days))) else {
            debug!("Retention of {} days reaches past the calendar; nothing to archive", self.config.keep_raw_days);
            return Ok(report);
        };

        let entries = match fs::read_dir(&self.config.log_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(report),
            Err(e) => return Err(e.into()),
        };

        let mut days: Vec<(NaiveDate, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let date = parse_day_file_name(&entry.file_name().to_string_lossy())?;
                Some((date, entry.path()))
            })
            .filter(|(date, _)| *date < cutoff)
            .collect();
        days.sort();

        for (date, path) in days {
            let key = date.format(DATE_FORMAT).to_string();
            match self.db.summaries.exists(SummaryKind::Daily, &key) {
                Ok(true) => {}
                Ok(false) => {
                    debug!("Keeping {}: no daily summary yet", path.display());
                    report.awaiting_summary += 1;
                    continue;
                }
                Err(e) => {
                    warn!("Skipping {}: summary lookup failed: {}", path.display(), e);
                    report.failed += 1;
                    continue;
                }
            }

            let bundle = self.bundle_path(date);
            match archive_day(&path, &bundle) {
                Ok(()) => {
                    if let Err(e) = fs::remove_file(&path) {
                        warn!("Archived {} but could not remove it: {}", path.display(), e);
                        report.failed += 1;
                        continue;
                    }
                    info!("Archived {} into {}", path.display(), bundle.display());
                    report.archived += 1;
                }
                Err(e) => {
                    warn!("Failed to archive {}: {}", path.display(), e);
                    report.failed += 1;
                }
            }
        }

        Ok(report)
    }
}

/// Copy a day file into its bundle unless an identical member for the same
/// day is already there (left behind when a previous removal failed)
fn archive_day(source: &Path, bundle: &Path) -> std::io::Result<()> {
    let mut contents = fs::read(source)?;
    if !contents.is_empty() && !contents.ends_with(b"\n") {
        contents.push(b'\n');
    }
    let name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if bundle_has_member(bundle, &name, &contents)? {
        debug!("{} is already in {}", name, bundle.display());
        return Ok(());
    }
    append_member(bundle, &name, &contents)
}

/// Append one gzip member. A failed write is cut back off so the bundle
/// stays readable.
fn append_member(bundle: &Path, name: &str, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = bundle.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(bundle)?;
    let start = file.metadata()?.len();

    let written = write_member(&file, name, contents);
    if written.is_err() {
        if let Err(e) = file.set_len(start) {
            warn!("Could not roll back partial write to {}: {}", bundle.display(), e);
        }
    }
    written
}

fn write_member(file: &File, name: &str, contents: &[u8]) -> std::io::Result<()> {
    let mut encoder = GzBuilder::new().filename(name).write(file, Compression::default());
    encoder.write_all(contents)?;
    encoder.finish()?;
    file.sync_all()
}

fn bundle_has_member(bundle: &Path, name: &str, contents: &[u8]) -> std::io::Result<bool> {
    let file = match File::open(bundle) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };
    let mut reader = BufReader::new(file);
    while !reader.fill_buf()?.is_empty() {
        let mut decoder = GzDecoder::new(reader);
        let mut member = Vec::new();
        decoder.read_to_end(&mut member)?;
        let same_day = decoder
            .header()
            .and_then(|h| h.filename())
            .is_some_and(|f| f == name.as_bytes());
        if same_day && member == contents {
            return Ok(true);
        }
        reader = decoder.into_inner();
    }
    Ok(false)
}

/// Decompressed contents of a monthly bundle
pub fn read_bundle(path: &Path) -> Result<String> {
    let mut text = String::new();
    MultiGzDecoder::new(fs::File::open(path)?).read_to_string(&mut text)?;
    Ok(text)
}
