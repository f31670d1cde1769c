//! Daily, weekly and monthly rollups
//!
//! `ensure` produces the summary of one period at most once: it gathers the
//! period's source material, slims and chunks it to the byte budget, asks the
//! completion service for one summary per chunk, merges the partials when
//! there is more than one, and persists the validated result. Nothing is
//! written unless every completion in the call succeeded and validated.

pub mod chunker;
pub mod facts;
pub mod prompts;

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::Result;
use crate::index::EmbeddingIndex;
use crate::llm::CompletionService;
use crate::log_store::{self, RawRecord};
use crate::memory_db::{MemoryDatabase, NewSummary, SummaryRecord};
use crate::period::{Period, SummaryKind};
use crate::summary::{DailyDigest, SummaryBody, WeeklyDigest};

pub use facts::extract_user_facts;
pub use prompts::PromptSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RollupOutcome {
    /// A summary already existed and nothing was done
    Existing,
    /// The period has no source material; no summary was created
    NoSource,
    Created { id: i64, chunks: usize },
}

/// Chunked source material of one period
struct Material {
    chunks: Vec<String>,
    /// Raw turns of the day, for fact extraction (daily only)
    records: Vec<RawRecord>,
    source_path: PathBuf,
}

pub struct RollupEngine {
    config: Config,
    db: Arc<MemoryDatabase>,
    completions: Arc<dyn CompletionService>,
    index: Arc<EmbeddingIndex>,
    prompts: PromptSet,
}

impl RollupEngine {
    pub fn new(
        config: Config,
        db: Arc<MemoryDatabase>,
        completions: Arc<dyn CompletionService>,
        index: Arc<EmbeddingIndex>,
    ) -> Self {
        let prompts = PromptSet::load(&config.prompt_dir);
        Self { config, db, completions, index, prompts }
    }

    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = prompts;
        self
    }

    /// Path of the pretty-printed copy of a summary
    pub fn rendering_path(&self, period: &Period) -> PathBuf {
        self.config.log_dir.join(format!("{}.{}.json", period.key, period.kind))
    }

    pub async fn ensure(&self, kind: SummaryKind, period_key: &str, force: bool) -> Result<RollupOutcome> {
        let period = Period::parse(kind, period_key)?;
        self.ensure_period(&period, force).await
    }

    pub async fn ensure_period(&self, period: &Period, force: bool) -> Result<RollupOutcome> {
        if force {
            self.db.summaries.delete(period.kind, &period.key)?;
            self.remove_rendering(period);
        } else if self.db.summaries.exists(period.kind, &period.key)? {
            debug!("{} summary {} already exists", period.kind, period.key);
            return Ok(RollupOutcome::Existing);
        }

        let Some(material) = self.gather(period)? else {
            debug!("No source material for {} {}", period.kind, period.key);
            return Ok(RollupOutcome::NoSource);
        };
        let chunks = material.chunks.len();
        info!("Summarizing {} {} from {} chunk(s)", period.kind, period.key, chunks);

        let mut body = self.summarize(period, &material.chunks).await?;
        body.stamp_period(period);
        if let SummaryBody::Daily(daily) = &mut body {
            daily.user_facts_explicit = extract_user_facts(&material.records);
        }

        let body_json = body.to_json()?;
        let index_text = body.index_text();
        let source_path = material.source_path.to_string_lossy();
        let id = self.db.summaries.upsert(&NewSummary {
            kind: period.kind,
            period_key: &period.key,
            start_date: &period.start_str(),
            end_date: &period.end_str(),
            body: &body_json,
            index_text: &index_text,
            source_path: &source_path,
        })?;
        info!("Stored {} summary {} (id {})", period.kind, period.key, id);

        self.write_rendering(period, &body);

        if let Err(e) = self.index.ensure_for(id, &index_text).await {
            warn!("Embedding {} {} failed, reindex will retry: {}", period.kind, period.key, e);
        }

        Ok(RollupOutcome::Created { id, chunks })
    }

    fn gather(&self, period: &Period) -> Result<Option<Material>> {
        let budget = self.config.max_chunk_bytes;
        let material = match period.kind {
            SummaryKind::Daily => {
                let Some(raw) = log_store::read_day_text(&self.config.log_dir, period.start)? else {
                    return Ok(None);
                };
                Material {
                    chunks: chunker::split_lines(&raw, budget),
                    records: log_store::parse_records(&raw),
                    source_path: log_store::day_file(&self.config.log_dir, period.start),
                }
            }
            SummaryKind::Weekly => {
                let dailies = self.source_bodies(SummaryKind::Daily, period)?;
                let digests: Vec<DailyDigest<'_>> = dailies
                    .iter()
                    .filter_map(|b| match b {
                        SummaryBody::Daily(d) => Some(DailyDigest::from(d)),
                        _ => None,
                    })
                    .collect();
                if digests.is_empty() {
                    return Ok(None);
                }
                Material {
                    chunks: chunker::split_json_items(&digests, budget)?,
                    records: Vec::new(),
                    source_path: self.rendering_path(period),
                }
            }
            SummaryKind::Monthly => {
                let weeklies = self.source_bodies(SummaryKind::Weekly, period)?;
                let digests: Vec<WeeklyDigest<'_>> = weeklies
                    .iter()
                    .filter_map(|b| match b {
                        SummaryBody::Weekly(w) => Some(WeeklyDigest::from(w)),
                        _ => None,
                    })
                    .collect();
                if digests.is_empty() {
                    return Ok(None);
                }
                Material {
                    chunks: chunker::split_json_items(&digests, budget)?,
                    records: Vec::new(),
                    source_path: self.rendering_path(period),
                }
            }
        };
        if material.chunks.is_empty() {
            return Ok(None);
        }
        Ok(Some(material))
    }

    /// Stored bodies of `kind` overlapping the period, oldest first
    fn source_bodies(&self, kind: SummaryKind, period: &Period) -> Result<Vec<SummaryBody>> {
        self.db
            .summaries
            .range_query(kind, period.start, period.end)?
            .iter()
            .map(|record: &SummaryRecord| SummaryBody::from_stored(kind, &record.body))
            .collect()
    }

    /// Map each chunk to a partial summary, then reduce when there are several
    async fn summarize(&self, period: &Period, chunks: &[String]) -> Result<SummaryBody> {
        let parts = chunks.len();
        let mut partials = Vec::with_capacity(parts);
        for (i, chunk) in chunks.iter().enumerate() {
            let prompt = self.prompts.render(period, chunk, i + 1, parts);
            let output = self.completions.complete_prompt(&prompt).await?;
            let body = SummaryBody::parse_model_output(period.kind, &output)?;
            debug!("{} {} part {}/{} summarized", period.kind, period.key, i + 1, parts);
            partials.push(body);
        }

        if partials.len() == 1 {
            if let Some(body) = partials.pop() {
                return Ok(body);
            }
        }

        let partial_json = partials.iter().map(SummaryBody::to_json).collect::<Result<Vec<_>>>()?;
        let prompt = prompts::merge_prompt(period, &partial_json);
        let output = self.completions.complete_prompt(&prompt).await?;
        SummaryBody::parse_model_output(period.kind, &output)
    }

    fn write_rendering(&self, period: &Period, body: &SummaryBody) {
        let path = self.rendering_path(period);
        let write = || -> Result<()> {
            let json = body.to_pretty_json()?;
            fs::create_dir_all(&self.config.log_dir)?;
            fs::write(&path, json)?;
            Ok(())
        };
        if let Err(e) = write() {
            warn!("Failed to write {}: {}", path.display(), e);
        }
    }

    fn remove_rendering(&self, period: &Period) {
        let path = self.rendering_path(period);
        match fs::remove_file(&path) {
            Ok(()) => debug!("Removed {}", path.display()),
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove {}: {}", path.display(), e),
        }
    }
}
