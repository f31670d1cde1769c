#![allow(dead_code)]

use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use longmem::error::{MemoryError, Result};
use longmem::log_store::{day_file, RawRecord};
use longmem::memory_db::NewSummary;
use longmem::{ChatMessage, CompletionService, Config, EmbeddingService, MemoryDatabase, MemoryEngine, Period};

pub const EMBED_MODEL: &str = "test-embed";

pub const DAILY_JSON: &str = r#"{"topics":["running","rust"],"patterns":["morning focus"],"open_questions":[],"highlights":["ran 5k"],"lowlights":[]}"#;

/// Completion fake: answers from a script, then from a fallback if set.
/// With neither it fails like an unreachable server.
#[derive(Default)]
pub struct FakeCompletions {
    script: Mutex<VecDeque<Result<String>>>,
    fallback: Mutex<Option<String>>,
    pub requests: Mutex<Vec<Vec<ChatMessage>>>,
    calls: AtomicUsize,
}

impl FakeCompletions {
    pub fn answering(fallback: &str) -> Arc<Self> {
        let fake = Self::default();
        *fake.fallback.lock().unwrap() = Some(fallback.to_string());
        Arc::new(fake)
    }

    pub fn unreachable() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, response: Result<String>) {
        self.script.lock().unwrap().push_back(response);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Text of the last message of every request, in order
    pub fn prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter_map(|messages| messages.last().map(|m| m.content.clone()))
            .collect()
    }
}

#[async_trait]
impl CompletionService for FakeCompletions {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(messages.to_vec());
        if let Some(response) = self.script.lock().unwrap().pop_front() {
            return response;
        }
        match self.fallback.lock().unwrap().clone() {
            Some(text) => Ok(text),
            None => Err(MemoryError::transport("connection refused")),
        }
    }
}

/// Embedding fake: the vector of the first rule whose needle occurs in the
/// text, else the default vector
pub struct FakeEmbeddings {
    rules: Mutex<Vec<(String, Vec<f32>)>>,
    default: Vec<f32>,
    calls: AtomicUsize,
}

impl FakeEmbeddings {
    pub fn new(default: Vec<f32>) -> Arc<Self> {
        Arc::new(Self { rules: Mutex::new(Vec::new()), default, calls: AtomicUsize::new(0) })
    }

    pub fn rule(&self, needle: &str, vector: Vec<f32>) {
        self.rules.lock().unwrap().push((needle.to_string(), vector));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EmbeddingService for FakeEmbeddings {
    fn model_id(&self) -> &str {
        EMBED_MODEL
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let rules = self.rules.lock().unwrap();
        let vector = rules
            .iter()
            .find(|(needle, _)| text.contains(needle.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| self.default.clone());
        Ok(vector)
    }
}

pub struct Harness {
    pub dir: tempfile::TempDir,
    pub engine: MemoryEngine,
    pub completions: Arc<FakeCompletions>,
    pub embeddings: Arc<FakeEmbeddings>,
}

pub fn config_in(dir: &Path) -> Config {
    let mut config = Config::with_home(dir);
    config.embed_model = EMBED_MODEL.to_string();
    config
}

pub fn harness(completions: Arc<FakeCompletions>) -> Harness {
    harness_with(completions, |_| {})
}

pub fn harness_with(completions: Arc<FakeCompletions>, adjust: impl FnOnce(&mut Config)) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config_in(dir.path());
    adjust(&mut config);
    config.ensure_dirs().unwrap();

    let db = Arc::new(MemoryDatabase::new_in_memory().unwrap());
    let embeddings = FakeEmbeddings::new(vec![1.0, 0.0, 0.0]);
    let engine = MemoryEngine::with_services(config, db, completions.clone(), embeddings.clone());
    Harness { dir, engine, completions, embeddings }
}

/// Like `harness`, but the database lives at `config.db_path` so tests can
/// reach the raw tables through their own connection.
pub fn file_harness(completions: Arc<FakeCompletions>) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let config = config_in(dir.path());
    config.ensure_dirs().unwrap();

    let db = Arc::new(MemoryDatabase::new(&config.db_path).unwrap());
    let embeddings = FakeEmbeddings::new(vec![1.0, 0.0, 0.0]);
    let engine = MemoryEngine::with_services(config, db, completions.clone(), embeddings.clone());
    Harness { dir, engine, completions, embeddings }
}

pub fn date(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
}

pub fn write_day(log_dir: &Path, day: &str, records: &[RawRecord]) {
    fs::create_dir_all(log_dir).unwrap();
    let lines: Vec<String> = records.iter().map(|r| serde_json::to_string(r).unwrap()).collect();
    fs::write(day_file(log_dir, date(day)), lines.join("\n") + "\n").unwrap();
}

/// Store a summary row directly and return its id
pub fn store_summary(db: &MemoryDatabase, period: &Period, body: &serde_json::Value) -> i64 {
    let body_json = body.to_string();
    let index_text = longmem::summary::index_text(body);
    db.summaries
        .upsert(&NewSummary {
            kind: period.kind,
            period_key: &period.key,
            start_date: &period.start_str(),
            end_date: &period.end_str(),
            body: &body_json,
            index_text: &index_text,
            source_path: "",
        })
        .unwrap()
}
