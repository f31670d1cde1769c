//! Component wiring
//!
//! `MemoryEngine` owns one instance of every component, built from a single
//! `Config`, sharing the database and the model services through `Arc`.

use std::sync::Arc;
use tracing::{info, warn};

use crate::archive::ArchiveManager;
use crate::assistant::Assistant;
use crate::config::Config;
use crate::error::Result;
use crate::index::{EmbeddingIndex, SearchEngine};
use crate::llm::{CompletionService, EmbeddingService, HttpModelClient};
use crate::log_store::LogStore;
use crate::memory_db::MemoryDatabase;
use crate::reindex::ReindexTool;
use crate::rollup::{PromptSet, RollupEngine};
use crate::speech::SpeechQueue;

pub struct MemoryEngine {
    pub config: Config,
    pub db: Arc<MemoryDatabase>,
    pub index: Arc<EmbeddingIndex>,
    pub rollups: Arc<RollupEngine>,
    pub archive: Arc<ArchiveManager>,
    pub log: Arc<LogStore>,
    pub search: Arc<SearchEngine>,
    pub reindex: ReindexTool,
    pub assistant: Assistant,
    pub speech: Option<Arc<SpeechQueue>>,
}

impl MemoryEngine {
    /// Open the on-disk store under the configured home and connect to the
    /// configured model endpoints. Speech starts only when enabled, and then
    /// needs a running tokio runtime.
    pub fn open(config: Config) -> Result<Self> {
        config.ensure_dirs()?;
        if let Err(e) = PromptSet::write_defaults(&config.prompt_dir) {
            warn!("Could not write default prompts to {}: {}", config.prompt_dir.display(), e);
        }

        let db = Arc::new(MemoryDatabase::new(&config.db_path)?);
        info!("Memory database opened at {}", config.db_path.display());

        let client = Arc::new(HttpModelClient::new(&config)?);
        let speech = config.speech_enabled.then(|| Arc::new(SpeechQueue::from_config(&config)));

        let mut engine = Self::with_services(config, db, client.clone(), client);
        if let Some(speech) = speech {
            engine = engine.with_speech(speech);
        }
        Ok(engine)
    }

    /// Wire the components around an existing database and model services
    pub fn with_services(
        config: Config,
        db: Arc<MemoryDatabase>,
        completions: Arc<dyn CompletionService>,
        embeddings: Arc<dyn EmbeddingService>,
    ) -> Self {
        let index = Arc::new(EmbeddingIndex::new(db.clone(), embeddings.clone()));
        let rollups = Arc::new(RollupEngine::new(config.clone(), db.clone(), completions.clone(), index.clone()));
        let archive = Arc::new(ArchiveManager::new(config.clone(), db.clone()));
        let log = Arc::new(LogStore::new(config.clone(), rollups.clone(), archive.clone()));
        let search = Arc::new(SearchEngine::new(db.clone(), embeddings));
        let reindex = ReindexTool::new(db.clone(), index.clone());
        let assistant = Assistant::new(config.clone(), db.clone(), log.clone(), search.clone(), completions);

        Self { config, db, index, rollups, archive, log, search, reindex, assistant, speech: None }
    }

    pub fn with_speech(mut self, speech: Arc<SpeechQueue>) -> Self {
        self.assistant = self.assistant.with_speech(speech.clone());
        self.speech = Some(speech);
        self
    }

    /// Let queued speech finish
    pub async fn shutdown(self) {
        let Self { speech, assistant, .. } = self;
        drop(assistant);
        if let Some(queue) = speech.and_then(|s| Arc::try_unwrap(s).ok()) {
            queue.shutdown().await;
        }
    }
}
