//! Long-term conversational memory
//!
//! Raw conversation turns are logged per day and rolled up into daily, weekly
//! and monthly summaries by a completion model. Summaries are embedded for
//! similarity search, and raw logs move to compressed monthly archives once
//! summarized.

pub mod archive;
pub mod assistant;
pub mod config;
pub mod engine;
pub mod error;
pub mod index;
pub mod llm;
pub mod log_store;
pub mod memory_db;
pub mod period;
pub mod reindex;
pub mod rollup;
pub mod speech;
pub mod summary;
pub mod telemetry;
pub mod utils;

// Public API exports
pub use archive::{ArchiveManager, ArchiveReport};
pub use assistant::Assistant;
pub use config::Config;
pub use engine::MemoryEngine;
pub use error::{MemoryError, Result};
pub use index::{EmbedOutcome, EmbeddingIndex, SearchEngine, SearchHit};
pub use llm::{ChatMessage, CompletionService, EmbeddingService, HttpModelClient};
pub use log_store::{LogStore, RawRecord, Role};
pub use memory_db::MemoryDatabase;
pub use period::{Period, SummaryKind};
pub use reindex::{ReindexReport, ReindexScope, ReindexTool};
pub use rollup::{RollupEngine, RollupOutcome};
pub use speech::SpeechQueue;
pub use summary::SummaryBody;
