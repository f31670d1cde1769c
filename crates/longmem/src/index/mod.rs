//! Embedding index and similarity search
pub mod embedding_index;
pub mod search;
pub mod vector;

pub use embedding_index::{EmbedOutcome, EmbeddingIndex};
pub use search::{SearchEngine, SearchHit};
