use anyhow::{Context, Result};
use std::env;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

pub const DEFAULT_CHAT_URL: &str = "http://localhost:8080/v1/chat/completions";
pub const DEFAULT_EMBED_URL: &str = "http://localhost:11434/v1/embeddings";
pub const DEFAULT_CHAT_MODEL: &str = "qwen2.5-7b-instruct-q5_k_m-00001-of-00002.gguf";
pub const DEFAULT_EMBED_MODEL: &str = "nomic-embed-text";

/// Engine configuration, passed by value into every component
#[derive(Debug, Clone)]
pub struct Config {
    pub home: PathBuf,
    pub log_dir: PathBuf,
    pub archive_dir: PathBuf,
    pub prompt_dir: PathBuf,
    pub db_path: PathBuf,
    pub keep_raw_days: u32,
    pub max_chunk_bytes: usize,
    pub http_timeout_seconds: u64,
    pub search_top_k: usize,
    pub search_min_score: f64,
    pub chat_url: String,
    pub embed_url: String,
    pub chat_model: String,
    pub embed_model: String,
    pub speech_enabled: bool,
    pub speech_queue_capacity: usize,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            warn!("Failed to load .env file: {}. Using system environment variables.", e);
        } else {
            info!("Loaded environment variables from .env file");
        }

        let home = match env::var("LONGMEM_HOME") {
            Ok(dir) if !dir.trim().is_empty() => PathBuf::from(dir),
            _ => dirs::home_dir()
                .context("Could not determine the home directory; set LONGMEM_HOME")?
                .join("local-ai"),
        };

        Self::from_lookup(home, |name| env::var(name).ok())
    }

    /// Default configuration rooted at `home`, ignoring the environment
    pub fn with_home(home: impl AsRef<Path>) -> Self {
        let home = home.as_ref().to_path_buf();
        Self {
            log_dir: home.join("logs"),
            archive_dir: home.join("logs").join("archive"),
            prompt_dir: home.join("prompts"),
            db_path: home.join("memory").join("memory.sqlite"),
            home,
            keep_raw_days: 45,
            max_chunk_bytes: 25 * 1024 * 1024,
            http_timeout_seconds: 120,
            search_top_k: 5,
            search_min_score: 0.0,
            chat_url: DEFAULT_CHAT_URL.to_string(),
            embed_url: DEFAULT_EMBED_URL.to_string(),
            chat_model: DEFAULT_CHAT_MODEL.to_string(),
            embed_model: DEFAULT_EMBED_MODEL.to_string(),
            speech_enabled: false,
            speech_queue_capacity: 16,
        }
    }

    fn from_lookup(home: PathBuf, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::with_home(home);
        let string = |name: &str, default: &str| -> String {
            lookup(name).filter(|v| !v.trim().is_empty()).unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            keep_raw_days: parse_var(&lookup, "KEEP_RAW_DAYS", defaults.keep_raw_days)?,
            max_chunk_bytes: parse_var(&lookup, "MAX_CHUNK_BYTES", defaults.max_chunk_bytes)?,
            http_timeout_seconds: parse_var(&lookup, "HTTP_TIMEOUT_SECONDS", defaults.http_timeout_seconds)?,
            search_top_k: parse_var(&lookup, "SEARCH_TOP_K", defaults.search_top_k)?,
            search_min_score: parse_var(&lookup, "SEARCH_MIN_SCORE", defaults.search_min_score)?,
            chat_url: string("CHAT_URL", &defaults.chat_url),
            embed_url: string("EMBED_URL", &defaults.embed_url),
            chat_model: string("CHAT_MODEL", &defaults.chat_model),
            embed_model: string("EMBED_MODEL", &defaults.embed_model),
            speech_enabled: parse_var(&lookup, "SPEECH_ENABLED", defaults.speech_enabled)?,
            speech_queue_capacity: parse_var(&lookup, "SPEECH_QUEUE_CAPACITY", defaults.speech_queue_capacity)?,
            ..defaults
        })
    }

    /// Create the log, archive, prompt and database directories
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.log_dir)?;
        std::fs::create_dir_all(&self.archive_dir)?;
        std::fs::create_dir_all(&self.prompt_dir)?;
        if let Some(parent) = self.db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    pub fn print_config(&self) {
        info!("Current Configuration:");
        info!("- Home: {}", self.home.display());
        info!("- Log Dir: {}", self.log_dir.display());
        info!("- Archive Dir: {}", self.archive_dir.display());
        info!("- Prompt Dir: {}", self.prompt_dir.display());
        info!("- Database: {}", self.db_path.display());
        info!("- Keep Raw Days: {}", self.keep_raw_days);
        info!("- Max Chunk Bytes: {}", self.max_chunk_bytes);
        info!("- HTTP Timeout: {}s", self.http_timeout_seconds);
        info!("- Search: top {} (min score {:.2})", self.search_top_k, self.search_min_score);
        info!("- Chat: {} ({})", self.chat_url, self.chat_model);
        info!("- Embeddings: {} ({})", self.embed_url, self.embed_model);
        info!("- Speech: {} (queue {})", self.speech_enabled, self.speech_queue_capacity);
    }
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {}: {:?}", name, raw)),
        _ => Ok(default),
    }
}
