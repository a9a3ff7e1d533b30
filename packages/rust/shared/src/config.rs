//! Application configuration for StockRAG.
//!
//! User config lives at `~/.stockrag/stockrag.toml`.
//! CLI flags override environment variables, which override config file
//! values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StockRagError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "stockrag.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".stockrag";

// ---------------------------------------------------------------------------
// Config structs (matching stockrag.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Hosted language model settings.
    #[serde(default)]
    pub gemini: GeminiConfig,

    /// Vector database settings.
    #[serde(default)]
    pub qdrant: QdrantConfig,

    /// Market data endpoints.
    #[serde(default)]
    pub market: MarketConfig,

    /// Retrieval and prompt sizing.
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Web UI server.
    #[serde(default)]
    pub server: ServerConfig,
}

/// `[gemini]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    /// Name of the env var holding the API key (never store the key itself).
    #[serde(default = "default_gemini_key_env")]
    pub api_key_env: String,

    /// Model used for ticker extraction and summaries.
    #[serde(default = "default_model")]
    pub model: String,

    /// Model used for query and corpus embeddings.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// REST endpoint root.
    #[serde(default = "default_gemini_base_url")]
    pub base_url: String,

    /// Request timeout in seconds.
    #[serde(default = "default_gemini_timeout")]
    pub timeout_secs: u64,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key_env: default_gemini_key_env(),
            model: default_model(),
            embedding_model: default_embedding_model(),
            base_url: default_gemini_base_url(),
            timeout_secs: default_gemini_timeout(),
        }
    }
}

fn default_gemini_key_env() -> String {
    "GEMINI_API_KEY".into()
}
fn default_model() -> String {
    "gemini-2.0-flash".into()
}
fn default_embedding_model() -> String {
    "text-embedding-004".into()
}
fn default_gemini_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".into()
}
fn default_gemini_timeout() -> u64 {
    60
}

/// `[qdrant]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QdrantConfig {
    /// Qdrant REST URL.
    #[serde(default = "default_qdrant_url")]
    pub url: String,

    /// Collection holding the news embeddings.
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Name of the env var holding an optional Qdrant API key.
    #[serde(default = "default_qdrant_key_env")]
    pub api_key_env: String,

    /// Embedding dimension used when creating the collection.
    #[serde(default = "default_vector_size")]
    pub vector_size: usize,

    /// JSON corpus used to seed an empty collection at startup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_file: Option<String>,
}

impl Default for QdrantConfig {
    fn default() -> Self {
        Self {
            url: default_qdrant_url(),
            collection: default_collection(),
            api_key_env: default_qdrant_key_env(),
            vector_size: default_vector_size(),
            seed_file: None,
        }
    }
}

fn default_qdrant_url() -> String {
    "http://localhost:6333".into()
}
fn default_collection() -> String {
    "news_embeddings".into()
}
fn default_qdrant_key_env() -> String {
    "QDRANT_API_KEY".into()
}
fn default_vector_size() -> usize {
    768
}

/// `[market]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Yahoo Finance API root (chart + search endpoints).
    #[serde(default = "default_yahoo_base_url")]
    pub yahoo_base_url: String,

    /// Stooq root, used as the secondary price source.
    #[serde(default = "default_stooq_base_url")]
    pub stooq_base_url: String,

    /// Yahoo RSS feed root, used as the secondary news source.
    #[serde(default = "default_rss_base_url")]
    pub rss_base_url: String,

    /// Articles fetched per ticker.
    #[serde(default = "default_num_articles")]
    pub num_articles: usize,

    /// Request timeout in seconds.
    #[serde(default = "default_market_timeout")]
    pub timeout_secs: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            yahoo_base_url: default_yahoo_base_url(),
            stooq_base_url: default_stooq_base_url(),
            rss_base_url: default_rss_base_url(),
            num_articles: default_num_articles(),
            timeout_secs: default_market_timeout(),
        }
    }
}

fn default_yahoo_base_url() -> String {
    "https://query2.finance.yahoo.com".into()
}
fn default_stooq_base_url() -> String {
    "https://stooq.com".into()
}
fn default_rss_base_url() -> String {
    "https://feeds.finance.yahoo.com".into()
}
fn default_num_articles() -> usize {
    5
}
fn default_market_timeout() -> u64 {
    10
}

/// `[pipeline]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Number of corpus hits requested from the vector store.
    #[serde(default = "default_top_k")]
    pub top_k: usize,

    /// Minimum cosine similarity for a hit to count.
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f32,

    /// Maximum characters of context sent to the model.
    #[serde(default = "default_context_chars")]
    pub context_chars: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            score_threshold: default_score_threshold(),
            context_chars: default_context_chars(),
        }
    }
}

fn default_top_k() -> usize {
    3
}
fn default_score_threshold() -> f32 {
    0.5
}
fn default_context_chars() -> usize {
    7_000
}

/// `[server]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Socket address the web UI binds to.
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "127.0.0.1:8501".into()
}

// ---------------------------------------------------------------------------
// Environment overrides
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|name| std::env::var(name).ok());
    }

    /// Apply overrides from an arbitrary variable lookup.
    ///
    /// Recognized: `QDRANT_URL`, `QDRANT_COLLECTION`, `QDRANT_SEED_FILE`,
    /// `EMBED_MODEL`, `GEMINI_MODEL`. Empty values are ignored.
    pub fn apply_overrides_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(url) = get("QDRANT_URL") {
            self.qdrant.url = url;
        }
        if let Some(collection) = get("QDRANT_COLLECTION") {
            self.qdrant.collection = collection;
        }
        if let Some(seed) = get("QDRANT_SEED_FILE") {
            self.qdrant.seed_file = Some(seed);
        }
        if let Some(model) = get("EMBED_MODEL") {
            self.gemini.embedding_model = model;
        }
        if let Some(model) = get("GEMINI_MODEL") {
            self.gemini.model = model;
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.stockrag/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| StockRagError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.stockrag/stockrag.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| StockRagError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| StockRagError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Load config from `explicit` (or the default location) and apply env overrides.
pub fn resolve_config(explicit: Option<&Path>) -> Result<AppConfig> {
    let mut config = match explicit {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    config.apply_env_overrides();
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| StockRagError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| StockRagError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| StockRagError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Check that the Gemini API key env var is set and non-empty.
pub fn validate_api_key(config: &AppConfig) -> Result<()> {
    gemini_api_key(config).map(|_| ())
}

/// Read the Gemini API key from the configured env var.
pub fn gemini_api_key(config: &AppConfig) -> Result<String> {
    let var_name = &config.gemini.api_key_env;
    match std::env::var(var_name) {
        Ok(val) if !val.is_empty() => Ok(val),
        _ => Err(StockRagError::config(format!(
            "Gemini API key not found. Set the {var_name} environment variable \
             (a .env file in the working directory also works)."
        ))),
    }
}

/// Read the optional Qdrant API key.
pub fn qdrant_api_key(config: &AppConfig) -> Option<String> {
    std::env::var(&config.qdrant.api_key_env)
        .ok()
        .filter(|v| !v.is_empty())
}
