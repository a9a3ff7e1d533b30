//! Shared types, error model, and configuration for StockRAG.
//!
//! This crate is the foundation depended on by all other StockRAG crates.
//! It provides:
//! - [`StockRagError`] — the unified error type
//! - Domain types ([`PipelineState`], [`RetrievedDoc`], [`Article`], [`PriceOutcome`])
//! - Configuration ([`AppConfig`], config loading, env overrides)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, GeminiConfig, MarketConfig, PipelineConfig, QdrantConfig, ServerConfig,
    config_dir, config_file_path, gemini_api_key, init_config, load_config, load_config_from,
    qdrant_api_key, resolve_config, validate_api_key,
};
pub use error::{Result, StockRagError};
pub use types::{
    AnswerSource, Article, NO_RELEVANT_DATA, NO_TICKER, NewsDocument, PipelineState,
    PriceOutcome, PriceQuote, RetrievedDoc,
};
