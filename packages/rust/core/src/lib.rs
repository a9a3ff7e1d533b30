//! Query workflow orchestration for StockRAG.
//!
//! This crate ties the language model, vector store and market data sources
//! together into the end-to-end question answering pipeline.

pub mod graph;
pub mod pipeline;
pub mod response;
pub mod ticker;

pub use pipeline::{
    Pipeline, PipelineComponents, PipelineSettings, ProgressReporter, SilentProgress,
    gemini_client, qdrant_store, require_query,
};
pub use response::format_response;
