//! Vector database access and corpus management.
//!
//! This crate provides:
//! - [`VectorStore`] — the search seam used by the pipeline
//! - [`QdrantStore`] — Qdrant REST implementation with collection management
//! - [`corpus`] — loading news corpora from JSON
//! - [`bootstrap`] — collection creation, seeding and bulk ingestion

pub mod bootstrap;
pub mod corpus;
mod qdrant;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use stockrag_shared::{Result, RetrievedDoc};

pub use bootstrap::{IngestProgress, SeedReport, SilentIngestProgress};
pub use corpus::CorpusEntry;
pub use qdrant::QdrantStore;

/// A point to write into the vector store.
#[derive(Debug, Clone, Serialize)]
pub struct Point {
    pub id: serde_json::Value,
    pub vector: Vec<f32>,
    pub payload: serde_json::Map<String, serde_json::Value>,
}

/// A search hit.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoredPoint {
    pub id: serde_json::Value,
    pub score: f32,
    #[serde(default)]
    pub payload: Option<serde_json::Map<String, serde_json::Value>>,
}

impl ScoredPoint {
    fn payload_str(&self, key: &str) -> Option<&str> {
        self.payload
            .as_ref()
            .and_then(|p| p.get(key))
            .and_then(|v| v.as_str())
    }

    /// Convert the payload into a [`RetrievedDoc`], filling gaps with defaults.
    pub fn to_retrieved_doc(&self) -> RetrievedDoc {
        RetrievedDoc {
            title: self.payload_str("title").unwrap_or("Untitled").to_string(),
            ticker: self.payload_str("ticker").unwrap_or_default().to_string(),
            full_text: self.payload_str("full_text").unwrap_or_default().to_string(),
            link: self
                .payload_str("link")
                .filter(|l| !l.is_empty())
                .map(String::from),
            score: self.score,
        }
    }
}

/// Similarity search over stored embeddings.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Return up to `limit` nearest points to `vector`, best first.
    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredPoint>>;
}
