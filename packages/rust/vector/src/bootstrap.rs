//! Collection bootstrap and bulk ingestion.
//!
//! Startup calls [`initialize`]: make sure the collection exists, then seed it
//! from a JSON corpus when it is empty. The `ingest` command goes through
//! [`ingest`], which can optionally rebuild the collection from scratch.

use std::path::Path;

use serde_json::{Map, Value};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use stockrag_llm::Embedder;
use stockrag_shared::{Result, StockRagError};

use crate::corpus::{self, CorpusEntry};
use crate::{Point, QdrantStore};

/// Texts per embedding request during ingestion.
const EMBED_BATCH: usize = 32;

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Receives ingestion progress. Implementations render it (spinner, logs).
pub trait IngestProgress: Send + Sync {
    /// A batch of documents has been embedded.
    fn embedded(&self, done: usize, total: usize);
    /// All points have been written.
    fn stored(&self, total: usize);
}

/// No-op progress reporter.
pub struct SilentIngestProgress;

impl IngestProgress for SilentIngestProgress {
    fn embedded(&self, _done: usize, _total: usize) {}
    fn stored(&self, _total: usize) {}
}

// ---------------------------------------------------------------------------
// Bootstrap
// ---------------------------------------------------------------------------

/// What [`initialize`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    /// The collection did not exist and was created.
    pub collection_created: bool,
    /// Points present before seeding.
    pub existing_points: u64,
    /// Points written from the seed file.
    pub seeded: usize,
}

/// Create the collection when missing. Returns `true` if it was created.
pub async fn ensure_collection(store: &QdrantStore, vector_size: usize) -> Result<bool> {
    if store.collection_exists().await? {
        return Ok(false);
    }
    store.create_collection(vector_size).await?;
    Ok(true)
}

/// Seed an empty collection from `seed_file`.
///
/// A non-empty collection is left alone. A missing seed file only logs a
/// warning; an unreadable or malformed one is an error.
#[instrument(skip_all, fields(collection = %store.collection()))]
pub async fn seed_if_empty(
    store: &QdrantStore,
    embedder: &dyn Embedder,
    seed_file: Option<&Path>,
    vector_size: usize,
) -> Result<SeedReport> {
    let existing_points = store.count().await?;
    let mut report = SeedReport {
        existing_points,
        ..SeedReport::default()
    };

    if existing_points > 0 {
        info!(existing_points, "collection already populated");
        return Ok(report);
    }

    let Some(path) = seed_file else {
        info!("no seed file configured, collection stays empty");
        return Ok(report);
    };

    if !path.exists() {
        warn!(path = %path.display(), "seed file not found, skipping seeding");
        return Ok(report);
    }

    let entries = corpus::load_corpus(path)?;
    report.seeded = store_entries(store, embedder, &entries, vector_size, &SilentIngestProgress)
        .await?;
    info!(seeded = report.seeded, "seeded collection");
    Ok(report)
}

/// Ensure the collection exists and seed it if empty.
pub async fn initialize(
    store: &QdrantStore,
    embedder: &dyn Embedder,
    seed_file: Option<&Path>,
    vector_size: usize,
) -> Result<SeedReport> {
    let collection_created = ensure_collection(store, vector_size).await?;
    let report = seed_if_empty(store, embedder, seed_file, vector_size).await?;
    Ok(SeedReport {
        collection_created,
        ..report
    })
}

/// Embed and store `entries`.
///
/// With `recreate` the collection is dropped and rebuilt first; otherwise it
/// is created only if missing. Returns the number of points written.
#[instrument(skip_all, fields(collection = %store.collection(), entries = entries.len(), recreate))]
pub async fn ingest(
    store: &QdrantStore,
    embedder: &dyn Embedder,
    entries: &[CorpusEntry],
    vector_size: usize,
    recreate: bool,
    progress: &dyn IngestProgress,
) -> Result<usize> {
    if recreate {
        store.recreate_collection(vector_size).await?;
    } else {
        ensure_collection(store, vector_size).await?;
    }
    store_entries(store, embedder, entries, vector_size, progress).await
}

async fn store_entries(
    store: &QdrantStore,
    embedder: &dyn Embedder,
    entries: &[CorpusEntry],
    vector_size: usize,
    progress: &dyn IngestProgress,
) -> Result<usize> {
    let total = entries.len();
    let mut points = Vec::with_capacity(total);

    for batch in entries.chunks(EMBED_BATCH) {
        let texts: Vec<String> = batch.iter().map(CorpusEntry::text).collect();
        let vectors = embedder.embed_batch(&texts).await?;
        if vectors.len() != batch.len() {
            return Err(StockRagError::VectorStore(format!(
                "embedder returned {} vectors for {} documents",
                vectors.len(),
                batch.len()
            )));
        }
        for (entry, vector) in batch.iter().zip(vectors) {
            points.push(to_point(entry, vector, vector_size)?);
        }
        progress.embedded(points.len(), total);
    }

    store.upsert(&points).await?;
    progress.stored(points.len());
    Ok(points.len())
}

/// Build a point whose id is derived from the content hash, so re-ingesting
/// the same article overwrites rather than duplicates it.
fn to_point(entry: &CorpusEntry, vector: Vec<f32>, vector_size: usize) -> Result<Point> {
    if vector.len() != vector_size {
        return Err(StockRagError::VectorStore(format!(
            "embedding has {} dimensions, collection expects {vector_size}",
            vector.len()
        )));
    }

    let id = Uuid::parse_str(&entry.content_hash[..32])
        .map_err(|e| StockRagError::VectorStore(format!("bad content hash: {e}")))?;

    let doc = &entry.doc;
    let mut payload = Map::new();
    payload.insert("ticker".into(), Value::String(doc.ticker.clone()));
    payload.insert("title".into(), Value::String(doc.title.clone()));
    payload.insert("link".into(), Value::String(doc.link.clone()));
    payload.insert("full_text".into(), Value::String(doc.full_text.clone()));
    payload.insert(
        "content_hash".into(),
        Value::String(entry.content_hash.clone()),
    );

    Ok(Point {
        id: Value::String(id.to_string()),
        vector,
        payload,
    })
}
