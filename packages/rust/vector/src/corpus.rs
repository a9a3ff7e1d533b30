//! Loading news corpora from JSON files.
//!
//! Two layouts are accepted:
//! - a flat array of documents (`[{"ticker", "title", "link", "full_text"}, ...]`)
//! - an object keyed by ticker (`{"AAPL": [{"title", "link", "full_text"}, ...]}`)
//!
//! Entries with a blank body are dropped. Duplicates (same embedding text) are
//! collapsed so re-ingesting a file never produces repeated points.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use stockrag_shared::{NewsDocument, Result, StockRagError};

/// A corpus document ready to embed.
#[derive(Debug, Clone, PartialEq)]
pub struct CorpusEntry {
    pub doc: NewsDocument,
    /// SHA-256 of [`embedding_text`], hex encoded.
    pub content_hash: String,
}

impl CorpusEntry {
    pub fn new(doc: NewsDocument) -> Self {
        let content_hash = compute_hash(&embedding_text(&doc));
        Self { doc, content_hash }
    }

    /// Text sent to the embedder.
    pub fn text(&self) -> String {
        embedding_text(&self.doc)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum CorpusFile {
    List(Vec<NewsDocument>),
    ByTicker(BTreeMap<String, Vec<NewsDocument>>),
}

/// Title and body joined the way both seeding and ingestion embed them.
pub fn embedding_text(doc: &NewsDocument) -> String {
    format!("{} {}", doc.title, doc.full_text)
}

/// Compute SHA-256 hash of content.
pub fn compute_hash(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Parse corpus JSON in either supported layout.
pub fn parse_corpus(json: &str) -> Result<Vec<CorpusEntry>> {
    let file: CorpusFile = serde_json::from_str(json)
        .map_err(|e| StockRagError::parse(format!("invalid corpus JSON: {e}")))?;

    let docs: Vec<NewsDocument> = match file {
        CorpusFile::List(docs) => docs,
        CorpusFile::ByTicker(map) => map
            .into_iter()
            .flat_map(|(ticker, docs)| {
                docs.into_iter().map(move |mut doc| {
                    if doc.ticker.trim().is_empty() {
                        doc.ticker = ticker.clone();
                    }
                    doc
                })
            })
            .collect(),
    };

    let total = docs.len();
    let entries = dedupe(
        docs.into_iter()
            .filter(|d| !d.full_text.trim().is_empty())
            .map(CorpusEntry::new)
            .collect(),
    );
    debug!(total, kept = entries.len(), "parsed corpus");
    Ok(entries)
}

/// Read and parse a corpus file.
pub fn load_corpus(path: &Path) -> Result<Vec<CorpusEntry>> {
    let content = std::fs::read_to_string(path).map_err(|e| StockRagError::io(path, e))?;
    let entries = parse_corpus(&content)?;
    info!(path = %path.display(), entries = entries.len(), "loaded corpus");
    Ok(entries)
}

/// Keep the first entry for each content hash, preserving order.
pub fn dedupe(entries: Vec<CorpusEntry>) -> Vec<CorpusEntry> {
    let mut seen = HashSet::new();
    entries
        .into_iter()
        .filter(|e| seen.insert(e.content_hash.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_list() {
        let json = r#"[
            {"ticker": "AAPL", "title": "Apple beats", "link": "https://a", "full_text": "Revenue up."},
            {"ticker": "TSLA", "title": "Tesla deliveries", "full_text": "Record quarter."}
        ]"#;
        let entries = parse_corpus(json).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[1].doc.link, "");
        assert_eq!(entries[0].text(), "Apple beats Revenue up.");
    }

    #[test]
    fn parses_ticker_map_and_skips_blank_bodies() {
        let json = r#"{
            "MSFT": [
                {"title": "Azure growth", "link": "https://m/1", "full_text": "Cloud up."},
                {"title": "Empty", "link": "https://m/2", "full_text": "   "}
            ],
            "NVDA": [{"title": "GPU demand", "link": "https://n/1", "full_text": "Strong."}]
        }"#;
        let entries = parse_corpus(json).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].doc.ticker, "MSFT");
        assert_eq!(entries[1].doc.ticker, "NVDA");
    }

    #[test]
    fn duplicates_are_collapsed() {
        let json = r#"[
            {"ticker": "AAPL", "title": "Same", "full_text": "Body."},
            {"ticker": "AAPL", "title": "Same", "full_text": "Body."},
            {"ticker": "AAPL", "title": "Other", "full_text": "Body."}
        ]"#;
        assert_eq!(parse_corpus(json).unwrap().len(), 2);
    }

    #[test]
    fn hash_is_stable_hex() {
        let h = compute_hash("hello");
        assert_eq!(h.len(), 64);
        assert_eq!(h, compute_hash("hello"));
        assert_ne!(h, compute_hash("hello!"));
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let err = parse_corpus("{not json").unwrap_err();
        assert!(matches!(err, StockRagError::Parse { .. }));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = load_corpus(Path::new("/nonexistent/corpus.json")).unwrap_err();
        assert!(matches!(err, StockRagError::Io { .. }));
    }
}
