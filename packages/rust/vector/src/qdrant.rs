//! Qdrant REST client.
//!
//! Only the handful of endpoints the workflow needs: collection listing and
//! (re)creation, point counting, upsert and search.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use stockrag_shared::{Result, StockRagError};

use crate::{Point, ScoredPoint, VectorStore};

/// Points per upsert request.
const UPSERT_BATCH: usize = 64;

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Envelope wrapping every Qdrant response.
#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default = "Option::default")]
    result: Option<T>,
    #[serde(default)]
    status: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct CollectionsResult {
    #[serde(default)]
    collections: Vec<CollectionDescription>,
}

#[derive(Debug, Deserialize)]
struct CollectionDescription {
    name: String,
}

#[derive(Debug, Deserialize)]
struct CountResult {
    count: u64,
}

#[derive(Debug, Serialize)]
struct VectorParams {
    size: usize,
    distance: &'static str,
}

#[derive(Debug, Serialize)]
struct CreateCollection {
    vectors: VectorParams,
}

#[derive(Debug, Serialize)]
struct UpsertPoints<'a> {
    points: &'a [Point],
}

#[derive(Debug, Serialize)]
struct SearchRequest<'a> {
    vector: &'a [f32],
    limit: usize,
    with_payload: bool,
}

// ---------------------------------------------------------------------------
// QdrantStore
// ---------------------------------------------------------------------------

/// Handle to one Qdrant collection.
pub struct QdrantStore {
    client: Client,
    base_url: String,
    collection: String,
    api_key: Option<String>,
}

impl QdrantStore {
    /// Create a store for `collection` on the Qdrant instance at `url`.
    pub fn new(url: &str, collection: &str, api_key: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(DEFAULT_TIMEOUT_SECS))
            .build()
            .map_err(|e| StockRagError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: url.trim_end_matches('/').to_string(),
            collection: collection.to_string(),
            api_key,
        })
    }

    /// Name of the collection this store targets.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn collection_url(&self, suffix: &str) -> String {
        format!("{}/collections/{}{suffix}", self.base_url, self.collection)
    }

    async fn request<B, R>(&self, method: Method, url: &str, body: Option<&B>) -> Result<Option<R>>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut builder = self.client.request(method, url);
        if let Some(key) = &self.api_key {
            builder = builder.header("api-key", key);
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| StockRagError::Network(format!("qdrant {url}: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(200).collect();
            return Err(StockRagError::VectorStore(format!(
                "{url}: HTTP {status}: {excerpt}"
            )));
        }

        let envelope: Envelope<R> = response
            .json()
            .await
            .map_err(|e| StockRagError::VectorStore(format!("{url}: invalid response: {e}")))?;

        debug!(%url, status = %envelope.status, "qdrant request ok");
        Ok(envelope.result)
    }

    /// Names of all collections on the server.
    pub async fn list_collections(&self) -> Result<Vec<String>> {
        let url = format!("{}/collections", self.base_url);
        let result: Option<CollectionsResult> =
            self.request::<(), _>(Method::GET, &url, None).await?;
        Ok(result
            .map(|r| r.collections.into_iter().map(|c| c.name).collect())
            .unwrap_or_default())
    }

    /// Whether the target collection exists.
    pub async fn collection_exists(&self) -> Result<bool> {
        Ok(self
            .list_collections()
            .await?
            .iter()
            .any(|name| name == &self.collection))
    }

    /// Create the collection with cosine distance.
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn create_collection(&self, vector_size: usize) -> Result<()> {
        let body = CreateCollection {
            vectors: VectorParams {
                size: vector_size,
                distance: "Cosine",
            },
        };
        let _: Option<bool> = self
            .request(Method::PUT, &self.collection_url(""), Some(&body))
            .await?;
        info!(vector_size, "created collection");
        Ok(())
    }

    /// Drop the collection.
    #[instrument(skip(self), fields(collection = %self.collection))]
    pub async fn delete_collection(&self) -> Result<()> {
        let _: Option<bool> = self
            .request::<(), _>(Method::DELETE, &self.collection_url(""), None)
            .await?;
        info!("deleted collection");
        Ok(())
    }

    /// Drop the collection if present, then create it empty.
    pub async fn recreate_collection(&self, vector_size: usize) -> Result<()> {
        if self.collection_exists().await? {
            self.delete_collection().await?;
        }
        self.create_collection(vector_size).await
    }

    /// Exact number of points in the collection.
    pub async fn count(&self) -> Result<u64> {
        let body = serde_json::json!({ "exact": true });
        let result: Option<CountResult> = self
            .request(Method::POST, &self.collection_url("/points/count"), Some(&body))
            .await?;
        result
            .map(|r| r.count)
            .ok_or_else(|| StockRagError::VectorStore("count response had no result".into()))
    }

    /// Insert or replace points, in batches, waiting for each to be applied.
    #[instrument(skip_all, fields(collection = %self.collection, points = points.len()))]
    pub async fn upsert(&self, points: &[Point]) -> Result<()> {
        let url = self.collection_url("/points?wait=true");
        for batch in points.chunks(UPSERT_BATCH) {
            let body = UpsertPoints { points: batch };
            let _: Option<serde_json::Value> =
                self.request(Method::PUT, &url, Some(&body)).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for QdrantStore {
    #[instrument(skip_all, fields(collection = %self.collection, limit))]
    async fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<ScoredPoint>> {
        let body = SearchRequest {
            vector,
            limit,
            with_payload: true,
        };
        let result: Option<Vec<ScoredPoint>> = self
            .request(Method::POST, &self.collection_url("/points/search"), Some(&body))
            .await?;
        Ok(result.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store_for(server: &MockServer) -> QdrantStore {
        QdrantStore::new(&server.uri(), "news_embeddings", None).unwrap()
    }

    #[tokio::test]
    async fn lists_collections_and_checks_existence() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/collections"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": {"collections": [{"name": "other"}, {"name": "news_embeddings"}]},
                "status": "ok",
                "time": 0.001
            })))
            .mount(&server)
            .await;

        let store = store_for(&server);
        let names = store.list_collections().await.unwrap();
        assert_eq!(names, vec!["other", "news_embeddings"]);
        assert!(store.collection_exists().await.unwrap());
    }

    #[tokio::test]
    async fn creates_cosine_collection() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/collections/news_embeddings"))
            .and(body_partial_json(serde_json::json!({
                "vectors": {"size": 768, "distance": "Cosine"}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": true, "status": "ok"
            })))
            .expect(1)
            .mount(&server)
            .await;

        store_for(&server).create_collection(768).await.unwrap();
    }

    #[tokio::test]
    async fn counts_points() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/collections/news_embeddings/points/count"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": {"count": 12}, "status": "ok"
            })))
            .mount(&server)
            .await;

        assert_eq!(store_for(&server).count().await.unwrap(), 12);
    }

    #[tokio::test]
    async fn upserts_in_batches() {
        let server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path("/collections/news_embeddings/points"))
            .and(query_param("wait", "true"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": {"operation_id": 1, "status": "completed"}, "status": "ok"
            })))
            .expect(2)
            .mount(&server)
            .await;

        let points: Vec<Point> = (0..70)
            .map(|i| Point {
                id: serde_json::json!(i),
                vector: vec![0.0, 1.0],
                payload: serde_json::Map::new(),
            })
            .collect();

        store_for(&server).upsert(&points).await.unwrap();
    }

    #[tokio::test]
    async fn search_returns_scored_points() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/collections/news_embeddings/points/search"))
            .and(header("api-key", "secret"))
            .and(body_partial_json(serde_json::json!({"limit": 3, "with_payload": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "result": [
                    {"id": "p1", "version": 0, "score": 0.82, "payload": {"title": "A", "ticker": "AAPL", "full_text": "x"}},
                    {"id": "p2", "version": 0, "score": 0.41, "payload": {"title": "B", "ticker": "MSFT", "full_text": "y"}}
                ],
                "status": "ok"
            })))
            .mount(&server)
            .await;

        let store =
            QdrantStore::new(&server.uri(), "news_embeddings", Some("secret".into())).unwrap();
        let hits = store.search(&[0.1, 0.2], 3).await.unwrap();
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].to_retrieved_doc().ticker, "AAPL");
        assert!(hits[1].score < 0.5);
    }

    #[tokio::test]
    async fn http_error_is_vector_store_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(404)
                    .set_body_string(r#"{"status":{"error":"Collection not found"}}"#),
            )
            .mount(&server)
            .await;

        let err = store_for(&server).search(&[0.1], 3).await.unwrap_err();
        assert!(matches!(err, StockRagError::VectorStore(_)));
        assert!(err.to_string().contains("Collection not found"));
    }
}
