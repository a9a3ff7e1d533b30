//! Google Gemini REST client.
//!
//! Speaks `generateContent`, `embedContent` and `batchEmbedContents` on the
//! `v1beta` API. The key travels in the `x-goog-api-key` header.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use stockrag_shared::{GeminiConfig, Result, StockRagError};

use crate::{Completion, Embedder, GenerationOptions, LanguageModel};

/// Maximum texts per `batchEmbedContents` request.
const MAX_BATCH_EMBED: usize = 100;

/// User-Agent string for API requests.
const USER_AGENT: &str = concat!("StockRAG/", env!("CARGO_PKG_VERSION"));

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

impl<'a> Content<'a> {
    fn user(text: &'a str) -> Self {
        Self {
            role: Some("user"),
            parts: vec![Part { text }],
        }
    }

    fn plain(text: &'a str) -> Self {
        Self {
            role: None,
            parts: vec![Part { text }],
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u64,
    #[serde(default)]
    candidates_token_count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedRequest<'a> {
    model: String,
    content: Content<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: Embedding,
}

#[derive(Debug, Serialize)]
struct BatchEmbedRequest<'a> {
    requests: Vec<EmbedRequest<'a>>,
}

#[derive(Debug, Deserialize)]
struct BatchEmbedResponse {
    #[serde(default)]
    embeddings: Vec<Embedding>,
}

#[derive(Debug, Deserialize)]
struct Embedding {
    #[serde(default)]
    values: Vec<f32>,
}

impl GenerateResponse {
    /// Concatenate the text parts of the first candidate.
    fn text(&self) -> String {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|content| {
                content
                    .parts
                    .iter()
                    .filter_map(|p| p.text.as_deref())
                    .collect::<String>()
            })
            .unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Gemini client implementing both [`LanguageModel`] and [`Embedder`].
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    embedding_model: String,
    output_dimensionality: Option<usize>,
}

impl GeminiClient {
    /// Build a client from the `[gemini]` config section and a resolved API key.
    pub fn new(config: &GeminiConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| StockRagError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: config.model.clone(),
            embedding_model: config.embedding_model.clone(),
            output_dimensionality: None,
        })
    }

    /// Ask the embedding endpoint for vectors of exactly `dims` dimensions.
    pub fn with_output_dimensionality(mut self, dims: usize) -> Self {
        self.output_dimensionality = Some(dims);
        self
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/models/{model}:{method}", self.base_url)
    }

    fn embed_request<'a>(&self, text: &'a str) -> EmbedRequest<'a> {
        EmbedRequest {
            model: format!("models/{}", self.embedding_model),
            content: Content::plain(text),
            output_dimensionality: self.output_dimensionality,
        }
    }

    async fn post_json<B, R>(&self, url: &str, body: &B) -> Result<R>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| StockRagError::Network(format!("gemini: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let excerpt: String = body.chars().take(200).collect();
            return Err(StockRagError::Llm(format!("gemini HTTP {status}: {excerpt}")));
        }

        response
            .json::<R>()
            .await
            .map_err(|e| StockRagError::Llm(format!("invalid gemini response: {e}")))
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    #[instrument(skip_all, fields(model = %self.model, prompt_len = prompt.len()))]
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<Completion> {
        let started = Instant::now();
        let request = GenerateRequest {
            contents: vec![Content::user(prompt)],
            generation_config: GenerationConfig {
                temperature: options.temperature,
                max_output_tokens: options.max_output_tokens,
            },
        };

        let url = self.endpoint(&self.model, "generateContent");
        let response: GenerateResponse = self.post_json(&url, &request).await?;
        let usage = response.usage_metadata.as_ref();

        let completion = Completion {
            text: response.text(),
            tokens_in: usage.map(|u| u.prompt_token_count).unwrap_or(0),
            tokens_out: usage.map(|u| u.candidates_token_count).unwrap_or(0),
            model: self.model.clone(),
            latency_ms: started.elapsed().as_millis() as u64,
        };

        debug!(
            tokens_in = completion.tokens_in,
            tokens_out = completion.tokens_out,
            latency_ms = completion.latency_ms,
            "generation complete"
        );

        Ok(completion)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Embedder for GeminiClient {
    #[instrument(skip_all, fields(model = %self.embedding_model))]
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let url = self.endpoint(&self.embedding_model, "embedContent");
        let response: EmbedResponse = self.post_json(&url, &self.embed_request(text)).await?;

        if response.embedding.values.is_empty() {
            return Err(StockRagError::Llm("gemini returned an empty embedding".into()));
        }
        Ok(response.embedding.values)
    }

    #[instrument(skip_all, fields(model = %self.embedding_model, count = texts.len()))]
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = self.endpoint(&self.embedding_model, "batchEmbedContents");
        let mut vectors = Vec::with_capacity(texts.len());

        for chunk in texts.chunks(MAX_BATCH_EMBED) {
            let request = BatchEmbedRequest {
                requests: chunk.iter().map(|t| self.embed_request(t)).collect(),
            };
            let response: BatchEmbedResponse = self.post_json(&url, &request).await?;

            if response.embeddings.len() != chunk.len() {
                return Err(StockRagError::Llm(format!(
                    "gemini returned {} embeddings for {} inputs",
                    response.embeddings.len(),
                    chunk.len()
                )));
            }
            vectors.extend(response.embeddings.into_iter().map(|e| e.values));
        }

        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> GeminiClient {
        let config = GeminiConfig {
            base_url: format!("{}/v1beta", server.uri()),
            ..Default::default()
        };
        GeminiClient::new(&config, "test-key").unwrap()
    }

    #[test]
    fn generate_request_serializes_camel_case() {
        let request = GenerateRequest {
            contents: vec![Content::user("hi")],
            generation_config: GenerationConfig {
                temperature: 0.1,
                max_output_tokens: Some(20),
            },
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""generationConfig""#));
        assert!(json.contains(r#""maxOutputTokens":20"#));
        assert!(json.contains(r#""role":"user""#));
    }

    #[test]
    fn response_text_joins_parts() {
        let json = r#"{"candidates":[{"content":{"parts":[{"text":"AA"},{"text":"PL"}]}}]}"#;
        let response: GenerateResponse = serde_json::from_str(json).unwrap();
        assert_eq!(response.text(), "AAPL");

        let empty: GenerateResponse = serde_json::from_str(r#"{"candidates":[]}"#).unwrap();
        assert_eq!(empty.text(), "");
    }

    #[tokio::test]
    async fn generate_against_mock_server() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.0-flash:generateContent"))
            .and(header("x-goog-api-key", "test-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "TSLA"}]}}],
                "usageMetadata": {"promptTokenCount": 42, "candidatesTokenCount": 2}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let completion = client
            .generate("Which ticker is Tesla?", &GenerationOptions::default())
            .await
            .unwrap();

        assert_eq!(completion.text, "TSLA");
        assert_eq!(completion.tokens_in, 42);
        assert_eq!(completion.tokens_out, 2);
        assert_eq!(completion.model, "gemini-2.0-flash");
    }

    #[tokio::test]
    async fn http_error_becomes_llm_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(429).set_body_string("quota exhausted"))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let err = client
            .generate("anything", &GenerationOptions::default())
            .await
            .unwrap_err();

        assert!(matches!(err, StockRagError::Llm(_)));
        assert!(err.to_string().contains("quota exhausted"));
    }

    #[tokio::test]
    async fn embed_and_batch_embed() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/text-embedding-004:embedContent"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embedding": {"values": [0.1, 0.2, 0.3]}
            })))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/text-embedding-004:batchEmbedContents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [{"values": [1.0]}, {"values": [2.0]}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server).with_output_dimensionality(3);

        let vector = client.embed("apple earnings").await.unwrap();
        assert_eq!(vector, vec![0.1, 0.2, 0.3]);

        let batch = client
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();
        assert_eq!(batch, vec![vec![1.0], vec![2.0]]);
    }

    #[tokio::test]
    async fn batch_count_mismatch_is_an_error() {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/v1beta/models/text-embedding-004:batchEmbedContents"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "embeddings": [{"values": [1.0]}]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server);
        let result = client
            .embed_batch(&["a".to_string(), "b".to_string()])
            .await;
        assert!(result.is_err());
    }
}
