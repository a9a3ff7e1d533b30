//! Hosted language model access for StockRAG.
//!
//! This crate provides:
//! - [`LanguageModel`] / [`Embedder`] — the seams the pipeline talks to
//! - [`GeminiClient`] — Google Gemini REST implementation of both
//! - [`prompts`] — prompt templates for ticker extraction and summaries

mod gemini;
pub mod prompts;

use async_trait::async_trait;
use stockrag_shared::Result;

pub use gemini::GeminiClient;

/// Sampling settings for a single generation call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationOptions {
    pub temperature: f32,
    pub max_output_tokens: Option<u32>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_output_tokens: None,
        }
    }
}

/// Text returned by a model together with usage accounting.
#[derive(Debug, Clone, Default)]
pub struct Completion {
    pub text: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
    pub model: String,
    pub latency_ms: u64,
}

/// A text-generation model.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Generate a completion for a single-turn prompt.
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<Completion>;

    /// Model identifier, for logging.
    fn model_id(&self) -> &str;
}

/// A text-embedding model.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed one text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed many texts, preserving order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed(text).await?);
        }
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct LengthEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Embedder for LengthEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32])
        }
    }

    #[tokio::test]
    async fn default_batch_embeds_in_order() {
        let embedder = LengthEmbedder {
            calls: AtomicUsize::new(0),
        };
        let texts = vec!["a".to_string(), "abc".to_string(), "ab".to_string()];
        let vectors = embedder.embed_batch(&texts).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0], vec![3.0], vec![2.0]]);
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn default_options() {
        let opts = GenerationOptions::default();
        assert!((opts.temperature - 0.2).abs() < f32::EPSILON);
        assert!(opts.max_output_tokens.is_none());
    }
}
