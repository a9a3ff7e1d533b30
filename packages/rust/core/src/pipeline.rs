//! End-to-end query workflow:
//! extract_ticker → semantic_search → fetch_price → summarize → format_response.

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, instrument, warn};

use stockrag_llm::prompts::{self, PromptKind};
use stockrag_llm::{Embedder, GeminiClient, LanguageModel};
use stockrag_market::{
    ArticleScraper, NewsProvider, PriceProvider, RssNewsProvider, StooqProvider,
    YahooChartProvider, YahooNewsProvider, fetch_news_with_fallback, fetch_price_with_fallback,
};
use stockrag_shared::{
    AnswerSource, AppConfig, NO_RELEVANT_DATA, PipelineState, Result, StockRagError,
    gemini_api_key, qdrant_api_key,
};
use stockrag_vector::{QdrantStore, VectorStore};

use crate::response::format_response;
use crate::ticker;

/// Marker the model is told to answer with when the context does not help.
const NO_RELEVANT_MARKER: &str = "No relevant data found";

// ---------------------------------------------------------------------------
// Settings and wiring
// ---------------------------------------------------------------------------

/// Tunables for one pipeline instance.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Corpus hits requested from the vector store.
    pub top_k: usize,
    /// Minimum similarity for a hit to count.
    pub score_threshold: f32,
    /// Maximum characters of context put into a summary prompt.
    pub context_chars: usize,
    /// Articles requested per ticker on the live-news branch.
    pub num_articles: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

impl PipelineSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            top_k: config.pipeline.top_k,
            score_threshold: config.pipeline.score_threshold,
            context_chars: config.pipeline.context_chars,
            num_articles: config.market.num_articles,
        }
    }
}

/// External services the pipeline talks to.
pub struct PipelineComponents {
    pub llm: Arc<dyn LanguageModel>,
    pub embedder: Arc<dyn Embedder>,
    pub store: Arc<dyn VectorStore>,
    pub price_primary: Arc<dyn PriceProvider>,
    pub price_fallback: Arc<dyn PriceProvider>,
    pub news_primary: Arc<dyn NewsProvider>,
    pub news_fallback: Arc<dyn NewsProvider>,
}

/// Gemini client configured for both generation and embeddings.
pub fn gemini_client(config: &AppConfig) -> Result<GeminiClient> {
    let key = gemini_api_key(config)?;
    Ok(GeminiClient::new(&config.gemini, key)?
        .with_output_dimensionality(config.qdrant.vector_size))
}

/// Qdrant handle for the configured collection.
pub fn qdrant_store(config: &AppConfig) -> Result<QdrantStore> {
    QdrantStore::new(
        &config.qdrant.url,
        &config.qdrant.collection,
        qdrant_api_key(config),
    )
}

/// Trim `raw` and reject an empty question.
pub fn require_query(raw: &str) -> Result<&str> {
    let query = raw.trim();
    if query.is_empty() {
        return Err(StockRagError::validation("query must not be empty"));
    }
    Ok(query)
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a step.
    fn step(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, state: &PipelineState);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn step(&self, _name: &str) {}
    fn done(&self, _state: &PipelineState) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// The query workflow. Cheap to share behind an `Arc`; holds no mutable state.
pub struct Pipeline {
    llm: Arc<dyn LanguageModel>,
    embedder: Arc<dyn Embedder>,
    store: Arc<dyn VectorStore>,
    price_primary: Arc<dyn PriceProvider>,
    price_fallback: Arc<dyn PriceProvider>,
    news_primary: Arc<dyn NewsProvider>,
    news_fallback: Arc<dyn NewsProvider>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(components: PipelineComponents, settings: PipelineSettings) -> Self {
        Self {
            llm: components.llm,
            embedder: components.embedder,
            store: components.store,
            price_primary: components.price_primary,
            price_fallback: components.price_fallback,
            news_primary: components.news_primary,
            news_fallback: components.news_fallback,
            settings,
        }
    }

    /// Production wiring: Gemini, Qdrant, Yahoo/Stooq prices, Yahoo/RSS news.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let gemini = Arc::new(gemini_client(config)?);
        let scraper = ArticleScraper::new(config.market.timeout_secs)?;

        let components = PipelineComponents {
            llm: gemini.clone(),
            embedder: gemini,
            store: Arc::new(qdrant_store(config)?),
            price_primary: Arc::new(YahooChartProvider::from_config(&config.market)?),
            price_fallback: Arc::new(StooqProvider::from_config(&config.market)?),
            news_primary: Arc::new(YahooNewsProvider::from_config(
                &config.market,
                scraper.clone(),
            )?),
            news_fallback: Arc::new(RssNewsProvider::from_config(&config.market, scraper)?),
        };

        Ok(Self::new(components, PipelineSettings::from_config(config)))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Run every step for `query` and return the final state.
    ///
    /// Only a semantic search failure aborts the run; every other step
    /// degrades to a fallback value.
    #[instrument(skip_all, fields(query_len = query.len()))]
    pub async fn run(&self, query: &str, progress: &dyn ProgressReporter) -> Result<PipelineState> {
        let start = Instant::now();
        let mut state = PipelineState::new(query.trim());

        progress.step("extract_ticker");
        self.extract_ticker(&mut state).await;

        progress.step("semantic_search");
        self.semantic_search(&mut state).await?;

        progress.step("fetch_price");
        self.fetch_price(&mut state).await;

        progress.step("summarize");
        self.summarize(&mut state).await;

        progress.step("format_response");
        state.response = format_response(&state);

        info!(
            tickers = %state.ticker_display(),
            source = %state.source,
            docs = state.retrieved_docs.len(),
            articles = state.articles.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "pipeline complete"
        );
        progress.done(&state);
        Ok(state)
    }

    /// Ask the model for ticker symbols and normalize its answer.
    #[instrument(skip_all)]
    pub async fn extract_ticker(&self, state: &mut PipelineState) {
        if state.query.is_empty() {
            warn!("empty query, no ticker to extract");
            state.tickers.clear();
            return;
        }

        let kind = PromptKind::ExtractTicker;
        let prompt = prompts::ticker_prompt(&state.query);
        state.tickers = match self.llm.generate(&prompt, &kind.options()).await {
            Ok(completion) => ticker::normalize(&completion.text),
            Err(e) => {
                warn!(prompt = kind.as_str(), error = %e, "ticker extraction failed");
                Vec::new()
            }
        };

        if state.tickers.is_empty() {
            warn!("no ticker extracted from query");
        } else {
            info!(tickers = %ticker::display(&state.tickers), "extracted tickers");
        }
    }

    /// Embed the query and keep corpus hits at or above the threshold.
    #[instrument(skip_all, fields(top_k = self.settings.top_k))]
    pub async fn semantic_search(&self, state: &mut PipelineState) -> Result<()> {
        state.retrieved_docs.clear();
        if state.query.is_empty() {
            return Ok(());
        }

        let vector = self.embedder.embed(&state.query).await?;
        let hits = self.store.search(&vector, self.settings.top_k).await?;
        let total = hits.len();

        state.retrieved_docs = hits
            .iter()
            .filter(|hit| hit.score >= self.settings.score_threshold)
            .map(|hit| hit.to_retrieved_doc())
            .collect();

        info!(total, kept = state.retrieved_docs.len(), "semantic search done");
        Ok(())
    }

    /// Quote every ticker, primary provider first.
    #[instrument(skip_all, fields(tickers = state.tickers.len()))]
    pub async fn fetch_price(&self, state: &mut PipelineState) {
        state.prices.clear();
        for symbol in &state.tickers {
            let outcome = fetch_price_with_fallback(
                self.price_primary.as_ref(),
                self.price_fallback.as_ref(),
                symbol,
            )
            .await;
            if outcome.quote().is_none() {
                warn!(symbol = outcome.symbol(), "no price from any provider");
            }
            state.prices.push(outcome);
        }
    }

    /// Answer from the corpus when it has hits; otherwise, or when the
    /// model finds them irrelevant, summarize live news.
    #[instrument(skip_all, fields(docs = state.retrieved_docs.len()))]
    pub async fn summarize(&self, state: &mut PipelineState) {
        if !state.retrieved_docs.is_empty() {
            self.answer_from_corpus(state).await;
            if state.source == AnswerSource::Rag {
                return;
            }
            info!("corpus context irrelevant, switching to live news");
        }
        self.summarize_live_news(state).await;
    }

    async fn answer_from_corpus(&self, state: &mut PipelineState) {
        let kind = PromptKind::AnswerFromContext;
        let prompt =
            prompts::rag_prompt(&state.query, &state.retrieved_docs, self.settings.context_chars);

        let answer = match self.llm.generate(&prompt, &kind.options()).await {
            Ok(completion) => completion.text.trim().to_string(),
            Err(e) => {
                warn!(prompt = kind.as_str(), error = %e, "corpus answer failed");
                String::new()
            }
        };

        if answer.is_empty() || answer.contains(NO_RELEVANT_MARKER) {
            state.answer = NO_RELEVANT_DATA.to_string();
            state.source = AnswerSource::RagEmpty;
        } else {
            state.answer = answer;
            state.source = AnswerSource::Rag;
        }
    }

    async fn summarize_live_news(&self, state: &mut PipelineState) {
        if state.tickers.is_empty() {
            warn!("no ticker, cannot fetch news");
            state.answer = NO_RELEVANT_DATA.to_string();
            state.source = AnswerSource::None;
            return;
        }

        let (articles, source) = fetch_news_with_fallback(
            self.news_primary.as_ref(),
            self.news_fallback.as_ref(),
            &state.tickers,
            self.settings.num_articles,
        )
        .await;
        state.articles = articles;
        state.source = source;

        let tickers = ticker::display(&state.tickers);
        if state.articles.is_empty() {
            state.answer = format!("No recent articles found for {tickers}.");
            return;
        }

        let kind = PromptKind::SummarizeArticles;
        let prompt = prompts::articles_prompt(
            &tickers,
            source,
            &state.articles,
            self.settings.context_chars,
        );

        state.answer = match self.llm.generate(&prompt, &kind.options()).await {
            Ok(completion) if !completion.text.trim().is_empty() => {
                completion.text.trim().to_string()
            }
            Ok(_) => NO_RELEVANT_DATA.to_string(),
            Err(e) => {
                warn!(prompt = kind.as_str(), error = %e, "article summary failed");
                NO_RELEVANT_DATA.to_string()
            }
        };
    }
}
