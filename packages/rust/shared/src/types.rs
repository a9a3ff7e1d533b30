//! Core domain types for the StockRAG query workflow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Placeholder used when no ticker could be extracted.
pub const NO_TICKER: &str = "N/A";

/// Answer the model gives (and we give) when the context does not cover the question.
pub const NO_RELEVANT_DATA: &str = "No relevant data found.";

// ---------------------------------------------------------------------------
// AnswerSource
// ---------------------------------------------------------------------------

/// Where the final answer's facts came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    /// Answered from the vector corpus.
    Rag,
    /// Corpus hits existed but the model found them irrelevant.
    RagEmpty,
    /// Live articles from the Yahoo Finance search API.
    YahooApi,
    /// Live articles from the Yahoo RSS headline feed.
    RssFeed,
    /// Nothing usable was found.
    #[default]
    None,
}

impl AnswerSource {
    /// Wire/storage name (`rag`, `yahoo_api`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rag => "rag",
            Self::RagEmpty => "rag_empty",
            Self::YahooApi => "yahoo_api",
            Self::RssFeed => "rss_feed",
            Self::None => "none",
        }
    }

    /// Human-readable form used inside prompts ("yahoo api").
    pub fn label(&self) -> String {
        self.as_str().replace('_', " ")
    }
}

impl std::fmt::Display for AnswerSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Corpus / news documents
// ---------------------------------------------------------------------------

/// A news article stored in (or destined for) the vector corpus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsDocument {
    /// Ticker the article is filed under.
    #[serde(default)]
    pub ticker: String,
    /// Headline.
    #[serde(default)]
    pub title: String,
    /// Original article URL.
    #[serde(default)]
    pub link: String,
    /// Article body text.
    #[serde(default)]
    pub full_text: String,
}

/// A corpus hit returned by semantic search.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievedDoc {
    pub title: String,
    pub ticker: String,
    pub full_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    /// Cosine similarity reported by the vector store.
    pub score: f32,
}

/// A live article fetched from a news provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    pub ticker: String,
    pub title: String,
    pub link: String,
    /// Short snippet (feed description or the head of the scraped body).
    #[serde(default)]
    pub summary: String,
    /// Scraped article body; may be empty when scraping failed.
    #[serde(default)]
    pub full_text: String,
    /// Publication time as reported by the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published: Option<String>,
}

// ---------------------------------------------------------------------------
// Prices
// ---------------------------------------------------------------------------

/// A market price for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub symbol: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_close: Option<f64>,
    /// Time of the last trade, when the provider reports one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub as_of: Option<DateTime<Utc>>,
    /// Name of the provider that answered (`yahoo`, `stooq`).
    pub provider: String,
}

impl PriceQuote {
    /// Percentage change against the previous close, if known.
    pub fn change_pct(&self) -> Option<f64> {
        self.previous_close
            .filter(|prev| *prev > 0.0)
            .map(|prev| (self.price - prev) / prev * 100.0)
    }
}

/// Result of the price step for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PriceOutcome {
    /// A price was obtained; `fallback_used` is set when the secondary source answered.
    Quoted {
        quote: PriceQuote,
        fallback_used: bool,
    },
    /// Both sources failed.
    Unavailable { symbol: String, error: String },
}

impl PriceOutcome {
    /// Symbol this outcome refers to.
    pub fn symbol(&self) -> &str {
        match self {
            Self::Quoted { quote, .. } => &quote.symbol,
            Self::Unavailable { symbol, .. } => symbol,
        }
    }

    /// The quote, if one was obtained.
    pub fn quote(&self) -> Option<&PriceQuote> {
        match self {
            Self::Quoted { quote, .. } => Some(quote),
            Self::Unavailable { .. } => None,
        }
    }
}

// ---------------------------------------------------------------------------
// PipelineState
// ---------------------------------------------------------------------------

/// Accumulating record passed through the pipeline steps for one request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineState {
    /// The user's question.
    pub query: String,
    /// Extracted ticker symbols; empty means `N/A`.
    #[serde(default)]
    pub tickers: Vec<String>,
    /// Corpus hits at or above the score threshold.
    #[serde(default)]
    pub retrieved_docs: Vec<RetrievedDoc>,
    /// One price outcome per ticker.
    #[serde(default)]
    pub prices: Vec<PriceOutcome>,
    /// Live articles, when the live-news branch ran.
    #[serde(default)]
    pub articles: Vec<Article>,
    /// Generated summary.
    #[serde(default)]
    pub answer: String,
    /// Origin of the answer.
    #[serde(default)]
    pub source: AnswerSource,
    /// Final rendered response text.
    #[serde(default)]
    pub response: String,
}

impl PipelineState {
    /// Start a new state for `query`.
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            ..Default::default()
        }
    }

    /// Tickers joined with `,`, or `N/A`.
    pub fn ticker_display(&self) -> String {
        if self.tickers.is_empty() {
            NO_TICKER.to_string()
        } else {
            self.tickers.join(",")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_source_wire_names() {
        assert_eq!(AnswerSource::YahooApi.as_str(), "yahoo_api");
        assert_eq!(AnswerSource::RssFeed.label(), "rss feed");
        let json = serde_json::to_string(&AnswerSource::RagEmpty).unwrap();
        assert_eq!(json, r#""rag_empty""#);
    }

    #[test]
    fn price_outcome_serializes_with_status_tag() {
        let outcome = PriceOutcome::Unavailable {
            symbol: "AAPL".into(),
            error: "timeout".into(),
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains(r#""status":"unavailable""#));
        assert_eq!(outcome.symbol(), "AAPL");
        assert!(outcome.quote().is_none());
    }

    #[test]
    fn change_pct_requires_previous_close() {
        let mut quote = PriceQuote {
            symbol: "MSFT".into(),
            price: 110.0,
            currency: Some("USD".into()),
            previous_close: Some(100.0),
            as_of: None,
            provider: "yahoo".into(),
        };
        let pct = quote.change_pct().unwrap();
        assert!((pct - 10.0).abs() < 1e-9);

        quote.previous_close = None;
        assert!(quote.change_pct().is_none());
    }

    #[test]
    fn state_ticker_display() {
        let mut state = PipelineState::new("what about apple?");
        assert_eq!(state.ticker_display(), "N/A");
        state.tickers = vec!["AAPL".into(), "TSLA".into()];
        assert_eq!(state.ticker_display(), "AAPL,TSLA");
    }

    #[test]
    fn news_document_tolerates_missing_fields() {
        let doc: NewsDocument = serde_json::from_str(r#"{"title":"Only a title"}"#).unwrap();
        assert_eq!(doc.title, "Only a title");
        assert!(doc.full_text.is_empty());
    }
}
