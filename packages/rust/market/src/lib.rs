//! Live market data: prices and news.
//!
//! Every external source sits behind a trait so the pipeline can swap in
//! mocks and so the fallback helpers stay source-agnostic:
//! - [`PriceProvider`]: [`YahooChartProvider`] (primary), [`StooqProvider`] (secondary)
//! - [`NewsProvider`]: [`YahooNewsProvider`] (primary), [`RssNewsProvider`] (secondary)
//! - [`ArticleScraper`]: best-effort article body extraction

mod news;
mod price;
mod rss;
mod scrape;

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use stockrag_shared::{Article, PriceQuote, Result, StockRagError};

pub use news::{RssNewsProvider, YahooNewsProvider, fetch_news_with_fallback};
pub use price::{StooqProvider, YahooChartProvider, fetch_price_with_fallback};
pub use rss::{RssItem, parse_rss_items};
pub use scrape::{ArticleScraper, extract_article_text};

/// User-Agent sent to market sites. Yahoo rejects unknown clients.
pub(crate) const USER_AGENT: &str = "Mozilla/5.0 (compatible; StockBot/1.0)";

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A source of current prices.
#[async_trait]
pub trait PriceProvider: Send + Sync {
    /// Short provider name recorded on quotes and in logs.
    fn name(&self) -> &str;

    /// Latest price for `symbol`.
    async fn quote(&self, symbol: &str) -> Result<PriceQuote>;
}

/// A source of recent news articles.
#[async_trait]
pub trait NewsProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Up to `limit` recent articles about `ticker`.
    async fn fetch(&self, ticker: &str, limit: usize) -> Result<Vec<Article>>;
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Build a reqwest client with the market user agent.
pub(crate) fn build_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| StockRagError::Network(format!("failed to build HTTP client: {e}")))
}

/// Join `segments` onto `base` (each one percent-encoded) and append `query`.
pub(crate) fn endpoint(base: &str, segments: &[&str], query: &[(&str, &str)]) -> Result<Url> {
    let mut url = Url::parse(base.trim_end_matches('/'))
        .map_err(|e| StockRagError::config(format!("invalid base URL {base}: {e}")))?;

    url.path_segments_mut()
        .map_err(|_| StockRagError::config(format!("base URL cannot have a path: {base}")))?
        .pop_if_empty()
        .extend(segments);

    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}

/// GET `url` and return the body, mapping transport errors and non-2xx codes.
pub(crate) async fn get_text(client: &Client, url: &Url) -> Result<String> {
    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| StockRagError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(StockRagError::Network(format!("{url}: HTTP {status}")));
    }

    response
        .text()
        .await
        .map_err(|e| StockRagError::Network(format!("{url}: failed to read body: {e}")))
}
