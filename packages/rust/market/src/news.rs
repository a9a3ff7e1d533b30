//! News providers and the API-then-RSS fallback.

use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use stockrag_shared::{AnswerSource, Article, MarketConfig, Result, StockRagError};

use crate::rss::parse_rss_items;
use crate::{ArticleScraper, NewsProvider, build_client, endpoint, get_text};

/// Characters of scraped text kept as the article summary.
const SUMMARY_CHARS: usize = 500;

/// Paragraphs kept from pages linked by the search API.
const YAHOO_MAX_PARAGRAPHS: usize = 15;

// ---------------------------------------------------------------------------
// Yahoo search API
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    news: Vec<SearchNewsItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchNewsItem {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    link: Option<String>,
    #[serde(default)]
    provider_publish_time: Option<i64>,
}

/// Recent headlines from Yahoo's search endpoint, with scraped bodies.
pub struct YahooNewsProvider {
    client: Client,
    base_url: String,
    scraper: ArticleScraper,
}

impl YahooNewsProvider {
    /// The scraper is capped to the first paragraphs of each page.
    pub fn new(base_url: &str, timeout_secs: u64, scraper: ArticleScraper) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: base_url.to_string(),
            scraper: scraper.with_paragraph_limit(YAHOO_MAX_PARAGRAPHS),
        })
    }

    pub fn from_config(config: &MarketConfig, scraper: ArticleScraper) -> Result<Self> {
        Self::new(&config.yahoo_base_url, config.timeout_secs, scraper)
    }
}

#[async_trait]
impl NewsProvider for YahooNewsProvider {
    fn name(&self) -> &str {
        "yahoo_api"
    }

    #[instrument(skip(self), fields(provider = "yahoo_api"))]
    async fn fetch(&self, ticker: &str, limit: usize) -> Result<Vec<Article>> {
        let count = limit.to_string();
        let url = endpoint(
            &self.base_url,
            &["v1", "finance", "search"],
            &[("q", ticker), ("newsCount", count.as_str()), ("quotesCount", "0")],
        )?;
        let body = get_text(&self.client, &url).await?;
        let resp: SearchResponse = serde_json::from_str(&body)
            .map_err(|e| StockRagError::parse(format!("yahoo search for {ticker}: {e}")))?;

        let mut articles = Vec::new();
        for item in resp.news.into_iter().take(limit) {
            let Some(link) = item.link.filter(|l| !l.is_empty()) else {
                continue;
            };
            let full_text = self.scraper.scrape(&link).await;
            articles.push(Article {
                ticker: ticker.to_uppercase(),
                title: item.title.unwrap_or_else(|| "Untitled".to_string()),
                summary: full_text.chars().take(SUMMARY_CHARS).collect(),
                full_text,
                link,
                published: item
                    .provider_publish_time
                    .and_then(|ts| DateTime::from_timestamp(ts, 0))
                    .map(|t| t.to_rfc3339()),
            });
        }

        info!(ticker, count = articles.len(), "yahoo news fetched");
        Ok(articles)
    }
}

// ---------------------------------------------------------------------------
// Yahoo RSS headline feed
// ---------------------------------------------------------------------------

/// Headlines from the keyless Yahoo RSS feed.
pub struct RssNewsProvider {
    client: Client,
    base_url: String,
    scraper: ArticleScraper,
}

impl RssNewsProvider {
    pub fn new(base_url: &str, timeout_secs: u64, scraper: ArticleScraper) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: base_url.to_string(),
            scraper,
        })
    }

    pub fn from_config(config: &MarketConfig, scraper: ArticleScraper) -> Result<Self> {
        Self::new(&config.rss_base_url, config.timeout_secs, scraper)
    }
}

#[async_trait]
impl NewsProvider for RssNewsProvider {
    fn name(&self) -> &str {
        "rss_feed"
    }

    #[instrument(skip(self), fields(provider = "rss_feed"))]
    async fn fetch(&self, ticker: &str, limit: usize) -> Result<Vec<Article>> {
        let symbol = ticker.to_uppercase();
        let url = endpoint(
            &self.base_url,
            &["rss", "2.0", "headline"],
            &[("s", symbol.as_str()), ("region", "US"), ("lang", "en-US")],
        )?;
        let xml = get_text(&self.client, &url).await?;

        let mut articles = Vec::new();
        for item in parse_rss_items(&xml).into_iter().take(limit) {
            let scraped = self.scraper.scrape(&item.link).await;
            let full_text = if scraped.is_empty() {
                item.description.clone()
            } else {
                scraped
            };
            articles.push(Article {
                ticker: symbol.clone(),
                title: item.title,
                link: item.link,
                summary: item.description,
                full_text,
                published: item.pub_date,
            });
        }

        info!(ticker = %symbol, count = articles.len(), "rss news fetched");
        Ok(articles)
    }
}

// ---------------------------------------------------------------------------
// Fallback
// ---------------------------------------------------------------------------

/// Fetch news for every ticker from `primary`, falling back to `secondary`
/// when the primary yields nothing.
///
/// Returns the articles together with the source that produced them
/// ([`AnswerSource::YahooApi`], [`AnswerSource::RssFeed`], or
/// [`AnswerSource::None`] with an empty list).
#[instrument(skip_all, fields(tickers = tickers.len(), limit))]
pub async fn fetch_news_with_fallback(
    primary: &dyn NewsProvider,
    secondary: &dyn NewsProvider,
    tickers: &[String],
    limit: usize,
) -> (Vec<Article>, AnswerSource) {
    let articles = collect(primary, tickers, limit).await;
    if !articles.is_empty() {
        return (articles, AnswerSource::YahooApi);
    }

    warn!(provider = primary.name(), "no articles from primary news source, trying RSS");

    let articles = collect(secondary, tickers, limit).await;
    if !articles.is_empty() {
        return (articles, AnswerSource::RssFeed);
    }

    warn!("no news sources returned articles");
    (Vec::new(), AnswerSource::None)
}

async fn collect(provider: &dyn NewsProvider, tickers: &[String], limit: usize) -> Vec<Article> {
    let mut all = Vec::new();
    for ticker in tickers {
        match provider.fetch(ticker, limit).await {
            Ok(articles) => all.extend(articles),
            Err(e) => warn!(provider = provider.name(), ticker, error = %e, "news fetch failed"),
        }
    }
    all
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct StubNews {
        name: &'static str,
        articles: usize,
        fail: bool,
        calls: AtomicUsize,
    }

    impl StubNews {
        fn new(name: &'static str, articles: usize, fail: bool) -> Self {
            Self {
                name,
                articles,
                fail,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl NewsProvider for StubNews {
        fn name(&self) -> &str {
            self.name
        }

        async fn fetch(&self, ticker: &str, _limit: usize) -> Result<Vec<Article>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(StockRagError::Network("unreachable".into()));
            }
            Ok((0..self.articles)
                .map(|i| Article {
                    ticker: ticker.to_string(),
                    title: format!("{} story {i}", self.name),
                    link: format!("https://n.example/{i}"),
                    summary: String::new(),
                    full_text: "body".into(),
                    published: None,
                })
                .collect())
        }
    }

    fn tickers(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn primary_articles_win() {
        let primary = StubNews::new("yahoo_api", 2, false);
        let secondary = StubNews::new("rss_feed", 3, false);

        let (articles, source) =
            fetch_news_with_fallback(&primary, &secondary, &tickers(&["AAPL", "MSFT"]), 5).await;

        assert_eq!(source, AnswerSource::YahooApi);
        assert_eq!(articles.len(), 4);
        assert_eq!(secondary.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_primary_falls_back_to_rss() {
        let primary = StubNews::new("yahoo_api", 0, true);
        let secondary = StubNews::new("rss_feed", 1, false);

        let (articles, source) =
            fetch_news_with_fallback(&primary, &secondary, &tickers(&["TSLA"]), 5).await;

        assert_eq!(source, AnswerSource::RssFeed);
        assert_eq!(articles[0].title, "rss_feed story 0");
    }

    #[tokio::test]
    async fn nothing_anywhere_is_none() {
        let primary = StubNews::new("yahoo_api", 0, false);
        let secondary = StubNews::new("rss_feed", 0, true);

        let (articles, source) =
            fetch_news_with_fallback(&primary, &secondary, &tickers(&["TSLA"]), 5).await;

        assert!(articles.is_empty());
        assert_eq!(source, AnswerSource::None);
    }

    #[tokio::test]
    async fn yahoo_search_scrapes_linked_articles() {
        let server = MockServer::start().await;
        let article_url = format!("{}/news/nvda-1", server.uri());

        Mock::given(method("GET"))
            .and(path("/v1/finance/search"))
            .and(query_param("q", "NVDA"))
            .and(query_param("newsCount", "5"))
            .and(query_param("quotesCount", "0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "news": [
                    {"uuid": "1", "title": "Nvidia hits record", "publisher": "Reuters",
                     "link": article_url, "providerPublishTime": 1729000000},
                    {"uuid": "2", "title": "No link"}
                ]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/news/nvda-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("<article><p>Nvidia shares climbed on AI demand.</p></article>"),
            )
            .mount(&server)
            .await;

        let provider =
            YahooNewsProvider::new(&server.uri(), 5, ArticleScraper::new(5).unwrap()).unwrap();
        let articles = provider.fetch("NVDA", 5).await.unwrap();

        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Nvidia hits record");
        assert_eq!(articles[0].full_text, "Nvidia shares climbed on AI demand.");
        assert_eq!(articles[0].summary, articles[0].full_text);
        assert!(articles[0].published.as_deref().unwrap().starts_with("2024-10-15"));
    }

    #[tokio::test]
    async fn rss_uses_description_when_scrape_fails() {
        let server = MockServer::start().await;
        let feed = format!(
            r#"<rss><channel><item>
                <title>Tesla recalls vehicles</title>
                <link>{}/gone</link>
                <description>Recall covers 2 million cars.</description>
                <pubDate>Tue, 15 Oct 2024 10:00:00 +0000</pubDate>
            </item></channel></rss>"#,
            server.uri()
        );

        Mock::given(method("GET"))
            .and(path("/rss/2.0/headline"))
            .and(query_param("s", "TSLA"))
            .and(query_param("region", "US"))
            .and(query_param("lang", "en-US"))
            .respond_with(ResponseTemplate::new(200).set_body_string(feed))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/gone"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let provider =
            RssNewsProvider::new(&server.uri(), 5, ArticleScraper::new(5).unwrap()).unwrap();
        let articles = provider.fetch("tsla", 5).await.unwrap();

        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].ticker, "TSLA");
        assert_eq!(articles[0].full_text, "Recall covers 2 million cars.");
        assert_eq!(
            articles[0].published.as_deref(),
            Some("Tue, 15 Oct 2024 10:00:00 +0000")
        );
    }

    #[tokio::test]
    async fn paragraph_cap_applies_to_search_api_only() {
        let server = MockServer::start().await;
        let page_url = format!("{}/news/long", server.uri());
        let page: String = (0..20).map(|i| format!("<p>Para {i} end.</p>")).collect();

        Mock::given(method("GET"))
            .and(path("/news/long"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!("<article>{page}</article>")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/finance/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "news": [{"title": "Long read", "link": page_url}]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rss/2.0/headline"))
            .respond_with(ResponseTemplate::new(200).set_body_string(format!(
                "<rss><channel><item><title>Long read</title><link>{page_url}</link></item></channel></rss>"
            )))
            .mount(&server)
            .await;

        let scraper = ArticleScraper::new(5).unwrap();
        let yahoo = YahooNewsProvider::new(&server.uri(), 5, scraper.clone()).unwrap();
        let rss = RssNewsProvider::new(&server.uri(), 5, scraper).unwrap();

        let capped = yahoo.fetch("AAPL", 5).await.unwrap();
        assert!(capped[0].full_text.contains("Para 14 end."));
        assert!(!capped[0].full_text.contains("Para 15 end."));

        let full = rss.fetch("AAPL", 5).await.unwrap();
        assert!(full[0].full_text.contains("Para 19 end."));
    }
}
