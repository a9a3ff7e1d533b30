//! Best-effort article body extraction.

use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, warn};

use stockrag_shared::Result;

use crate::build_client;

/// Below this many characters the meta description is preferred.
const MIN_BODY_CHARS: usize = 200;

/// Fetches news pages and pulls out their readable text.
#[derive(Clone)]
pub struct ArticleScraper {
    client: Client,
    max_paragraphs: Option<usize>,
}

impl ArticleScraper {
    pub fn new(timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            max_paragraphs: None,
        })
    }

    /// Keep at most `max` paragraphs of each page.
    pub fn with_paragraph_limit(mut self, max: usize) -> Self {
        self.max_paragraphs = Some(max);
        self
    }

    /// Fetch `url` and extract its text. Any failure yields an empty string.
    pub async fn scrape(&self, url: &str) -> String {
        let response = match self.client.get(url).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(%url, error = %e, "article fetch failed");
                return String::new();
            }
        };

        if !response.status().is_success() {
            debug!(%url, status = %response.status(), "article not available");
            return String::new();
        }

        match response.text().await {
            Ok(html) => extract_article_text(&html, self.max_paragraphs),
            Err(e) => {
                warn!(%url, error = %e, "article body unreadable");
                String::new()
            }
        }
    }
}

/// Extract readable text from an article page.
///
/// Takes paragraphs inside `<article>`, or every `<p>` when there is none,
/// at most `max_paragraphs` of them when given, and falls back to
/// `<meta name="description">` for short bodies.
pub fn extract_article_text(html: &str, max_paragraphs: Option<usize>) -> String {
    let doc = Html::parse_document(html);

    let article_sel = Selector::parse("article p").unwrap();
    let any_sel = Selector::parse("p").unwrap();

    let mut paragraphs: Vec<String> = doc
        .select(&article_sel)
        .map(|el| el.text().collect::<String>().trim().to_string())
        .collect();
    if paragraphs.is_empty() {
        paragraphs = doc
            .select(&any_sel)
            .map(|el| el.text().collect::<String>().trim().to_string())
            .collect();
    }

    let text = paragraphs
        .into_iter()
        .filter(|p| !p.is_empty())
        .take(max_paragraphs.unwrap_or(usize::MAX))
        .collect::<Vec<_>>()
        .join(" ");

    if text.chars().count() < MIN_BODY_CHARS {
        if let Some(description) = meta_description(&doc) {
            return description;
        }
    }

    text.trim().to_string()
}

fn meta_description(doc: &Html) -> Option<String> {
    let sel = Selector::parse(r#"meta[name="description"]"#).unwrap();
    doc.select(&sel)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|c| c.trim().to_string())
        .filter(|c| !c.is_empty())
}
