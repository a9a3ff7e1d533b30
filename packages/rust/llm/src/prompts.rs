//! Prompt templates for the three model calls of the workflow.

use stockrag_shared::{AnswerSource, Article, NO_RELEVANT_DATA, RetrievedDoc};

use crate::GenerationOptions;

/// The kinds of prompt the pipeline sends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptKind {
    ExtractTicker,
    AnswerFromContext,
    SummarizeArticles,
}

impl PromptKind {
    /// Name used in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ExtractTicker => "extract_ticker",
            Self::AnswerFromContext => "answer_from_context",
            Self::SummarizeArticles => "summarize_articles",
        }
    }

    /// Sampling settings for this kind of call.
    pub fn options(&self) -> GenerationOptions {
        match self {
            Self::ExtractTicker => GenerationOptions {
                temperature: 0.1,
                max_output_tokens: Some(20),
            },
            Self::AnswerFromContext | Self::SummarizeArticles => GenerationOptions {
                temperature: 0.2,
                max_output_tokens: None,
            },
        }
    }
}

/// Ask the model for the ticker symbol(s) mentioned in `query`.
pub fn ticker_prompt(query: &str) -> String {
    format!(
        "You are a **financial data assistant**.

Task:
Extract the **official stock ticker symbol(s)** for any company or organization
mentioned in the user's question below.

Rules:
- Output only ticker symbols (e.g., AAPL, TSLA, GOOGL, MSFT, TCS.NS)
- If multiple tickers, return comma-separated (no spaces)
- If unsure, infer from company name (e.g., Google -> GOOG, TCS -> TCS.NS)
- If no company is found, return exactly: N/A
- Do NOT include explanations or text, only tickers.

User question:
{query}

Answer:
"
    )
}

/// Ask the model to answer `query` strictly from the retrieved corpus documents.
pub fn rag_prompt(query: &str, docs: &[RetrievedDoc], max_chars: usize) -> String {
    let context = docs
        .iter()
        .enumerate()
        .map(|(i, doc)| format!("[{}] {} ({})\n{}", i + 1, doc.title, doc.ticker, doc.full_text))
        .collect::<Vec<_>>()
        .join("\n\n");
    let context = truncate_context(&context, max_chars);

    format!(
        "You are a financial assistant. Answer the question *only* using the following context.
If the context is irrelevant to the question, reply EXACTLY: \"{NO_RELEVANT_DATA}\"

Context:
{context}

Question: {query}
Answer:
"
    )
}

/// Ask the model to summarize live articles about `tickers`.
pub fn articles_prompt(
    tickers: &str,
    source: AnswerSource,
    articles: &[Article],
    max_chars: usize,
) -> String {
    let context = articles
        .iter()
        .enumerate()
        .map(|(i, a)| {
            format!(
                "[{}] {}\n{}\n{}\n{}",
                i + 1,
                a.title,
                a.summary,
                a.full_text,
                a.link
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");
    let context = truncate_context(&context, max_chars);
    let source = source.label();

    format!(
        "You are a financial assistant.
Summarize the following {source} articles about {tickers}.
Highlight market updates, analyst opinions, and investor sentiment.

Articles:
{context}

Summary:
"
    )
}

/// Keep at most `max_chars` characters of `text`, cutting on a char boundary.
pub fn truncate_context(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(title: &str, ticker: &str, text: &str) -> RetrievedDoc {
        RetrievedDoc {
            title: title.into(),
            ticker: ticker.into(),
            full_text: text.into(),
            link: None,
            score: 0.9,
        }
    }

    #[test]
    fn truncate_short_content() {
        assert_eq!(truncate_context("short text", 100), "short text");
    }

    #[test]
    fn truncate_long_content() {
        let content = "a".repeat(200);
        assert_eq!(truncate_context(&content, 100).len(), 100);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let content = "é".repeat(10);
        let cut = truncate_context(&content, 3);
        assert_eq!(cut, "ééé");
    }

    #[test]
    fn ticker_prompt_embeds_query() {
        let prompt = ticker_prompt("How is Apple doing?");
        assert!(prompt.contains("How is Apple doing?"));
        assert!(prompt.contains("return exactly: N/A"));
    }

    #[test]
    fn rag_prompt_numbers_documents() {
        let docs = vec![
            doc("Apple beats estimates", "AAPL", "Revenue rose."),
            doc("iPhone sales", "AAPL", "Units up."),
        ];
        let prompt = rag_prompt("apple results?", &docs, 7_000);
        assert!(prompt.contains("[1] Apple beats estimates (AAPL)\nRevenue rose."));
        assert!(prompt.contains("[2] iPhone sales (AAPL)"));
        assert!(prompt.contains(NO_RELEVANT_DATA));
    }

    #[test]
    fn rag_prompt_truncates_context() {
        let docs = vec![doc("Long", "X", &"z".repeat(10_000))];
        let prompt = rag_prompt("q", &docs, 50);
        assert!(!prompt.contains(&"z".repeat(60)));
    }

    #[test]
    fn articles_prompt_names_source() {
        let articles = vec![Article {
            ticker: "GOOG".into(),
            title: "Alphabet news".into(),
            link: "https://example.com/a".into(),
            summary: "snippet".into(),
            full_text: "body".into(),
            published: None,
        }];
        let prompt = articles_prompt("GOOG", AnswerSource::RssFeed, &articles, 7_000);
        assert!(prompt.contains("Summarize the following rss feed articles about GOOG."));
        assert!(prompt.contains("[1] Alphabet news\nsnippet\nbody\nhttps://example.com/a"));
    }

    #[test]
    fn prompt_kind_options() {
        let opts = PromptKind::ExtractTicker.options();
        assert_eq!(opts.max_output_tokens, Some(20));
        assert_eq!(PromptKind::SummarizeArticles.as_str(), "summarize_articles");
    }
}
