//! HTML pages. Every piece of user or model text goes through [`escape`].

use std::fmt::Write;

use stockrag_core::response::{EXCERPT_CHARS, excerpt, price_line};
use stockrag_shared::PipelineState;

const STYLE: &str = "body{font-family:system-ui,sans-serif;max-width:52rem;margin:2rem auto;padding:0 1rem;line-height:1.5}\
textarea{width:100%;min-height:4rem;font:inherit}\
.answer{white-space:pre-wrap;background:#f6f8fa;padding:1rem;border-radius:6px}\
.notice{background:#fff8c5;padding:.5rem 1rem;border-radius:6px}\
.error{background:#ffebe9;padding:.5rem 1rem;border-radius:6px}\
.meta{color:#57606a}";

/// Escape text for an HTML body or a double-quoted attribute.
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn page(body: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>StockRAG</title>\n<style>{STYLE}</style>\n</head>\n<body>\n\
         <h1>StockRAG</h1>\n{body}\n</body>\n</html>\n"
    )
}

fn form(query: &str) -> String {
    format!(
        "<form method=\"post\" action=\"/ask\">\n\
         <label for=\"query\">Ask about a stock</label>\n\
         <textarea id=\"query\" name=\"query\" placeholder=\"How did Nvidia do last quarter?\">{}</textarea>\n\
         <button type=\"submit\">Ask</button>\n</form>",
        escape(query)
    )
}

/// The question form, optionally with a notice above it.
pub fn form_page(notice: Option<&str>, query: &str) -> String {
    let mut body = String::new();
    if let Some(notice) = notice {
        let _ = writeln!(body, "<p class=\"notice\">{}</p>", escape(notice));
    }
    body.push_str(&form(query));
    page(&body)
}

/// Error banner for a failed run, with the form refilled.
pub fn error_page(query: &str, error: &str) -> String {
    let body = format!(
        "<p class=\"error\"><strong>Something went wrong:</strong> {}</p>\n{}",
        escape(error),
        form(query)
    );
    page(&body)
}

/// Answer, prices, source and retrieved documents for a finished run.
pub fn result_page(state: &PipelineState) -> String {
    let mut body = form(&state.query);

    let _ = write!(
        body,
        "\n<h2>Answer</h2>\n<div class=\"answer\">{}</div>\n\
         <p class=\"meta\">Ticker: {} · Source: {}</p>\n",
        escape(state.answer.trim()),
        escape(&state.ticker_display()),
        state.source
    );

    if !state.prices.is_empty() {
        body.push_str("<h2>Prices</h2>\n<ul>\n");
        for outcome in &state.prices {
            let _ = writeln!(body, "<li>{}</li>", escape(&price_line(outcome)));
        }
        body.push_str("</ul>\n");
    }

    if !state.retrieved_docs.is_empty() {
        body.push_str("<h2>Retrieved documents</h2>\n<ol>\n");
        for doc in &state.retrieved_docs {
            let title = match &doc.link {
                Some(link) => format!("<a href=\"{}\">{}</a>", escape(link), escape(&doc.title)),
                None => escape(&doc.title),
            };
            let _ = writeln!(
                body,
                "<li>{title} <span class=\"meta\">({}) score {:.3}</span><br>{}</li>",
                escape(&doc.ticker),
                doc.score,
                escape(&excerpt(&doc.full_text, EXCERPT_CHARS))
            );
        }
        body.push_str("</ol>\n");
    }

    if !state.articles.is_empty() {
        body.push_str("<h2>Articles</h2>\n<ul>\n");
        for article in &state.articles {
            let _ = writeln!(
                body,
                "<li><a href=\"{}\">{}</a> <span class=\"meta\">({})</span></li>",
                escape(&article.link),
                escape(&article.title),
                escape(&article.ticker)
            );
        }
        body.push_str("</ul>\n");
    }

    page(&body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockrag_shared::{AnswerSource, RetrievedDoc};

    #[test]
    fn escapes_markup() {
        assert_eq!(
            escape(r#"<script>alert("x & 'y'")</script>"#),
            "&lt;script&gt;alert(&quot;x &amp; &#39;y&#39;&quot;)&lt;/script&gt;"
        );
    }

    #[test]
    fn result_page_escapes_model_text() {
        let mut state = PipelineState::new("<b>apple</b>?");
        state.answer = "Buy <img src=x onerror=alert(1)>".into();
        state.source = AnswerSource::Rag;
        state.retrieved_docs = vec![RetrievedDoc {
            title: "A & B".into(),
            ticker: "AAPL".into(),
            full_text: "text".into(),
            link: Some("https://news.example/?a=1&b=2".into()),
            score: 0.9,
        }];

        let html = result_page(&state);
        assert!(!html.contains("<img"));
        assert!(html.contains("&lt;img src=x onerror=alert(1)&gt;"));
        assert!(html.contains("&lt;b&gt;apple&lt;/b&gt;?"));
        assert!(html.contains("href=\"https://news.example/?a=1&amp;b=2\""));
        assert!(html.contains("Source: rag"));
    }

    #[test]
    fn form_page_shows_notice() {
        let html = form_page(Some("Please enter a question."), "");
        assert!(html.contains("class=\"notice\""));
        assert!(html.contains("action=\"/ask\""));
    }
}
