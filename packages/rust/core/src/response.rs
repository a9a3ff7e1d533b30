//! Rendering the final answer text.

use std::fmt::Write;

use stockrag_shared::{PipelineState, PriceOutcome, RetrievedDoc};

/// Characters of each retrieved document shown under its title.
pub const EXCERPT_CHARS: usize = 250;

/// Render the accumulated state as Markdown-ish text.
pub fn format_response(state: &PipelineState) -> String {
    let mut out = String::new();

    out.push_str(state.answer.trim());
    out.push_str("\n\n");

    let _ = writeln!(out, "**Ticker:** {}", state.ticker_display());

    if !state.prices.is_empty() {
        out.push_str("\n**Prices**\n");
        for outcome in &state.prices {
            let _ = writeln!(out, "- {}", price_line(outcome));
        }
    }

    let _ = writeln!(out, "\n**Source:** {}", state.source);

    if !state.retrieved_docs.is_empty() {
        out.push_str("\n**Retrieved documents**\n");
        for (i, doc) in state.retrieved_docs.iter().enumerate() {
            let _ = writeln!(out, "{}", doc_entry(i + 1, doc));
        }
    }

    out.trim_end().to_string()
}

/// One line describing a price outcome.
pub fn price_line(outcome: &PriceOutcome) -> String {
    match outcome {
        PriceOutcome::Quoted {
            quote,
            fallback_used,
        } => {
            let mut line = format!("{}: {:.2}", quote.symbol, quote.price);
            if let Some(currency) = &quote.currency {
                let _ = write!(line, " {currency}");
            }
            if let Some(pct) = quote.change_pct() {
                let _ = write!(line, " ({pct:+.2}%)");
            }
            let _ = write!(line, " via {}", quote.provider);
            if *fallback_used {
                line.push_str(" (fallback)");
            }
            line
        }
        PriceOutcome::Unavailable { symbol, error } => {
            format!("Price unavailable for {symbol}: {error}")
        }
    }
}

fn doc_entry(n: usize, doc: &RetrievedDoc) -> String {
    format!(
        "{n}. {} ({}) · score {:.3}\n   {}",
        doc.title,
        doc.ticker,
        doc.score,
        excerpt(&doc.full_text, EXCERPT_CHARS)
    )
}

/// First `max_chars` characters of `text`, with an ellipsis when cut.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let text = text.trim();
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}…", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockrag_shared::{AnswerSource, PriceQuote};

    fn quote(symbol: &str, price: f64, provider: &str) -> PriceQuote {
        PriceQuote {
            symbol: symbol.into(),
            price,
            currency: Some("USD".into()),
            previous_close: Some(100.0),
            as_of: None,
            provider: provider.into(),
        }
    }

    #[test]
    fn renders_answer_prices_source_and_docs() {
        let mut state = PipelineState::new("How is Apple doing?");
        state.tickers = vec!["AAPL".into()];
        state.answer = "Apple beat estimates.".into();
        state.source = AnswerSource::Rag;
        state.prices = vec![PriceOutcome::Quoted {
            quote: quote("AAPL", 102.0, "yahoo"),
            fallback_used: false,
        }];
        state.retrieved_docs = vec![RetrievedDoc {
            title: "Apple earnings".into(),
            ticker: "AAPL".into(),
            full_text: "x".repeat(300),
            link: None,
            score: 0.81234,
        }];

        let text = format_response(&state);
        assert!(text.starts_with("Apple beat estimates."));
        assert!(text.contains("**Ticker:** AAPL"));
        assert!(text.contains("- AAPL: 102.00 USD (+2.00%) via yahoo"));
        assert!(text.contains("**Source:** rag"));
        assert!(text.contains("1. Apple earnings (AAPL) · score 0.812"));
        assert!(text.contains(&format!("{}…", "x".repeat(250))));
    }

    #[test]
    fn unavailable_price_is_an_error_line() {
        let line = price_line(&PriceOutcome::Unavailable {
            symbol: "ZZZZ".into(),
            error: "yahoo: timeout; stooq: no data".into(),
        });
        assert_eq!(line, "Price unavailable for ZZZZ: yahoo: timeout; stooq: no data");
    }

    #[test]
    fn fallback_quote_is_marked() {
        let line = price_line(&PriceOutcome::Quoted {
            quote: quote("MSFT", 100.0, "stooq"),
            fallback_used: true,
        });
        assert!(line.ends_with("via stooq (fallback)"));
    }

    #[test]
    fn no_docs_no_prices() {
        let mut state = PipelineState::new("hello");
        state.answer = "No relevant data found.".into();
        let text = format_response(&state);
        assert!(text.contains("**Ticker:** N/A"));
        assert!(!text.contains("**Prices**"));
        assert!(!text.contains("Retrieved documents"));
        assert!(text.ends_with("**Source:** none"));
    }

    #[test]
    fn short_excerpt_is_untouched() {
        assert_eq!(excerpt("  short  ", 250), "short");
    }
}
