//! Workflow diagram export.

/// Mermaid flowchart of the query workflow, including the summarize branches.
pub fn workflow_mermaid() -> String {
    let lines = [
        "flowchart TD",
        "    start([query]) --> extract_ticker[extract_ticker]",
        "    extract_ticker --> semantic_search[semantic_search]",
        "    semantic_search --> fetch_price[fetch_price]",
        "    fetch_price --> has_docs{corpus hits?}",
        "    has_docs -- yes --> summarize_rag[summarize: RAG]",
        "    has_docs -- no --> yahoo_fetch[fetch news: Yahoo API]",
        "    summarize_rag -- rag --> format_response[format_response]",
        "    summarize_rag -- rag_empty --> yahoo_fetch",
        "    yahoo_fetch -- articles --> summarize_news[summarize: articles]",
        "    yahoo_fetch -- empty or error --> rss_fallback[fetch news: RSS feed]",
        "    rss_fallback --> summarize_news",
        "    summarize_news --> format_response",
        "    format_response --> done([response])",
    ];
    let mut out = lines.join("\n");
    out.push('\n');
    out
}
