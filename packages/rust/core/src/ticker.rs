//! Ticker normalization for raw model output.

use std::collections::BTreeSet;

use stockrag_shared::NO_TICKER;

/// Labels the model sometimes prefixes its answer with.
const LABELS: [&str; 2] = ["TICKER:", "SYMBOL:"];

/// Turn a model answer such as `"Ticker: aapl, TSLA\n"` into `["AAPL", "TSLA"]`.
///
/// Quotes and whitespace are removed, labels stripped, empty entries and
/// `N/A` dropped; the result is deduplicated and sorted.
pub fn normalize(raw: &str) -> Vec<String> {
    let mut cleaned: String = raw
        .chars()
        .filter(|c| !matches!(c, '"' | '\'') && !c.is_whitespace())
        .collect::<String>()
        .to_uppercase();

    for label in LABELS {
        cleaned = cleaned.replace(label, "");
    }

    cleaned
        .trim_matches(',')
        .split(',')
        .filter(|t| !t.is_empty() && *t != NO_TICKER)
        .map(String::from)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Join tickers with `,`, or `N/A` when there are none.
pub fn display(tickers: &[String]) -> String {
    if tickers.is_empty() {
        NO_TICKER.to_string()
    } else {
        tickers.join(",")
    }
}
