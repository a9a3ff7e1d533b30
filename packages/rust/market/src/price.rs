//! Price providers and the primary/secondary fallback.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime};
use reqwest::Client;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use stockrag_shared::{MarketConfig, PriceOutcome, PriceQuote, Result, StockRagError};

use crate::{PriceProvider, build_client, endpoint, get_text};

// ---------------------------------------------------------------------------
// Yahoo chart API
// ---------------------------------------------------------------------------

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    meta: ChartMeta,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    regular_market_price: Option<f64>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    chart_previous_close: Option<f64>,
    #[serde(default)]
    regular_market_time: Option<i64>,
}

/// Quotes from Yahoo's chart endpoint (the same one the finance site uses).
pub struct YahooChartProvider {
    client: Client,
    base_url: String,
}

impl YahooChartProvider {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: base_url.to_string(),
        })
    }

    pub fn from_config(config: &MarketConfig) -> Result<Self> {
        Self::new(&config.yahoo_base_url, config.timeout_secs)
    }

    fn parse_response(symbol: &str, body: &str) -> Result<PriceQuote> {
        let resp: ChartResponse = serde_json::from_str(body)
            .map_err(|e| StockRagError::parse(format!("yahoo chart for {symbol}: {e}")))?;

        let data = resp
            .chart
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| match resp.chart.error {
                Some(err) => StockRagError::MarketData(format!(
                    "yahoo chart for {symbol}: {}: {}",
                    err.code, err.description
                )),
                None => StockRagError::MarketData(format!("yahoo chart for {symbol}: empty result")),
            })?;

        let meta = data.meta;
        let price = meta.regular_market_price.ok_or_else(|| {
            StockRagError::MarketData(format!("yahoo chart for {symbol}: no market price"))
        })?;

        Ok(PriceQuote {
            symbol: symbol.to_string(),
            price,
            currency: meta.currency,
            previous_close: meta.chart_previous_close,
            as_of: meta
                .regular_market_time
                .and_then(|ts| DateTime::from_timestamp(ts, 0)),
            provider: "yahoo".to_string(),
        })
    }
}

#[async_trait]
impl PriceProvider for YahooChartProvider {
    fn name(&self) -> &str {
        "yahoo"
    }

    #[instrument(skip(self), fields(provider = "yahoo"))]
    async fn quote(&self, symbol: &str) -> Result<PriceQuote> {
        let url = endpoint(
            &self.base_url,
            &["v8", "finance", "chart", symbol],
            &[("range", "1d"), ("interval", "1d")],
        )?;
        let body = get_text(&self.client, &url).await?;
        Self::parse_response(symbol, &body)
    }
}

// ---------------------------------------------------------------------------
// Stooq CSV quote API
// ---------------------------------------------------------------------------

/// One row of the Stooq `sd2t2ohlcv` CSV.
#[derive(Debug, Deserialize)]
struct StooqRow {
    #[serde(rename = "Date")]
    date: String,
    #[serde(rename = "Time")]
    time: String,
    #[serde(rename = "Close")]
    close: String,
}

/// Quotes from Stooq's keyless CSV endpoint.
pub struct StooqProvider {
    client: Client,
    base_url: String,
}

impl StooqProvider {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout_secs)?,
            base_url: base_url.to_string(),
        })
    }

    pub fn from_config(config: &MarketConfig) -> Result<Self> {
        Self::new(&config.stooq_base_url, config.timeout_secs)
    }

    /// Stooq symbols are lowercase; bare US tickers need the `.us` suffix.
    pub fn stooq_symbol(symbol: &str) -> String {
        let lower = symbol.trim().to_lowercase();
        if lower.contains('.') || lower.starts_with('^') {
            lower
        } else {
            format!("{lower}.us")
        }
    }

    fn parse_csv(symbol: &str, body: &str) -> Result<PriceQuote> {
        let mut reader = csv::Reader::from_reader(body.as_bytes());
        let row: StooqRow = reader
            .deserialize()
            .next()
            .ok_or_else(|| StockRagError::MarketData(format!("stooq for {symbol}: empty CSV")))?
            .map_err(|e| StockRagError::parse(format!("stooq for {symbol}: {e}")))?;

        if row.close.eq_ignore_ascii_case("N/D") {
            return Err(StockRagError::MarketData(format!(
                "stooq for {symbol}: no data"
            )));
        }

        let price: f64 = row.close.parse().map_err(|_| {
            StockRagError::parse(format!("stooq for {symbol}: bad close {:?}", row.close))
        })?;

        let as_of = NaiveDateTime::parse_from_str(
            &format!("{} {}", row.date, row.time),
            "%Y-%m-%d %H:%M:%S",
        )
        .ok()
        .map(|dt| dt.and_utc());

        Ok(PriceQuote {
            symbol: symbol.to_string(),
            price,
            currency: None,
            previous_close: None,
            as_of,
            provider: "stooq".to_string(),
        })
    }
}

#[async_trait]
impl PriceProvider for StooqProvider {
    fn name(&self) -> &str {
        "stooq"
    }

    #[instrument(skip(self), fields(provider = "stooq"))]
    async fn quote(&self, symbol: &str) -> Result<PriceQuote> {
        let stooq_symbol = Self::stooq_symbol(symbol);
        let mut url = endpoint(&self.base_url, &["q", "l", ""], &[])?;
        url.query_pairs_mut()
            .append_pair("s", &stooq_symbol)
            .append_pair("f", "sd2t2ohlcv")
            .append_key_only("h")
            .append_pair("e", "csv");
        let body = get_text(&self.client, &url).await?;
        Self::parse_csv(symbol, &body)
    }
}

// ---------------------------------------------------------------------------
// Fallback
// ---------------------------------------------------------------------------

/// Quote `symbol` from `primary`, asking `secondary` once if that fails.
///
/// Never errors: when both providers fail the outcome is
/// [`PriceOutcome::Unavailable`] with both messages.
#[instrument(skip(primary, secondary), fields(primary_provider = primary.name(), fallback_provider = secondary.name()))]
pub async fn fetch_price_with_fallback(
    primary: &dyn PriceProvider,
    secondary: &dyn PriceProvider,
    symbol: &str,
) -> PriceOutcome {
    let primary_err = match primary.quote(symbol).await {
        Ok(quote) => {
            info!(symbol, price = quote.price, "price fetched");
            return PriceOutcome::Quoted {
                quote,
                fallback_used: false,
            };
        }
        Err(e) => e,
    };

    warn!(symbol, error = %primary_err, "primary price provider failed, trying fallback");

    match secondary.quote(symbol).await {
        Ok(quote) => {
            info!(symbol, price = quote.price, "fallback price fetched");
            PriceOutcome::Quoted {
                quote,
                fallback_used: true,
            }
        }
        Err(fallback_err) => {
            warn!(symbol, error = %fallback_err, "fallback price provider failed");
            PriceOutcome::Unavailable {
                symbol: symbol.to_string(),
                error: format!(
                    "{}: {primary_err}; {}: {fallback_err}",
                    primary.name(),
                    secondary.name()
                ),
            }
        }
    }
}
