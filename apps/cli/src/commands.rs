//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use stockrag_core::pipeline::{
    Pipeline, ProgressReporter, gemini_client, qdrant_store, require_query,
};
use stockrag_core::{graph, response, ticker};
use stockrag_market::{
    ArticleScraper, RssNewsProvider, StooqProvider, YahooChartProvider, YahooNewsProvider,
    fetch_news_with_fallback, fetch_price_with_fallback,
};
use stockrag_shared::{AppConfig, PipelineState, init_config, resolve_config, validate_api_key};
use stockrag_vector::{IngestProgress, bootstrap, corpus};
use tracing::info;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// StockRAG: stock questions answered from a news corpus and live market data.
#[derive(Parser)]
#[command(
    name = "stockrag",
    version,
    about = "Answer stock questions from a news corpus, live prices and live news.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ~/.stockrag/stockrag.toml).
    #[arg(long, global = true, env = "STOCKRAG_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Ask a question and print the answer.
    Ask {
        /// The question, e.g. "How did Nvidia do last quarter?".
        query: String,

        /// Print the full pipeline state as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Create the vector collection and seed it if empty.
    Init,

    /// Embed a JSON news corpus into the vector collection.
    Ingest {
        /// Corpus file (list of documents or a ticker → articles map).
        file: PathBuf,

        /// Keep existing points instead of recreating the collection.
        #[arg(long)]
        keep: bool,
    },

    /// Fetch recent news for a ticker (Yahoo API, RSS fallback).
    News {
        ticker: String,

        /// Articles to fetch.
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Fetch the current price for a ticker (Yahoo, Stooq fallback).
    Price { ticker: String },

    /// Print the workflow as a Mermaid flowchart.
    Graph {
        /// Write to this file instead of stdout.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "stockrag=info",
        1 => "stockrag=debug",
        _ => "stockrag=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Ask { query, json } => cmd_ask(config_path, &query, json).await,
        Command::Init => cmd_init(config_path).await,
        Command::Ingest { file, keep } => cmd_ingest(config_path, &file, keep).await,
        Command::News { ticker, limit } => cmd_news(config_path, &ticker, limit).await,
        Command::Price { ticker } => cmd_price(config_path, &ticker).await,
        Command::Graph { out } => cmd_graph(out.as_deref()),
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_ask(config_path: Option<&Path>, query: &str, json: bool) -> Result<()> {
    let query = require_query(query)?;

    let config = resolve_config(config_path)?;
    validate_api_key(&config)?;

    let pipeline = Pipeline::from_config(&config)?;
    info!(
        model = %config.gemini.model,
        collection = %config.qdrant.collection,
        top_k = pipeline.settings().top_k,
        "asking"
    );

    let reporter = CliProgress::new();
    let state = reporter.clear_on_err(pipeline.run(query, &reporter).await)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&state)?);
    } else {
        println!();
        println!("{}", state.response);
        println!();
    }
    Ok(())
}

async fn cmd_init(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    validate_api_key(&config)?;

    let store = qdrant_store(&config)?;
    let embedder = gemini_client(&config)?;
    let seed_file = config.qdrant.seed_file.as_deref().map(Path::new);

    let report =
        bootstrap::initialize(&store, &embedder, seed_file, config.qdrant.vector_size).await?;

    println!();
    println!("  Collection:  {}", store.collection());
    println!(
        "  Created:     {}",
        if report.collection_created { "yes" } else { "no" }
    );
    println!("  Existing:    {}", report.existing_points);
    println!("  Seeded:      {}", report.seeded);
    println!();
    Ok(())
}

async fn cmd_ingest(config_path: Option<&Path>, file: &Path, keep: bool) -> Result<()> {
    let config = resolve_config(config_path)?;
    validate_api_key(&config)?;

    let entries = corpus::load_corpus(file)?;
    if entries.is_empty() {
        return Err(eyre!("no articles with text found in {}", file.display()));
    }

    let store = qdrant_store(&config)?;
    let embedder = gemini_client(&config)?;

    info!(
        file = %file.display(),
        entries = entries.len(),
        recreate = !keep,
        "ingesting corpus"
    );

    let reporter = CliProgress::new();
    let written = reporter.clear_on_err(
        bootstrap::ingest(
            &store,
            &embedder,
            &entries,
            config.qdrant.vector_size,
            !keep,
            &reporter,
        )
        .await,
    )?;

    println!();
    println!("  Corpus ingested!");
    println!("  Collection: {}", store.collection());
    println!("  Points:     {written}");
    println!();
    Ok(())
}

async fn cmd_news(config_path: Option<&Path>, symbol: &str, limit: Option<usize>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let tickers = ticker::normalize(symbol);
    if tickers.is_empty() {
        return Err(eyre!("'{symbol}' is not a ticker"));
    }

    let scraper = ArticleScraper::new(config.market.timeout_secs)?;
    let primary = YahooNewsProvider::from_config(&config.market, scraper.clone())?;
    let secondary = RssNewsProvider::from_config(&config.market, scraper)?;
    let limit = limit.unwrap_or(config.market.num_articles);

    let (articles, source) = fetch_news_with_fallback(&primary, &secondary, &tickers, limit).await;

    println!();
    println!("  Source: {source}");
    if articles.is_empty() {
        println!("  No recent articles found for {}.", ticker::display(&tickers));
    }
    for (i, article) in articles.iter().enumerate() {
        println!();
        println!("  {}. {} ({})", i + 1, article.title, article.ticker);
        println!("     {}", article.link);
        if let Some(published) = &article.published {
            println!("     {published}");
        }
        if !article.summary.is_empty() {
            println!("     {}", response::excerpt(&article.summary, 200));
        }
    }
    println!();
    Ok(())
}

async fn cmd_price(config_path: Option<&Path>, symbol: &str) -> Result<()> {
    let config = resolve_config(config_path)?;
    let tickers = ticker::normalize(symbol);
    if tickers.is_empty() {
        return Err(eyre!("'{symbol}' is not a ticker"));
    }

    let primary = YahooChartProvider::from_config(&config.market)?;
    let secondary = StooqProvider::from_config(&config.market)?;

    println!();
    for symbol in &tickers {
        let outcome = fetch_price_with_fallback(&primary, &secondary, symbol).await;
        println!("  {}", response::price_line(&outcome));
    }
    println!();
    Ok(())
}

fn cmd_graph(out: Option<&Path>) -> Result<()> {
    let diagram = graph::workflow_mermaid();
    match out {
        Some(path) => {
            std::fs::write(path, &diagram)
                .map_err(|e| eyre!("cannot write {}: {e}", path.display()))?;
            println!("Workflow diagram written to: {}", path.display());
        }
        None => print!("{diagram}"),
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config: AppConfig = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    /// Clear the spinner when `result` is an error so the report is not garbled.
    fn clear_on_err<T>(&self, result: stockrag_shared::Result<T>) -> Result<T> {
        if result.is_err() {
            self.spinner.finish_and_clear();
        }
        Ok(result?)
    }
}

impl ProgressReporter for CliProgress {
    fn step(&self, name: &str) {
        self.spinner.set_message(step_label(name).to_string());
    }

    fn done(&self, _state: &PipelineState) {
        self.spinner.finish_and_clear();
    }
}

impl IngestProgress for CliProgress {
    fn embedded(&self, done: usize, total: usize) {
        self.spinner.set_message(format!("Embedding [{done}/{total}]"));
    }

    fn stored(&self, total: usize) {
        self.spinner.finish_and_clear();
        info!(points = total, "points stored");
    }
}

fn step_label(step: &str) -> &str {
    match step {
        "extract_ticker" => "Extracting ticker",
        "semantic_search" => "Searching news corpus",
        "fetch_price" => "Fetching prices",
        "summarize" => "Summarizing",
        "format_response" => "Formatting answer",
        other => other,
    }
}
