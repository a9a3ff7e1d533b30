//! StockRAG web UI: a question form, a JSON endpoint and a health probe.
//!
//! Startup makes sure the Qdrant collection exists (seeding it from the
//! configured corpus when empty) before the server accepts requests.

mod render;
mod routes;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use stockrag_core::{Pipeline, gemini_client, qdrant_store};
use stockrag_shared::{resolve_config, validate_api_key};
use stockrag_vector::bootstrap;
use tracing::info;

use routes::AppState;

/// Serve the StockRAG question form over HTTP.
#[derive(Parser)]
#[command(name = "stockrag-web", version, long_about = None)]
struct Args {
    /// Address to bind (overrides `[server].bind`).
    #[arg(long, env = "STOCKRAG_BIND")]
    bind: Option<String>,

    /// Config file (defaults to ~/.stockrag/stockrag.toml).
    #[arg(long, env = "STOCKRAG_CONFIG")]
    config: Option<PathBuf>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text")]
    log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Clone, Debug, clap::ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(args: &Args) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match args.verbose {
        0 => "stockrag=info",
        1 => "stockrag=debug",
        _ => "stockrag=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match args.log_format {
        LogFormat::Text => fmt().with_env_filter(env_filter).with_target(false).init(),
        LogFormat::Json => fmt().json().with_env_filter(env_filter).init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    let args = Args::parse();
    init_tracing(&args);

    let config = resolve_config(args.config.as_deref())?;
    validate_api_key(&config)?;

    let store = qdrant_store(&config)?;
    let embedder = gemini_client(&config)?;
    let seed_file = config.qdrant.seed_file.as_deref().map(Path::new);
    let report = bootstrap::initialize(&store, &embedder, seed_file, config.qdrant.vector_size)
        .await
        .wrap_err_with(|| format!("could not prepare collection at {}", config.qdrant.url))?;
    info!(
        collection = %store.collection(),
        created = report.collection_created,
        existing = report.existing_points,
        seeded = report.seeded,
        "vector store ready"
    );

    let pipeline = Pipeline::from_config(&config)?;
    let app = routes::create_router(AppState::new(Arc::new(pipeline)));

    let bind = args.bind.unwrap_or(config.server.bind);
    let listener = tokio::net::TcpListener::bind(&bind)
        .await
        .wrap_err_with(|| format!("could not bind {bind}"))?;
    info!(%bind, "listening");

    axum::serve(listener, app).await?;
    Ok(())
}
