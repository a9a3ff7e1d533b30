//! StockRAG CLI: ask stock questions and manage the news corpus.
//!
//! Runs the same pipeline as the web UI from the terminal, and provides the
//! corpus bootstrap/ingest and diagnostic commands.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
