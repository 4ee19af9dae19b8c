//! dxtscout CLI: discovers Desktop Extension (DXT) manifests on GitHub.
//!
//! Searches GitHub for repositories that look like extensions, checks them
//! for a manifest, and keeps a deduplicated record store for the
//! categorization and digest jobs that run downstream.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    // A missing .env is fine; the variables may come from the real environment.
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
