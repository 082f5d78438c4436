//! tabharvest CLI: harvest magnet links from every open context of a session.
//!
//! Tabs through a saved browser session so every page materializes, asks for
//! confirmation, then extracts identifiers from all pages at once and saves
//! them to a timestamped text file.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
