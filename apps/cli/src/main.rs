//! StoryCheck CLI: structure and rhetoric review for hierarchical documents.
//!
//! Reads a document's paragraphs, rebuilds its Summary → Story → Body
//! structure, asks the evaluation service for a review, and writes the
//! findings back as per-paragraph annotations.

mod commands;
mod document;

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
