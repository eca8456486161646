//! AnswerForge CLI: batch Q&A generation with persona-conditioned prompts.
//!
//! Turns question datasets into answer datasets through an OpenAI-compatible
//! chat endpoint, with optional web-search grounding and resumable batching.

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
