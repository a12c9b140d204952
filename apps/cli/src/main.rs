//! agent-bridge CLI: distribute agents, skills, and workflows to AI coding tools.
//!
//! Syncs registered knowledge sources, merges them with the built-in bundle
//! and the project-local tree, and renders the result for each target tool.

mod commands;

use std::process::ExitCode;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    let outcome = commands::run(cli).await?;
    Ok(ExitCode::from(outcome.exit_code()))
}
