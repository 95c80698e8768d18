//! Binary crate for the `weather` command-line tool.
//!
//! This crate focuses on:
//! - Parsing CLI arguments
//! - The interactive menu
//! - Serving the HTTP API
//! - Human-friendly output formatting

use clap::Parser;

mod cli;
mod logging;
mod menu;
mod server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cmd = cli::Cli::parse();
    logging::init(cmd.verbose, cmd.quiet, cmd.command.default_log_level());
    cmd.run().await
}
