//! cfpscout CLI: collect call-for-papers pages and extract CFP records.
//!
//! URLs go into a persistent work queue; `extract` fetches them (rendering
//! client-side pages when needed), runs the extraction strategies and writes
//! the merged records to a JSON-lines file.

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
