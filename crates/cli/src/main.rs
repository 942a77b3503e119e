use anyhow::Result;
use clap::Parser;

mod cli;
mod config;
mod keys;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.run().await
}
