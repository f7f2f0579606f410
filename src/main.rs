use anyhow::Result;
use clap::Parser;

mod cli;

use cli::args::Cli;
use cli::context::init_tracing;
use swap_settler::config::load_config;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = load_config(cli.config.clone())?;
    init_tracing(&config.global.logging)?;
    cli::run(cli, config).await
}
