mod app;
mod cli;
mod db;
mod http;
mod paths;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    env_logger::init();
    let cli = cli::Cli::parse();
    app::run(cli)
}
