mod cli;
mod config;
mod engine;
mod export;
mod http;
mod model;
mod storage;
mod transition;

use std::process;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use config::Config;

fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::load(cli.overrides()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = cli::run(cli.command, &config) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
