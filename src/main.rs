mod app;
mod cli;
mod config;
mod consts;
mod controller;
mod core;
mod error;
mod fetch;
mod output;
mod selection;
mod store;
mod utils;

use clap::Parser;
use tracing::debug;

use app::{CommandContext, handle_command};
use cli::Cli;
use config::Config;
use error::AppError;
use output::TableOptions;
use utils::init_logging;

fn run(cli: Cli) -> Result<(), AppError> {
    let config = Config::load(cli.config.as_deref())?;
    let cli = cli.with_config(&config);
    debug!(
        "base={} concurrency={} retries={}",
        cli.base(),
        cli.concurrency(),
        cli.retries()
    );

    let ctx = CommandContext {
        cli: &cli,
        config: &config,
        table: TableOptions {
            use_color: cli.use_color(),
            compact: cli.compact,
        },
    };
    handle_command(&ctx)
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.debug);

    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
