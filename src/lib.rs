pub mod cli;
pub mod core;
pub mod providers;
pub mod resolver;

use crate::core::config::AppConfig;
use crate::core::symbol::VenueSet;
use anyhow::Result;
use tracing::{debug, info};

pub enum AppCommand {
    Quote {
        ticker: String,
        hint: Option<String>,
    },
    Fundamentals {
        ticker: String,
        hint: Option<String>,
    },
    /// An empty list falls back to the configured tape.
    Tape {
        tickers: Vec<String>,
    },
    Symbol {
        ticker: String,
        hint: Option<String>,
        venue: VenueSet,
    },
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("marketlens starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");

    let resolver = resolver::build_from_config(&config);

    match command {
        AppCommand::Quote { ticker, hint } => {
            cli::quote::run(&resolver, &ticker, hint.as_deref()).await
        }
        AppCommand::Fundamentals { ticker, hint } => {
            cli::fundamentals::run(&resolver, &ticker, hint.as_deref()).await
        }
        AppCommand::Tape { tickers } => {
            let tickers = if tickers.is_empty() {
                config.tape.tickers.clone()
            } else {
                tickers
            };
            cli::tape::run(&resolver, &tickers).await
        }
        AppCommand::Symbol {
            ticker,
            hint,
            venue,
        } => cli::symbol::run(resolver.catalog(), &ticker, hint.as_deref(), venue),
    }
}
