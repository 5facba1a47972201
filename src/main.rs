use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use marketlens::core::log::init_logging;
use marketlens::core::symbol::VenueSet;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Show the latest quote for a ticker
    Quote {
        ticker: String,
        /// Asset classification, e.g. "crypto", "us etf", "us reit"
        #[arg(long)]
        hint: Option<String>,
    },
    /// Show fundamental indicators for a ticker
    Fundamentals {
        ticker: String,
        #[arg(long)]
        hint: Option<String>,
    },
    /// Show index quotes for the ticker tape
    Tape {
        /// Tickers to show; defaults to the configured tape
        tickers: Vec<String>,
    },
    /// Print the venue-qualified symbol for a ticker
    Symbol {
        ticker: String,
        #[arg(long)]
        hint: Option<String>,
        /// Venue family: br, us or crypto
        #[arg(long, default_value = "br")]
        venue: VenueSet,
    },
}

impl From<Commands> for marketlens::AppCommand {
    fn from(cmd: Commands) -> marketlens::AppCommand {
        match cmd {
            Commands::Quote { ticker, hint } => marketlens::AppCommand::Quote { ticker, hint },
            Commands::Fundamentals { ticker, hint } => {
                marketlens::AppCommand::Fundamentals { ticker, hint }
            }
            Commands::Tape { tickers } => marketlens::AppCommand::Tape { tickers },
            Commands::Symbol {
                ticker,
                hint,
                venue,
            } => marketlens::AppCommand::Symbol {
                ticker,
                hint,
                venue,
            },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => marketlens::cli::setup::setup_at_path(path),
            None => marketlens::cli::setup::setup(),
        },
        Some(cmd) => marketlens::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
