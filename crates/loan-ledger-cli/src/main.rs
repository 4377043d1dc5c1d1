mod commands;
mod input;
mod output;

use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::settle::SettleArgs;
use commands::state::StateArgs;

/// Deterministic loan-servicing derivations over a fact file
#[derive(Parser)]
#[command(
    name = "llgr",
    version,
    about = "Deterministic loan-servicing derivations over a fact file",
    long_about = "Loads a JSON fact file into an in-memory fact store and runs the \
                  derivation engine: composed contract state (balances, statuses, \
                  paid-dates) and early-settlement pricing. Facts in, figures out; \
                  nothing is persisted."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,
}

#[derive(Subcommand)]
enum Commands {
    /// Compose a contract's point-in-time state from its facts
    State(StateArgs),
    /// Price an early settlement on a given date
    Settle(SettleArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Minimal,
}

fn main() {
    let cli = Cli::parse();

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::State(args) => commands::state::run_state(args),
        Commands::Settle(args) => commands::settle::run_settle(args),
        Commands::Version => {
            println!("llgr {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
