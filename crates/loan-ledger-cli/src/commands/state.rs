use chrono::NaiveDate;
use clap::Args;
use serde_json::Value;

use loan_ledger_core::facts::{ContractFacts, InMemoryFactStore};
use loan_ledger_core::servicing::compose_state;

use crate::input;

/// Arguments for state composition
#[derive(Args)]
pub struct StateArgs {
    /// Path to the JSON fact file
    #[arg(long)]
    pub facts: String,

    /// Contract identifier
    #[arg(long)]
    pub contract: String,

    /// As-of date (YYYY-MM-DD)
    #[arg(long)]
    pub as_of: NaiveDate,
}

pub fn run_state(args: StateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let facts: ContractFacts = input::file::read_json(&args.facts)?;
    let store = InMemoryFactStore::from_facts(facts)?;
    let state = compose_state(&store, &args.contract, args.as_of)?;
    Ok(serde_json::to_value(state)?)
}
