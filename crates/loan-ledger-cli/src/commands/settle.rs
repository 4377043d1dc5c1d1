use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;
use serde_json::Value;

use loan_ledger_core::facts::{ContractFacts, InMemoryFactStore};
use loan_ledger_core::servicing::compose_state;
use loan_ledger_core::settlement::calculate_settlement;

use crate::input;

/// Arguments for early-settlement pricing
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct SettleArgs {
    /// Path to the JSON fact file
    #[arg(long)]
    pub facts: String,

    /// Contract identifier
    #[arg(long)]
    pub contract: String,

    /// Settlement date (YYYY-MM-DD)
    #[arg(long)]
    pub date: NaiveDate,

    /// Calendar days of penalty interest to project forward
    #[arg(long, default_value_t = 0)]
    pub penalty_days: u32,

    /// Replace the computed accrued-unpaid-profit figure
    #[arg(long)]
    pub manual_override: Option<Decimal>,
}

pub fn run_settle(args: SettleArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let facts: ContractFacts = input::file::read_json(&args.facts)?;
    let store = InMemoryFactStore::from_facts(facts)?;
    let state = compose_state(&store, &args.contract, args.date)?;
    let result = calculate_settlement(&state, args.date, args.penalty_days, args.manual_override)?;
    Ok(serde_json::to_value(result)?)
}
