use chrono::NaiveDate;
use napi::Result as NapiResult;
use napi_derive::napi;

use loan_ledger_core::facts::{ContractFacts, InMemoryFactStore};
use loan_ledger_core::servicing;
use loan_ledger_core::settlement;

/// Convert any Display error into a napi::Error.
fn to_napi_error(e: impl std::fmt::Display) -> napi::Error {
    napi::Error::from_reason(e.to_string())
}

fn parse_date(input: &str, field: &str) -> NapiResult<NaiveDate> {
    input
        .parse()
        .map_err(|_| napi::Error::from_reason(format!("{field} must be YYYY-MM-DD, got '{input}'")))
}

fn store_from(facts_json: &str) -> NapiResult<InMemoryFactStore> {
    let facts: ContractFacts = serde_json::from_str(facts_json).map_err(to_napi_error)?;
    InMemoryFactStore::from_facts(facts).map_err(to_napi_error)
}

// ---------------------------------------------------------------------------
// Derivation engine
// ---------------------------------------------------------------------------

#[napi]
pub fn compose_state(facts_json: String, contract_id: String, as_of: String) -> NapiResult<String> {
    let store = store_from(&facts_json)?;
    let as_of = parse_date(&as_of, "as_of")?;
    let state = servicing::compose_state(&store, &contract_id, as_of).map_err(to_napi_error)?;
    serde_json::to_string(&state).map_err(to_napi_error)
}

#[napi]
pub fn calculate_settlement(
    facts_json: String,
    contract_id: String,
    settlement_date: String,
    penalty_days: u32,
    manual_override: Option<String>,
) -> NapiResult<String> {
    let store = store_from(&facts_json)?;
    let date = parse_date(&settlement_date, "settlement_date")?;
    let manual_override = manual_override
        .map(|raw| {
            raw.parse::<rust_decimal::Decimal>().map_err(|_| {
                napi::Error::from_reason(format!("manual_override must be a decimal, got '{raw}'"))
            })
        })
        .transpose()?;
    let state = servicing::compose_state(&store, &contract_id, date).map_err(to_napi_error)?;
    let result = settlement::calculate_settlement(&state, date, penalty_days, manual_override)
        .map_err(to_napi_error)?;
    serde_json::to_string(&result).map_err(to_napi_error)
}
