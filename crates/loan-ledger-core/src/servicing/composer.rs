//! State composition: raw facts in, a complete point-in-time snapshot out.
//!
//! Nothing here is read from storage beyond one consistent snapshot, and
//! nothing is written back. Composing twice over the same fact set and
//! as-of date yields byte-identical output: every collection in the result
//! has a fixed ordering and there are no hidden clocks.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::facts::model::{delinquency_days, deposit_held, waterfall_funds, Contract};
use crate::facts::store::{ContractFacts, FactStore};
use crate::servicing::paid_dates::paid_dates;
use crate::servicing::status::{
    contract_status, fee_status, installment_status, ContractStatus, FeeStatus, InstallmentStatus,
};
use crate::types::Money;
use crate::waterfall::{allocate, Allocation, DueFee};
use crate::LedgerResult;

// ---------------------------------------------------------------------------
// Output types
// ---------------------------------------------------------------------------

/// A fee enriched with its waterfall result. Ordered by effective due date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeState {
    pub id: String,
    pub kind: String,
    pub amount: Money,
    /// Effective due date: stored, or derived from disbursement + offset.
    pub due_date: NaiveDate,
    pub paid: Money,
    pub outstanding: Money,
    pub status: FeeStatus,
}

/// An installment enriched with its waterfall result and replay-derived
/// paid-date. Ordered by sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstallmentState {
    pub sequence: u32,
    pub due_date: NaiveDate,
    pub principal_due: Money,
    pub profit_due: Money,
    pub remaining_principal: Money,
    pub profit_paid: Money,
    pub principal_paid: Money,
    pub total_paid: Money,
    pub outstanding: Money,
    pub status: InstallmentStatus,
    /// Days past due as of the paid date (if settled) or the as-of date.
    pub days_delinquent: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paid_date: Option<NaiveDate>,
}

/// The full computed snapshot of a contract. Plain serializable data;
/// nothing in here is ever stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractState {
    pub contract: Contract,
    pub as_of: NaiveDate,
    pub status: ContractStatus,
    pub fees: Vec<FeeState>,
    pub installments: Vec<InstallmentState>,
    pub fees_due: Money,
    pub fees_paid: Money,
    pub principal_due: Money,
    pub principal_paid: Money,
    pub profit_due: Money,
    pub profit_paid: Money,
    pub total_outstanding: Money,
    pub credit_balance: Money,
    pub deposit_held: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maturity_date: Option<NaiveDate>,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Compose the contract's state as of `as_of`, reading all facts through
/// one consistent snapshot of the injected store.
pub fn compose_state(
    store: &impl FactStore,
    contract_id: &str,
    as_of: NaiveDate,
) -> LedgerResult<ContractState> {
    let facts = store.snapshot(contract_id)?;
    Ok(compose_from_facts(&facts, as_of))
}

/// Pure core of the composition: a closed computation over one value
/// snapshot.
pub fn compose_from_facts(facts: &ContractFacts, as_of: NaiveDate) -> ContractState {
    let contract = &facts.contract;
    let disbursed = contract.disbursed_at.map(|ts| ts.date());

    // Resolve fee due dates, then fix the ordering for determinism.
    let mut due_fees: Vec<DueFee> = facts
        .fees
        .iter()
        .map(|fee| DueFee {
            id: fee.id.clone(),
            kind: fee.kind.clone(),
            amount: fee.amount,
            due_date: fee.effective_due_date(disbursed, as_of),
        })
        .collect();
    due_fees.sort_by(|a, b| (a.due_date, &a.id).cmp(&(b.due_date, &b.id)));

    let mut installments = facts.installments.clone();
    installments.sort_by_key(|installment| installment.sequence);

    let funds = waterfall_funds(
        &contract.id,
        &facts.payments,
        &facts.disbursements,
        &facts.deposits,
        &facts.principal_allocations,
    );
    let outcome = allocate(&due_fees, &installments, funds);
    let paid_on = paid_dates(&outcome.allocations, facts);

    let fee_kinds: BTreeMap<&str, &str> = due_fees
        .iter()
        .map(|fee| (fee.id.as_str(), fee.kind.as_str()))
        .collect();
    let remaining_principal: BTreeMap<u32, Money> = installments
        .iter()
        .map(|installment| (installment.sequence, installment.remaining_principal))
        .collect();

    let mut fee_states = Vec::new();
    let mut installment_states = Vec::new();
    for allocation in &outcome.allocations {
        match allocation {
            Allocation::Fee {
                fee_id,
                due_date,
                amount_due,
                amount_paid,
            } => fee_states.push(FeeState {
                id: fee_id.clone(),
                kind: fee_kinds.get(fee_id.as_str()).copied().unwrap_or("").to_string(),
                amount: *amount_due,
                due_date: *due_date,
                paid: *amount_paid,
                outstanding: *amount_due - *amount_paid,
                status: fee_status(*amount_paid, *amount_due),
            }),
            Allocation::Installment {
                sequence,
                due_date,
                profit_due,
                principal_due,
                profit_paid,
                principal_paid,
            } => {
                let total_due = *profit_due + *principal_due;
                let total_paid = *profit_paid + *principal_paid;
                let paid_date = paid_on.get(sequence).copied();
                installment_states.push(InstallmentState {
                    sequence: *sequence,
                    due_date: *due_date,
                    principal_due: *principal_due,
                    profit_due: *profit_due,
                    remaining_principal: remaining_principal
                        .get(sequence)
                        .copied()
                        .unwrap_or(Decimal::ZERO),
                    profit_paid: *profit_paid,
                    principal_paid: *principal_paid,
                    total_paid,
                    outstanding: total_due - total_paid,
                    status: installment_status(total_paid, total_due, *due_date, as_of),
                    days_delinquent: delinquency_days(*due_date, paid_date.unwrap_or(as_of)),
                    paid_date,
                });
            }
        }
    }
    installment_states.sort_by_key(|state| state.sequence);

    let fees_due: Money = fee_states.iter().map(|f| f.amount).sum();
    let fees_paid: Money = fee_states.iter().map(|f| f.paid).sum();
    let principal_due: Money = installment_states.iter().map(|i| i.principal_due).sum();
    let principal_paid: Money = installment_states.iter().map(|i| i.principal_paid).sum();
    let profit_due: Money = installment_states.iter().map(|i| i.profit_due).sum();
    let profit_paid: Money = installment_states.iter().map(|i| i.profit_paid).sum();
    let total_outstanding: Money = fee_states.iter().map(|f| f.outstanding).sum::<Money>()
        + installment_states.iter().map(|i| i.outstanding).sum::<Money>();

    let refinanced = facts
        .payments
        .iter()
        .any(|payment| payment.source_contract.is_some());
    let status = contract_status(contract, refinanced, total_outstanding);
    let maturity_date = installment_states.iter().map(|i| i.due_date).max();
    let held = deposit_held(&contract.id, &facts.deposits);

    ContractState {
        contract: contract.clone(),
        as_of,
        status,
        fees: fee_states,
        installments: installment_states,
        fees_due,
        fees_paid,
        principal_due,
        principal_paid,
        profit_due,
        profit_paid,
        total_outstanding,
        credit_balance: outcome.credit_balance,
        deposit_held: held,
        maturity_date,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
