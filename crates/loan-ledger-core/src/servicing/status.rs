//! Status derivation. Statuses are never stored; they are pure functions
//! of paid amounts, due amounts, and the as-of date.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::facts::model::Contract;
use crate::types::Money;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeStatus {
    Paid,
    Unpaid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallmentStatus {
    Paid,
    Partial,
    Overdue,
    Scheduled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContractStatus {
    WrittenOff,
    Refinanced,
    Closed,
    Active,
    Pending,
}

pub fn fee_status(paid: Money, due: Money) -> FeeStatus {
    if paid >= due {
        FeeStatus::Paid
    } else {
        FeeStatus::Unpaid
    }
}

pub fn installment_status(
    total_paid: Money,
    total_due: Money,
    due_date: NaiveDate,
    as_of: NaiveDate,
) -> InstallmentStatus {
    if total_paid >= total_due {
        InstallmentStatus::Paid
    } else if total_paid > Decimal::ZERO {
        InstallmentStatus::Partial
    } else if as_of > due_date {
        InstallmentStatus::Overdue
    } else {
        InstallmentStatus::Scheduled
    }
}

/// Strict priority: written-off > refinanced > closed > active > pending.
/// The order is a product rule; do not reorder when adding states.
pub fn contract_status(
    contract: &Contract,
    refinanced: bool,
    total_outstanding: Money,
) -> ContractStatus {
    if contract.written_off_at.is_some() {
        ContractStatus::WrittenOff
    } else if refinanced {
        ContractStatus::Refinanced
    } else if contract.disbursed_at.is_some() && total_outstanding.is_zero() {
        ContractStatus::Closed
    } else if contract.disbursed_at.is_some() {
        ContractStatus::Active
    } else {
        ContractStatus::Pending
    }
}
