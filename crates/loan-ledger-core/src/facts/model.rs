//! Immutable facts recorded against a credit contract.
//!
//! These are the stored entities: terms, schedule, fees, and the four
//! money-movement families. Nothing here is derived: balances and
//! statuses are recomputed on demand by the servicing module. Subtype
//! discrimination uses enums and pattern matching throughout.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::dates::days_between;
use crate::types::{ContractId, Money};

// ---------------------------------------------------------------------------
// Contract and schedule
// ---------------------------------------------------------------------------

/// A credit contract. Immutable once created except for the two lifecycle
/// timestamps, each recorded as its own explicit event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contract {
    pub id: ContractId,
    pub principal: Money,
    pub start_date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disbursed_at: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub written_off_at: Option<NaiveDateTime>,
    /// Credit facility this contract draws on, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub facility: Option<String>,
    /// Contract this one refinances, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refinances: Option<ContractId>,
}

impl Contract {
    /// Date funds went out, or `fallback` while the contract is undisbursed.
    pub fn disbursed_date_or(&self, fallback: NaiveDate) -> NaiveDate {
        self.disbursed_at.map(|ts| ts.date()).unwrap_or(fallback)
    }
}

/// One row of the amortization schedule. `remaining_principal` is a
/// schedule fact captured at boarding, never recomputed. `profit_due` may
/// be rewritten only by an explicit rate-adjustment event; every other
/// attribute is permanent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
    pub contract_id: ContractId,
    /// Unique and contiguous within a contract, starting at 1.
    pub sequence: u32,
    pub due_date: NaiveDate,
    pub principal_due: Money,
    pub profit_due: Money,
    pub remaining_principal: Money,
}

impl Installment {
    pub fn total_due(&self) -> Money {
        self.profit_due + self.principal_due
    }
}

/// A contractual fee. Due either on a stored date or a fixed number of
/// days after disbursement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fee {
    pub id: String,
    pub contract_id: ContractId,
    /// Open-ended fee label (e.g. "processing", "admin").
    pub kind: String,
    pub amount: Money,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days_after_disbursement: Option<i64>,
}

impl Fee {
    /// Resolve the effective due date: the stored date wins; otherwise the
    /// disbursement date (or `as_of` while undisbursed) plus the offset.
    /// A fee with neither attribute is due immediately.
    pub fn effective_due_date(&self, disbursed: Option<NaiveDate>, as_of: NaiveDate) -> NaiveDate {
        if let Some(date) = self.due_date {
            return date;
        }
        let base = disbursed.unwrap_or(as_of);
        match self.days_after_disbursement {
            Some(days) => base + chrono::Duration::days(days),
            None => base,
        }
    }
}

// ---------------------------------------------------------------------------
// Money movement
// ---------------------------------------------------------------------------

/// Money received. `business_date` is the date the money moved, distinct
/// from when the fact was recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub contract_id: ContractId,
    pub amount: Money,
    pub business_date: NaiveDate,
    /// Set when this payment was funded by another contract (refinancing
    /// settlement). Marks the receiving contract as refinanced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_contract: Option<ContractId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DisbursementKind {
    /// The loan principal going out. Outside the waterfall.
    Funding,
    /// Returning funds that entered the waterfall; subtracts from it.
    Refund,
    /// Returning money that never entered the waterfall.
    ExcessReturn,
}

/// Money sent out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Disbursement {
    pub id: String,
    pub contract_id: ContractId,
    pub amount: Money,
    pub business_date: NaiveDate,
    pub kind: DisbursementKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DepositKind {
    Received,
    Refund,
    /// Collateral applied against the contract's obligations; the only
    /// deposit movement that feeds the waterfall.
    Offset,
    /// Collateral moved between contracts; carries a target contract.
    Transfer,
}

/// A collateral movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Deposit {
    pub id: String,
    pub contract_id: ContractId,
    pub amount: Money,
    pub business_date: NaiveDate,
    pub kind: DepositKind,
    /// Receiving contract for `Transfer` movements.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_contract: Option<ContractId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalAllocationKind {
    /// Settles a fee out of the gross principal.
    FeeSettlement,
    /// Prepays schedule obligations out of the gross principal.
    InstallmentPrepayment,
    /// Funds the collateral deposit; tracked as deposit-held, not as
    /// waterfall money.
    DepositFunding,
}

impl PrincipalAllocationKind {
    pub fn feeds_waterfall(&self) -> bool {
        !matches!(self, PrincipalAllocationKind::DepositFunding)
    }
}

/// Money diverted from the gross principal at origination to settle an
/// obligation without external cash movement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrincipalAllocation {
    pub id: String,
    pub contract_id: ContractId,
    pub amount: Money,
    pub business_date: NaiveDate,
    pub kind: PrincipalAllocationKind,
}

// ---------------------------------------------------------------------------
// Waterfall fund arithmetic
// ---------------------------------------------------------------------------

/// Total funds available to the waterfall from the four sources:
/// payments in, refund disbursements out, deposit offsets in, and
/// waterfall-eligible principal allocations in. Deposit lists may carry
/// inbound transfers recorded against other contracts, so only offsets
/// owned by `contract_id` count.
pub fn waterfall_funds(
    contract_id: &str,
    payments: &[Payment],
    disbursements: &[Disbursement],
    deposits: &[Deposit],
    allocations: &[PrincipalAllocation],
) -> Money {
    let paid: Money = payments.iter().map(|p| p.amount).sum();
    let refunded: Money = disbursements
        .iter()
        .filter(|d| d.kind == DisbursementKind::Refund)
        .map(|d| d.amount)
        .sum();
    let offsets: Money = deposits
        .iter()
        .filter(|d| d.kind == DepositKind::Offset && d.contract_id == contract_id)
        .map(|d| d.amount)
        .sum();
    let principal: Money = allocations
        .iter()
        .filter(|a| a.kind.feeds_waterfall())
        .map(|a| a.amount)
        .sum();
    paid - refunded + offsets + principal
}

/// Net collateral held for `contract_id`:
/// received − (refunded + offset) + transfers-in by target match.
pub fn deposit_held(contract_id: &str, deposits: &[Deposit]) -> Money {
    let mut held = Decimal::ZERO;
    for deposit in deposits {
        match deposit.kind {
            DepositKind::Received if deposit.contract_id == contract_id => {
                held += deposit.amount;
            }
            DepositKind::Refund | DepositKind::Offset if deposit.contract_id == contract_id => {
                held -= deposit.amount;
            }
            DepositKind::Transfer if deposit.target_contract.as_deref() == Some(contract_id) => {
                held += deposit.amount;
            }
            _ => {}
        }
    }
    held
}

/// Days an installment has been delinquent as of `reference` (the paid
/// date when settled, else the as-of date). Never negative.
pub fn delinquency_days(due_date: NaiveDate, reference: NaiveDate) -> i64 {
    days_between(due_date, reference).max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn payment(amount: Money, date: NaiveDate) -> Payment {
        Payment {
            id: "p1".into(),
            contract_id: "c1".into(),
            amount,
            business_date: date,
            source_contract: None,
        }
    }

    #[test]
    fn test_fee_stored_due_date_wins() {
        let fee = Fee {
            id: "f1".into(),
            contract_id: "c1".into(),
            kind: "processing".into(),
            amount: dec!(1000),
            due_date: Some(d(2024, 1, 1)),
            days_after_disbursement: Some(30),
        };
        assert_eq!(
            fee.effective_due_date(Some(d(2024, 6, 1)), d(2024, 7, 1)),
            d(2024, 1, 1)
        );
    }

    #[test]
    fn test_fee_due_date_from_disbursement_offset() {
        let fee = Fee {
            id: "f1".into(),
            contract_id: "c1".into(),
            kind: "admin".into(),
            amount: dec!(500),
            due_date: None,
            days_after_disbursement: Some(30),
        };
        assert_eq!(
            fee.effective_due_date(Some(d(2024, 1, 1)), d(2024, 7, 1)),
            d(2024, 1, 31)
        );
        // Undisbursed: offset applies from the as-of date.
        assert_eq!(fee.effective_due_date(None, d(2024, 3, 1)), d(2024, 3, 31));
    }

    #[test]
    fn test_waterfall_funds_sources() {
        let payments = vec![payment(dec!(10_000), d(2024, 1, 5))];
        let disbursements = vec![
            Disbursement {
                id: "d1".into(),
                contract_id: "c1".into(),
                amount: dec!(100_000),
                business_date: d(2024, 1, 1),
                kind: DisbursementKind::Funding,
            },
            Disbursement {
                id: "d2".into(),
                contract_id: "c1".into(),
                amount: dec!(2_000),
                business_date: d(2024, 1, 10),
                kind: DisbursementKind::Refund,
            },
            Disbursement {
                id: "d3".into(),
                contract_id: "c1".into(),
                amount: dec!(500),
                business_date: d(2024, 1, 12),
                kind: DisbursementKind::ExcessReturn,
            },
        ];
        let deposits = vec![
            Deposit {
                id: "dep1".into(),
                contract_id: "c1".into(),
                amount: dec!(3_000),
                business_date: d(2024, 1, 8),
                kind: DepositKind::Offset,
                target_contract: None,
            },
            // Another contract's offset; never waterfall money for c1.
            Deposit {
                id: "dep2".into(),
                contract_id: "c2".into(),
                amount: dec!(9_999),
                business_date: d(2024, 1, 9),
                kind: DepositKind::Offset,
                target_contract: None,
            },
        ];
        let allocations = vec![
            PrincipalAllocation {
                id: "a1".into(),
                contract_id: "c1".into(),
                amount: dec!(1_500),
                business_date: d(2024, 1, 1),
                kind: PrincipalAllocationKind::FeeSettlement,
            },
            PrincipalAllocation {
                id: "a2".into(),
                contract_id: "c1".into(),
                amount: dec!(4_000),
                business_date: d(2024, 1, 1),
                kind: PrincipalAllocationKind::DepositFunding,
            },
        ];
        // 10_000 - 2_000 + 3_000 + 1_500; funding, excess-return,
        // deposit-funding allocations and foreign offsets stay outside
        // the waterfall.
        assert_eq!(
            waterfall_funds("c1", &payments, &disbursements, &deposits, &allocations),
            dec!(12_500)
        );
    }

    #[test]
    fn test_deposit_held_netting() {
        let deposits = vec![
            Deposit {
                id: "dep1".into(),
                contract_id: "c1".into(),
                amount: dec!(5_000),
                business_date: d(2024, 1, 1),
                kind: DepositKind::Received,
                target_contract: None,
            },
            Deposit {
                id: "dep2".into(),
                contract_id: "c1".into(),
                amount: dec!(1_000),
                business_date: d(2024, 2, 1),
                kind: DepositKind::Refund,
                target_contract: None,
            },
            Deposit {
                id: "dep3".into(),
                contract_id: "c1".into(),
                amount: dec!(500),
                business_date: d(2024, 3, 1),
                kind: DepositKind::Offset,
                target_contract: None,
            },
            Deposit {
                id: "dep4".into(),
                contract_id: "c2".into(),
                amount: dec!(2_000),
                business_date: d(2024, 4, 1),
                kind: DepositKind::Transfer,
                target_contract: Some("c1".into()),
            },
        ];
        // 5_000 - 1_000 - 500 + 2_000
        assert_eq!(deposit_held("c1", &deposits), dec!(5_500));
        assert_eq!(deposit_held("c2", &deposits), dec!(0));
    }

    #[test]
    fn test_delinquency_never_negative() {
        assert_eq!(delinquency_days(d(2024, 2, 1), d(2024, 1, 1)), 0);
        assert_eq!(delinquency_days(d(2024, 1, 1), d(2024, 1, 31)), 30);
    }
}
