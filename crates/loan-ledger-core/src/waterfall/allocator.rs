//! Payment waterfall: which obligation a unit of money pays first.
//!
//! Fees and installments merge into one sequence sorted by due date.
//! The sort is stable and fees are placed ahead of installments before
//! sorting, so a fee due the same day as an installment is paid first.
//! That tie-break is a first-class rule, not an accident. Within an
//! installment, profit-due is exhausted before principal-due receives
//! anything. Whatever survives the walk is the credit balance.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::facts::model::Installment;
use crate::types::Money;

/// A fee with its effective due date already resolved by the composer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DueFee {
    pub id: String,
    pub kind: String,
    pub amount: Money,
    pub due_date: NaiveDate,
}

/// Money applied to one obligation. Installment allocations carry the
/// profit and principal components separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum Allocation {
    Fee {
        fee_id: String,
        due_date: NaiveDate,
        amount_due: Money,
        amount_paid: Money,
    },
    Installment {
        sequence: u32,
        due_date: NaiveDate,
        profit_due: Money,
        principal_due: Money,
        profit_paid: Money,
        principal_paid: Money,
    },
}

impl Allocation {
    /// Total money this allocation absorbed.
    pub fn amount_applied(&self) -> Money {
        match self {
            Allocation::Fee { amount_paid, .. } => *amount_paid,
            Allocation::Installment {
                profit_paid,
                principal_paid,
                ..
            } => *profit_paid + *principal_paid,
        }
    }

    /// Total money this obligation demands.
    pub fn amount_due(&self) -> Money {
        match self {
            Allocation::Fee { amount_due, .. } => *amount_due,
            Allocation::Installment {
                profit_due,
                principal_due,
                ..
            } => *profit_due + *principal_due,
        }
    }
}

/// Result of one waterfall run. Allocations are in waterfall order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaterfallOutcome {
    pub allocations: Vec<Allocation>,
    pub credit_balance: Money,
}

enum Item<'a> {
    Fee(&'a DueFee),
    Installment(&'a Installment),
}

impl Item<'_> {
    fn due_date(&self) -> NaiveDate {
        match self {
            Item::Fee(fee) => fee.due_date,
            Item::Installment(installment) => installment.due_date,
        }
    }
}

/// Distribute `total_funds` across fees and installments, oldest due date
/// first. Pure and total; O(n log n) in the combined item count.
///
/// Negative `total_funds` means the fact set is corrupt (the recording
/// boundary admits only positive amounts), so it aborts rather than
/// returning a soft error.
pub fn allocate(fees: &[DueFee], installments: &[Installment], total_funds: Money) -> WaterfallOutcome {
    assert!(
        total_funds >= Decimal::ZERO,
        "waterfall funds cannot be negative (got {total_funds}); corrupt fact set"
    );

    // Fees first, then installments: the stable sort preserves that order
    // on equal due dates, which is the fee-wins tie-break.
    let mut items: Vec<Item> = Vec::with_capacity(fees.len() + installments.len());
    items.extend(fees.iter().map(Item::Fee));
    items.extend(installments.iter().map(Item::Installment));
    items.sort_by_key(|item| item.due_date());

    let mut remaining = total_funds;
    let mut allocations = Vec::with_capacity(items.len());

    for item in items {
        match item {
            Item::Fee(fee) => {
                let paid = remaining.min(fee.amount);
                remaining -= paid;
                allocations.push(Allocation::Fee {
                    fee_id: fee.id.clone(),
                    due_date: fee.due_date,
                    amount_due: fee.amount,
                    amount_paid: paid,
                });
            }
            Item::Installment(installment) => {
                let profit_paid = remaining.min(installment.profit_due);
                remaining -= profit_paid;
                let principal_paid = remaining.min(installment.principal_due);
                remaining -= principal_paid;
                allocations.push(Allocation::Installment {
                    sequence: installment.sequence,
                    due_date: installment.due_date,
                    profit_due: installment.profit_due,
                    principal_due: installment.principal_due,
                    profit_paid,
                    principal_paid,
                });
            }
        }
    }

    WaterfallOutcome {
        allocations,
        credit_balance: remaining,
    }
}
