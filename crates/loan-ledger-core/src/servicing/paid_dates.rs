//! Chronological replay: when did each installment become paid?
//!
//! The waterfall says how much of each obligation is covered, but not when.
//! Replay precomputes, per installment, a cumulative threshold (the sum of
//! every item amount in waterfall order up to and including it), then walks
//! the signed money-movement deltas in date order. The first positive delta
//! that lifts the running total to an installment's threshold stamps that
//! installment's paid-date; a later negative delta (a refund) that drops the
//! total back below the threshold clears it again. Only positive deltas may
//! set a paid-date.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::facts::model::{DepositKind, DisbursementKind};
use crate::facts::store::ContractFacts;
use crate::types::Money;
use crate::waterfall::Allocation;

struct Delta {
    date: NaiveDate,
    amount: Money,
}

/// Derive per-installment paid-dates from the waterfall-ordered allocations
/// and the raw money movements. Keyed by installment sequence.
pub fn paid_dates(
    allocations: &[Allocation],
    facts: &ContractFacts,
) -> BTreeMap<u32, NaiveDate> {
    let thresholds = installment_thresholds(allocations);
    let deltas = chronological_deltas(facts);

    let mut running = Decimal::ZERO;
    let mut crossed = 0;
    let mut paid: BTreeMap<u32, NaiveDate> = BTreeMap::new();

    // Thresholds are nondecreasing, so a cursor over the crossed prefix
    // keeps the walk linear in the number of facts.
    for delta in deltas {
        running += delta.amount;
        if delta.amount > Decimal::ZERO {
            while crossed < thresholds.len() && thresholds[crossed].1 <= running {
                paid.insert(thresholds[crossed].0, delta.date);
                crossed += 1;
            }
        } else {
            while crossed > 0 && thresholds[crossed - 1].1 > running {
                crossed -= 1;
                paid.remove(&thresholds[crossed].0);
            }
        }
    }

    paid
}

/// Cumulative waterfall position of each installment: everything ahead of
/// it (fees and earlier installments) plus its own profit and principal.
fn installment_thresholds(allocations: &[Allocation]) -> Vec<(u32, Money)> {
    let mut cumulative = Decimal::ZERO;
    let mut thresholds = Vec::new();
    for allocation in allocations {
        cumulative += allocation.amount_due();
        if let Allocation::Installment { sequence, .. } = allocation {
            thresholds.push((*sequence, cumulative));
        }
    }
    thresholds
}

/// Signed deltas in business-date order. The stable sort keeps same-day
/// movements in collection order (payments, refunds, offsets, principal
/// allocations), so replay is deterministic for a given fact set.
fn chronological_deltas(facts: &ContractFacts) -> Vec<Delta> {
    let mut deltas: Vec<Delta> = Vec::new();

    for payment in &facts.payments {
        deltas.push(Delta {
            date: payment.business_date,
            amount: payment.amount,
        });
    }
    for disbursement in &facts.disbursements {
        if disbursement.kind == DisbursementKind::Refund {
            deltas.push(Delta {
                date: disbursement.business_date,
                amount: -disbursement.amount,
            });
        }
    }
    for deposit in &facts.deposits {
        if deposit.kind == DepositKind::Offset && deposit.contract_id == facts.contract.id {
            deltas.push(Delta {
                date: deposit.business_date,
                amount: deposit.amount,
            });
        }
    }
    for allocation in &facts.principal_allocations {
        if allocation.kind.feeds_waterfall() {
            deltas.push(Delta {
                date: allocation.business_date,
                amount: allocation.amount,
            });
        }
    }

    deltas.sort_by_key(|delta| delta.date);
    deltas
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::model::{Contract, Disbursement, Payment};
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn installment_allocation(sequence: u32, profit: Money, principal: Money) -> Allocation {
        Allocation::Installment {
            sequence,
            due_date: d(2024, sequence, 1),
            profit_due: profit,
            principal_due: principal,
            profit_paid: dec!(0),
            principal_paid: dec!(0),
        }
    }

    fn facts_with(payments: Vec<Payment>, disbursements: Vec<Disbursement>) -> ContractFacts {
        ContractFacts {
            contract: Contract {
                id: "c1".into(),
                principal: dec!(100_000),
                start_date: d(2024, 1, 1),
                disbursed_at: None,
                written_off_at: None,
                facility: None,
                refinances: None,
            },
            fees: vec![],
            installments: vec![],
            payments,
            disbursements,
            deposits: vec![],
            principal_allocations: vec![],
        }
    }

    fn payment(id: &str, amount: Money, date: NaiveDate) -> Payment {
        Payment {
            id: id.into(),
            contract_id: "c1".into(),
            amount,
            business_date: date,
            source_contract: None,
        }
    }

    fn refund(id: &str, amount: Money, date: NaiveDate) -> Disbursement {
        Disbursement {
            id: id.into(),
            contract_id: "c1".into(),
            amount,
            business_date: date,
            kind: DisbursementKind::Refund,
        }
    }

    #[test]
    fn test_paid_date_is_crossing_event_date() {
        let allocations = vec![
            installment_allocation(1, dec!(100), dec!(900)),
            installment_allocation(2, dec!(100), dec!(900)),
        ];
        let facts = facts_with(
            vec![
                payment("p1", dec!(600), d(2024, 1, 10)),
                payment("p2", dec!(400), d(2024, 2, 10)),
                payment("p3", dec!(1000), d(2024, 3, 10)),
            ],
            vec![],
        );
        let paid = paid_dates(&allocations, &facts);
        // Installment 1 (threshold 1000) crossed by the second payment.
        assert_eq!(paid.get(&1), Some(&d(2024, 2, 10)));
        assert_eq!(paid.get(&2), Some(&d(2024, 3, 10)));
    }

    #[test]
    fn test_refund_clears_paid_date() {
        let allocations = vec![installment_allocation(1, dec!(100), dec!(900))];
        let facts = facts_with(
            vec![payment("p1", dec!(1000), d(2024, 1, 10))],
            vec![refund("r1", dec!(500), d(2024, 2, 15))],
        );
        let paid = paid_dates(&allocations, &facts);
        assert!(paid.is_empty());
    }

    #[test]
    fn test_repayment_after_refund_sets_new_date() {
        let allocations = vec![installment_allocation(1, dec!(100), dec!(900))];
        let facts = facts_with(
            vec![
                payment("p1", dec!(1000), d(2024, 1, 10)),
                payment("p2", dec!(500), d(2024, 3, 20)),
            ],
            vec![refund("r1", dec!(500), d(2024, 2, 15))],
        );
        let paid = paid_dates(&allocations, &facts);
        // The paid-date moves to the delta that re-crossed the threshold.
        assert_eq!(paid.get(&1), Some(&d(2024, 3, 20)));
    }

    #[test]
    fn test_fee_ahead_of_installment_raises_threshold() {
        let allocations = vec![
            Allocation::Fee {
                fee_id: "f1".into(),
                due_date: d(2024, 1, 1),
                amount_due: dec!(300),
                amount_paid: dec!(0),
            },
            installment_allocation(1, dec!(100), dec!(900)),
        ];
        let facts = facts_with(vec![payment("p1", dec!(1000), d(2024, 1, 10))], vec![]);
        // 1000 < 300 + 1000: installment not yet paid.
        assert!(paid_dates(&allocations, &facts).is_empty());
    }

    #[test]
    fn test_refund_cycle_across_several_thresholds() {
        let allocations = vec![
            installment_allocation(1, dec!(100), dec!(900)),
            installment_allocation(2, dec!(100), dec!(900)),
        ];
        let facts = facts_with(
            vec![
                payment("p1", dec!(2000), d(2024, 1, 10)),
                payment("p2", dec!(600), d(2024, 3, 1)),
                payment("p3", dec!(1000), d(2024, 4, 1)),
            ],
            vec![refund("r1", dec!(1500), d(2024, 2, 1))],
        );
        let paid = paid_dates(&allocations, &facts);
        // p1 covers both; the refund drops the running total to 500 and
        // clears both; p2 re-crosses threshold 1, p3 re-crosses threshold 2.
        assert_eq!(paid.get(&1), Some(&d(2024, 3, 1)));
        assert_eq!(paid.get(&2), Some(&d(2024, 4, 1)));
    }

    #[test]
    fn test_partial_refund_keeps_still_covered_installments() {
        let allocations = vec![
            installment_allocation(1, dec!(100), dec!(900)),
            installment_allocation(2, dec!(100), dec!(900)),
        ];
        let facts = facts_with(
            vec![payment("p1", dec!(2000), d(2024, 1, 10))],
            vec![refund("r1", dec!(800), d(2024, 2, 15))],
        );
        let paid = paid_dates(&allocations, &facts);
        // Running total 1200: installment 1 stays paid, installment 2 cleared.
        assert_eq!(paid.get(&1), Some(&d(2024, 1, 10)));
        assert_eq!(paid.get(&2), None);
    }
}
