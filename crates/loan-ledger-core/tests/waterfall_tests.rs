use chrono::NaiveDate;
use loan_ledger_core::facts::model::Installment;
use loan_ledger_core::waterfall::{allocate, Allocation, DueFee};
use loan_ledger_core::Money;
use rust_decimal_macros::dec;

// ===========================================================================
// Waterfall allocator scenarios
// ===========================================================================

fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

fn fee(id: &str, amount: Money, due: NaiveDate) -> DueFee {
    DueFee {
        id: id.into(),
        kind: "processing".into(),
        amount,
        due_date: due,
    }
}

fn installment(sequence: u32, due: NaiveDate, principal: Money, profit: Money) -> Installment {
    Installment {
        contract_id: "c1".into(),
        sequence,
        due_date: due,
        principal_due: principal,
        profit_due: profit,
        remaining_principal: dec!(0),
    }
}

fn installment_components(allocation: &Allocation) -> (Money, Money) {
    match allocation {
        Allocation::Installment {
            profit_paid,
            principal_paid,
            ..
        } => (*profit_paid, *principal_paid),
        other => panic!("Expected installment allocation, got {other:?}"),
    }
}

fn fee_paid(allocation: &Allocation) -> Money {
    match allocation {
        Allocation::Fee { amount_paid, .. } => *amount_paid,
        other => panic!("Expected fee allocation, got {other:?}"),
    }
}

#[test]
fn test_scenario_a_fee_before_installment() {
    // Fee $1,000 due 2024-01-01; installment #1 due 2024-02-01
    // (principal $100,000, profit $10,000); payment $50,000.
    let fees = vec![fee("f1", dec!(1_000), d(2024, 1, 1))];
    let installments = vec![installment(1, d(2024, 2, 1), dec!(100_000), dec!(10_000))];
    let outcome = allocate(&fees, &installments, dec!(50_000));

    assert_eq!(fee_paid(&outcome.allocations[0]), dec!(1_000));
    let (profit, principal) = installment_components(&outcome.allocations[1]);
    assert_eq!(profit, dec!(10_000));
    assert_eq!(principal, dec!(39_000));
    assert_eq!(outcome.credit_balance, dec!(0));
}

#[test]
fn test_scenario_b_installment_before_later_fee() {
    // Fee due after the installment: the installment drains the funds.
    let fees = vec![fee("f1", dec!(1_000), d(2024, 3, 1))];
    let installments = vec![installment(1, d(2024, 2, 1), dec!(100_000), dec!(10_000))];
    let outcome = allocate(&fees, &installments, dec!(50_000));

    let (profit, principal) = installment_components(&outcome.allocations[0]);
    assert_eq!(profit, dec!(10_000));
    assert_eq!(principal, dec!(40_000));
    assert_eq!(fee_paid(&outcome.allocations[1]), dec!(0));
    assert_eq!(outcome.credit_balance, dec!(0));
}

#[test]
fn test_scenario_c_overpayment_credit_balance() {
    let fees = vec![fee("f1", dec!(1_000), d(2024, 1, 1))];
    let installments = vec![installment(1, d(2024, 2, 1), dec!(100_000), dec!(10_000))];
    let outcome = allocate(&fees, &installments, dec!(1_111_000));

    assert_eq!(fee_paid(&outcome.allocations[0]), dec!(1_000));
    let (profit, principal) = installment_components(&outcome.allocations[1]);
    assert_eq!(profit, dec!(10_000));
    assert_eq!(principal, dec!(100_000));
    assert_eq!(outcome.credit_balance, dec!(1_000_000));
}

#[test]
fn test_tie_break_fee_paid_first_on_shared_due_date() {
    let fees = vec![fee("f1", dec!(1_000), d(2024, 2, 1))];
    let installments = vec![installment(1, d(2024, 2, 1), dec!(5_000), dec!(500))];
    let outcome = allocate(&fees, &installments, dec!(1_200));

    assert_eq!(fee_paid(&outcome.allocations[0]), dec!(1_000));
    let (profit, principal) = installment_components(&outcome.allocations[1]);
    assert_eq!(profit, dec!(200));
    assert_eq!(principal, dec!(0));
}

#[test]
fn test_profit_before_principal_within_installment() {
    let installments = vec![installment(1, d(2024, 2, 1), dec!(10_000), dec!(2_000))];

    // Funds short of the profit due: principal gets nothing.
    let outcome = allocate(&[], &installments, dec!(1_500));
    let (profit, principal) = installment_components(&outcome.allocations[0]);
    assert_eq!(profit, dec!(1_500));
    assert_eq!(principal, dec!(0));

    // One unit past the profit due flips into principal.
    let outcome = allocate(&[], &installments, dec!(2_001));
    let (profit, principal) = installment_components(&outcome.allocations[0]);
    assert_eq!(profit, dec!(2_000));
    assert_eq!(principal, dec!(1));
}

#[test]
fn test_conservation_across_fund_levels() {
    let fees = vec![
        fee("f1", dec!(333.33), d(2024, 1, 5)),
        fee("f2", dec!(1_250), d(2024, 4, 5)),
    ];
    let installments = vec![
        installment(1, d(2024, 2, 1), dec!(8_000), dec!(730.50)),
        installment(2, d(2024, 3, 1), dec!(8_000), dec!(615.25)),
        installment(3, d(2024, 4, 1), dec!(8_000), dec!(498.75)),
    ];

    for funds in [
        dec!(0),
        dec!(0.01),
        dec!(333.33),
        dec!(5_000),
        dec!(27_427.83),
        dec!(100_000),
    ] {
        let outcome = allocate(&fees, &installments, funds);
        let applied: Money = outcome
            .allocations
            .iter()
            .map(|a| a.amount_applied())
            .sum();
        assert_eq!(
            applied + outcome.credit_balance,
            funds,
            "conservation broke at funds = {funds}"
        );
    }
}

#[test]
fn test_identical_inputs_identical_outputs() {
    let fees = vec![fee("f1", dec!(1_000), d(2024, 1, 1))];
    let installments = vec![installment(1, d(2024, 2, 1), dec!(100_000), dec!(10_000))];

    let first = allocate(&fees, &installments, dec!(42_000));
    let second = allocate(&fees, &installments, dec!(42_000));
    assert_eq!(first, second);
}
