//! Early-settlement pricing: the cost to close a contract on an arbitrary
//! date, past or future.
//!
//! Installments split into past / current / future around the settlement
//! date. Profit accrues linearly across each period's calendar days, so
//! the current period contributes a pro-rata slice. The penalty walks
//! forward day by day through the remaining schedule at each period's
//! daily rate, extrapolating at the last known rate once the schedule runs
//! out. Extreme dates never fail; they degrade to extrapolation.
//!
//! Intermediate arithmetic stays at `Decimal`'s full 28-digit precision;
//! reported figures are rounded half-up to two decimal places.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::dates::days_between;
use crate::servicing::composer::{ContractState, InstallmentState};
use crate::types::{round_money, ContractId, Money};
use crate::{LedgerError, LedgerResult};

/// The computed early-payoff breakdown. `settlement_amount` and
/// `refund_due` are mutually exclusive: at most one is non-zero.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettlementResult {
    pub contract_id: ContractId,
    pub settlement_date: NaiveDate,
    pub penalty_days: u32,
    /// Profit earned by the settlement date under linear accrual.
    pub accrued_profit: Money,
    /// Accrued profit net of everything already paid, before any override.
    pub accrued_unpaid_profit: Money,
    /// Caller-supplied replacement for the accrued-unpaid figure, echoed
    /// back for transparency when applied.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_override: Option<Money>,
    /// The figure actually charged: the override when present, otherwise
    /// the computed accrued-unpaid profit.
    pub effective_unpaid_profit: Money,
    /// Informational: scheduled profit never earned.
    pub unearned_profit: Money,
    pub penalty_amount: Money,
    pub outstanding_principal: Money,
    pub outstanding_fees: Money,
    pub credit_balance: Money,
    pub settlement_amount: Money,
    pub refund_due: Money,
}

/// Price an early settlement of `state` on `settlement_date` with a
/// `penalty_days`-day penalty projection.
pub fn calculate_settlement(
    state: &ContractState,
    settlement_date: NaiveDate,
    penalty_days: u32,
    manual_override: Option<Money>,
) -> LedgerResult<SettlementResult> {
    let installments = &state.installments;
    if installments.is_empty() {
        return Err(LedgerError::NotFound {
            entity: "installments",
            id: state.contract.id.clone(),
        });
    }

    // Installments arrive sequence-ordered from the composer. The current
    // installment is the first one still ahead of the settlement date.
    let current_idx = installments
        .iter()
        .position(|i| i.due_date > settlement_date);

    let past_profit: Money = installments
        .iter()
        .filter(|i| i.due_date <= settlement_date)
        .map(|i| i.profit_due)
        .sum();

    let mut accrued = past_profit;
    if let Some(idx) = current_idx {
        let (period_days, daily_rate) = period_of(installments, idx, state.contract.start_date);
        let accrued_days = days_between(period_start(installments, idx, state.contract.start_date), settlement_date)
            .clamp(0, period_days);
        accrued += daily_rate * Decimal::from(accrued_days);
    }

    let accrued_unpaid = accrued - state.profit_paid;
    let effective_unpaid = manual_override.unwrap_or(accrued_unpaid);
    let total_profit_due: Money = installments.iter().map(|i| i.profit_due).sum();
    let unearned = total_profit_due - accrued;

    let penalty = project_penalty(
        installments,
        current_idx,
        settlement_date,
        penalty_days,
        state.contract.start_date,
    );

    let outstanding_principal = state.principal_due - state.principal_paid;
    let outstanding_fees = state.fees_due - state.fees_paid;

    let accrued_profit = round_money(accrued);
    let accrued_unpaid_profit = round_money(accrued_unpaid);
    let effective_unpaid_profit = round_money(effective_unpaid);
    let penalty_amount = round_money(penalty);

    let raw = outstanding_principal
        + effective_unpaid_profit
        + outstanding_fees
        + penalty_amount
        - state.credit_balance;

    Ok(SettlementResult {
        contract_id: state.contract.id.clone(),
        settlement_date,
        penalty_days,
        accrued_profit,
        accrued_unpaid_profit,
        manual_override,
        effective_unpaid_profit,
        unearned_profit: round_money(unearned),
        penalty_amount,
        outstanding_principal: round_money(outstanding_principal),
        outstanding_fees: round_money(outstanding_fees),
        credit_balance: round_money(state.credit_balance),
        settlement_amount: round_money(raw.max(Decimal::ZERO)),
        refund_due: round_money((-raw).max(Decimal::ZERO)),
    })
}

// ---------------------------------------------------------------------------
// Period math
// ---------------------------------------------------------------------------

fn period_start(
    installments: &[InstallmentState],
    idx: usize,
    contract_start: NaiveDate,
) -> NaiveDate {
    if idx == 0 {
        contract_start
    } else {
        installments[idx - 1].due_date
    }
}

/// Calendar length of installment `idx`'s period and its daily profit
/// rate. A degenerate zero-or-negative-length period counts as one day so
/// the rate stays finite.
fn period_of(
    installments: &[InstallmentState],
    idx: usize,
    contract_start: NaiveDate,
) -> (i64, Money) {
    let start = period_start(installments, idx, contract_start);
    let period_days = days_between(start, installments[idx].due_date).max(1);
    let daily_rate = installments[idx].profit_due / Decimal::from(period_days);
    (period_days, daily_rate)
}

/// Walk `penalty_days` calendar days forward from the settlement date:
/// first the unused remainder of the current period, then each future
/// period at its own daily rate, extrapolating at the last rate when the
/// schedule is exhausted. Beyond the last installment the whole penalty
/// extrapolates from the last period's rate.
fn project_penalty(
    installments: &[InstallmentState],
    current_idx: Option<usize>,
    settlement_date: NaiveDate,
    penalty_days: u32,
    contract_start: NaiveDate,
) -> Money {
    let mut remaining = Decimal::from(penalty_days);
    if remaining.is_zero() {
        return Decimal::ZERO;
    }

    let Some(idx) = current_idx else {
        // Settlement beyond the schedule: the last installment's rate
        // carries the entire projection.
        let (_, daily_rate) = period_of(installments, installments.len() - 1, contract_start);
        return daily_rate * remaining;
    };

    let mut penalty = Decimal::ZERO;

    let (period_days, daily_rate) = period_of(installments, idx, contract_start);
    let accrued_days = days_between(period_start(installments, idx, contract_start), settlement_date)
        .clamp(0, period_days);
    let leftover = Decimal::from(period_days - accrued_days);
    let used = remaining.min(leftover);
    penalty += daily_rate * used;
    remaining -= used;
    let mut last_rate = daily_rate;

    for future_idx in idx + 1..installments.len() {
        if remaining.is_zero() {
            break;
        }
        let (period_days, daily_rate) = period_of(installments, future_idx, contract_start);
        let used = remaining.min(Decimal::from(period_days));
        penalty += daily_rate * used;
        remaining -= used;
        last_rate = daily_rate;
    }

    if remaining > Decimal::ZERO {
        penalty += last_rate * remaining;
    }

    penalty
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
