//! Append-only in-memory fact store.
//!
//! Reference implementation of the recording layer used by tests, the CLI
//! and the bindings. Facts are never edited in place: a correction is a
//! retraction (tombstone) plus an audit entry naming author and reason, and
//! retracted rows stay visible through the history accessors. The one
//! sanctioned mutation is `adjust_installment_profit`, which represents a
//! step-up re-pricing and is itself recorded as an attributable event.
//!
//! Recording-boundary validation (positive amounts, unique identifiers,
//! contiguous sequences) lives here, not in the derivation core.

use std::collections::BTreeMap;

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::facts::model::{
    Contract, Deposit, DepositKind, Disbursement, Fee, Installment, Payment, PrincipalAllocation,
};
use crate::facts::store::{ContractFacts, FactStore};
use crate::types::{ContractId, Money};
use crate::{LedgerError, LedgerResult};

// ---------------------------------------------------------------------------
// Record envelope and options
// ---------------------------------------------------------------------------

/// Marks a recorded fact as withdrawn for correction while preserving it
/// in history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Retraction {
    pub date: NaiveDate,
    pub author: String,
    pub reason: String,
}

/// A fact plus its recording metadata and optional tombstone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recorded<T> {
    pub fact: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retraction: Option<Retraction>,
}

impl<T> Recorded<T> {
    pub fn is_current(&self) -> bool {
        self.retraction.is_none()
    }
}

/// Optional metadata on a recording call.
#[derive(Debug, Clone, Default)]
pub struct RecordOptions {
    pub note: Option<String>,
    pub channel: Option<String>,
}

/// Attribution required to retract a fact.
#[derive(Debug, Clone)]
pub struct RetractionOptions {
    pub date: NaiveDate,
    pub author: String,
    pub reason: String,
}

/// Attribution required to re-price an installment.
#[derive(Debug, Clone)]
pub struct AdjustmentOptions {
    pub date: NaiveDate,
    pub author: String,
    pub reason: String,
}

/// One line of the correction audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub contract_id: ContractId,
    pub action: String,
    /// Identifier of the fact being corrected.
    pub reference: String,
    pub date: NaiveDate,
    pub author: String,
    pub reason: String,
}

// ---------------------------------------------------------------------------
// Store
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
pub struct InMemoryFactStore {
    contracts: BTreeMap<ContractId, Contract>,
    fees: Vec<Recorded<Fee>>,
    installments: Vec<Recorded<Installment>>,
    payments: Vec<Recorded<Payment>>,
    disbursements: Vec<Recorded<Disbursement>>,
    deposits: Vec<Recorded<Deposit>>,
    principal_allocations: Vec<Recorded<PrincipalAllocation>>,
    audit: Vec<AuditEntry>,
}

impl InMemoryFactStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a single-contract fact bundle, running every row
    /// through the normal recording validation.
    pub fn from_facts(facts: ContractFacts) -> LedgerResult<Self> {
        let mut store = Self::new();
        store.insert_contract(facts.contract)?;
        for installment in facts.installments {
            store.record_installment(installment, RecordOptions::default())?;
        }
        for fee in facts.fees {
            store.record_fee(fee, RecordOptions::default())?;
        }
        for payment in facts.payments {
            store.record_payment(payment, RecordOptions::default())?;
        }
        for disbursement in facts.disbursements {
            store.record_disbursement(disbursement, RecordOptions::default())?;
        }
        for deposit in facts.deposits {
            store.record_deposit(deposit, RecordOptions::default())?;
        }
        for allocation in facts.principal_allocations {
            store.record_principal_allocation(allocation, RecordOptions::default())?;
        }
        Ok(store)
    }

    // -- Contract lifecycle --------------------------------------------------

    pub fn insert_contract(&mut self, contract: Contract) -> LedgerResult<()> {
        require_positive(contract.principal, "principal")?;
        if self.contracts.contains_key(&contract.id) {
            return Err(LedgerError::InvalidInput {
                field: "contract.id".into(),
                reason: format!("Contract '{}' already exists.", contract.id),
            });
        }
        self.contracts.insert(contract.id.clone(), contract);
        Ok(())
    }

    pub fn mark_disbursed(&mut self, contract_id: &str, at: NaiveDateTime) -> LedgerResult<()> {
        let contract = self.contract_mut(contract_id)?;
        if contract.disbursed_at.is_some() {
            return Err(LedgerError::InvalidInput {
                field: "disbursed_at".into(),
                reason: format!("Contract '{contract_id}' is already disbursed."),
            });
        }
        contract.disbursed_at = Some(at);
        Ok(())
    }

    pub fn mark_written_off(&mut self, contract_id: &str, at: NaiveDateTime) -> LedgerResult<()> {
        let contract = self.contract_mut(contract_id)?;
        if contract.written_off_at.is_some() {
            return Err(LedgerError::InvalidInput {
                field: "written_off_at".into(),
                reason: format!("Contract '{contract_id}' is already written off."),
            });
        }
        contract.written_off_at = Some(at);
        Ok(())
    }

    // -- Recording ------------------------------------------------------------

    pub fn record_installment(
        &mut self,
        installment: Installment,
        options: RecordOptions,
    ) -> LedgerResult<()> {
        self.require_contract(&installment.contract_id)?;
        if installment.sequence == 0 {
            return Err(LedgerError::InvalidInput {
                field: "installment.sequence".into(),
                reason: "Sequence numbers start at 1.".into(),
            });
        }
        let current_max = self
            .installments
            .iter()
            .filter(|r| r.is_current() && r.fact.contract_id == installment.contract_id)
            .map(|r| r.fact.sequence)
            .max()
            .unwrap_or(0);
        if installment.sequence != current_max + 1 {
            return Err(LedgerError::InvalidInput {
                field: "installment.sequence".into(),
                reason: format!(
                    "Sequence must be contiguous: expected {}, got {}.",
                    current_max + 1,
                    installment.sequence
                ),
            });
        }
        if installment.profit_due < Decimal::ZERO
            || installment.principal_due < Decimal::ZERO
            || installment.remaining_principal < Decimal::ZERO
        {
            return Err(LedgerError::InvalidInput {
                field: "installment".into(),
                reason: "Schedule amounts cannot be negative.".into(),
            });
        }
        self.installments.push(wrap(installment, options));
        Ok(())
    }

    pub fn record_fee(&mut self, fee: Fee, options: RecordOptions) -> LedgerResult<()> {
        self.require_contract(&fee.contract_id)?;
        require_positive(fee.amount, "fee.amount")?;
        require_unique_id(self.fees.iter().map(|r| r.fact.id.as_str()), &fee.id, "fee")?;
        self.fees.push(wrap(fee, options));
        Ok(())
    }

    pub fn record_payment(&mut self, payment: Payment, options: RecordOptions) -> LedgerResult<()> {
        self.require_contract(&payment.contract_id)?;
        require_positive(payment.amount, "payment.amount")?;
        require_unique_id(
            self.payments.iter().map(|r| r.fact.id.as_str()),
            &payment.id,
            "payment",
        )?;
        self.payments.push(wrap(payment, options));
        Ok(())
    }

    pub fn record_disbursement(
        &mut self,
        disbursement: Disbursement,
        options: RecordOptions,
    ) -> LedgerResult<()> {
        self.require_contract(&disbursement.contract_id)?;
        require_positive(disbursement.amount, "disbursement.amount")?;
        require_unique_id(
            self.disbursements.iter().map(|r| r.fact.id.as_str()),
            &disbursement.id,
            "disbursement",
        )?;
        self.disbursements.push(wrap(disbursement, options));
        Ok(())
    }

    pub fn record_deposit(&mut self, deposit: Deposit, options: RecordOptions) -> LedgerResult<()> {
        self.require_contract(&deposit.contract_id)?;
        require_positive(deposit.amount, "deposit.amount")?;
        require_unique_id(
            self.deposits.iter().map(|r| r.fact.id.as_str()),
            &deposit.id,
            "deposit",
        )?;
        match deposit.kind {
            DepositKind::Transfer if deposit.target_contract.is_none() => {
                return Err(LedgerError::InvalidInput {
                    field: "deposit.target_contract".into(),
                    reason: "Transfer movements require a target contract.".into(),
                });
            }
            _ if deposit.kind != DepositKind::Transfer && deposit.target_contract.is_some() => {
                return Err(LedgerError::InvalidInput {
                    field: "deposit.target_contract".into(),
                    reason: "Only transfer movements carry a target contract.".into(),
                });
            }
            _ => {}
        }
        self.deposits.push(wrap(deposit, options));
        Ok(())
    }

    pub fn record_principal_allocation(
        &mut self,
        allocation: PrincipalAllocation,
        options: RecordOptions,
    ) -> LedgerResult<()> {
        self.require_contract(&allocation.contract_id)?;
        require_positive(allocation.amount, "principal_allocation.amount")?;
        require_unique_id(
            self.principal_allocations.iter().map(|r| r.fact.id.as_str()),
            &allocation.id,
            "principal_allocation",
        )?;
        self.principal_allocations.push(wrap(allocation, options));
        Ok(())
    }

    // -- Corrections ----------------------------------------------------------

    pub fn retract_fee(&mut self, fee_id: &str, options: RetractionOptions) -> LedgerResult<()> {
        let entry = retract_by_id(&mut self.fees, fee_id, |f| &f.id, "fee", &options)?;
        self.audit.push(entry);
        Ok(())
    }

    pub fn retract_payment(
        &mut self,
        payment_id: &str,
        options: RetractionOptions,
    ) -> LedgerResult<()> {
        let entry = retract_by_id(&mut self.payments, payment_id, |p| &p.id, "payment", &options)?;
        self.audit.push(entry);
        Ok(())
    }

    pub fn retract_disbursement(
        &mut self,
        disbursement_id: &str,
        options: RetractionOptions,
    ) -> LedgerResult<()> {
        let entry = retract_by_id(
            &mut self.disbursements,
            disbursement_id,
            |d| &d.id,
            "disbursement",
            &options,
        )?;
        self.audit.push(entry);
        Ok(())
    }

    pub fn retract_deposit(
        &mut self,
        deposit_id: &str,
        options: RetractionOptions,
    ) -> LedgerResult<()> {
        let entry = retract_by_id(&mut self.deposits, deposit_id, |d| &d.id, "deposit", &options)?;
        self.audit.push(entry);
        Ok(())
    }

    pub fn retract_principal_allocation(
        &mut self,
        allocation_id: &str,
        options: RetractionOptions,
    ) -> LedgerResult<()> {
        let entry = retract_by_id(
            &mut self.principal_allocations,
            allocation_id,
            |a| &a.id,
            "principal_allocation",
            &options,
        )?;
        self.audit.push(entry);
        Ok(())
    }

    /// Tombstone a schedule row. Identified by contract and sequence since
    /// installments carry no separate identifier. Only the highest current
    /// sequence may be retracted, so the surviving schedule stays
    /// contiguous; correcting a middle row means retracting tail-first and
    /// re-recording the corrected rows.
    pub fn retract_installment(
        &mut self,
        contract_id: &str,
        sequence: u32,
        options: RetractionOptions,
    ) -> LedgerResult<()> {
        let current_max = self
            .installments
            .iter()
            .filter(|r| r.is_current() && r.fact.contract_id == contract_id)
            .map(|r| r.fact.sequence)
            .max()
            .unwrap_or(0);
        let row = self
            .installments
            .iter_mut()
            .find(|r| {
                r.is_current() && r.fact.contract_id == contract_id && r.fact.sequence == sequence
            })
            .ok_or_else(|| LedgerError::NotFound {
                entity: "installment",
                id: format!("{contract_id}#{sequence}"),
            })?;
        if sequence != current_max {
            return Err(LedgerError::InvalidInput {
                field: "installment.sequence".into(),
                reason: format!(
                    "Only the last installment may be retracted: expected {current_max}, got {sequence}."
                ),
            });
        }
        row.retraction = Some(Retraction {
            date: options.date,
            author: options.author.clone(),
            reason: options.reason.clone(),
        });
        self.audit.push(AuditEntry {
            contract_id: contract_id.to_string(),
            action: "retract_installment".into(),
            reference: format!("{contract_id}#{sequence}"),
            date: options.date,
            author: options.author,
            reason: options.reason,
        });
        Ok(())
    }

    /// The one sanctioned in-place mutation: a rate-adjustment event
    /// rewriting an installment's profit-due (step-up re-pricing).
    pub fn adjust_installment_profit(
        &mut self,
        contract_id: &str,
        sequence: u32,
        new_profit_due: Money,
        options: AdjustmentOptions,
    ) -> LedgerResult<()> {
        if new_profit_due < Decimal::ZERO {
            return Err(LedgerError::InvalidInput {
                field: "profit_due".into(),
                reason: "Adjusted profit-due cannot be negative.".into(),
            });
        }
        let row = self
            .installments
            .iter_mut()
            .find(|r| {
                r.is_current() && r.fact.contract_id == contract_id && r.fact.sequence == sequence
            })
            .ok_or_else(|| LedgerError::NotFound {
                entity: "installment",
                id: format!("{contract_id}#{sequence}"),
            })?;
        let previous = row.fact.profit_due;
        row.fact.profit_due = new_profit_due;
        self.audit.push(AuditEntry {
            contract_id: contract_id.to_string(),
            action: format!("adjust_profit {previous} -> {new_profit_due}"),
            reference: format!("{contract_id}#{sequence}"),
            date: options.date,
            author: options.author,
            reason: options.reason,
        });
        Ok(())
    }

    // -- History views --------------------------------------------------------

    pub fn fee_history(&self, contract_id: &str) -> Vec<&Recorded<Fee>> {
        history(&self.fees, |f| f.contract_id == contract_id)
    }

    pub fn installment_history(&self, contract_id: &str) -> Vec<&Recorded<Installment>> {
        history(&self.installments, |i| i.contract_id == contract_id)
    }

    pub fn payment_history(&self, contract_id: &str) -> Vec<&Recorded<Payment>> {
        history(&self.payments, |p| p.contract_id == contract_id)
    }

    pub fn disbursement_history(&self, contract_id: &str) -> Vec<&Recorded<Disbursement>> {
        history(&self.disbursements, |d| d.contract_id == contract_id)
    }

    pub fn deposit_history(&self, contract_id: &str) -> Vec<&Recorded<Deposit>> {
        history(&self.deposits, |d| d.contract_id == contract_id)
    }

    pub fn principal_allocation_history(
        &self,
        contract_id: &str,
    ) -> Vec<&Recorded<PrincipalAllocation>> {
        history(&self.principal_allocations, |a| a.contract_id == contract_id)
    }

    pub fn audit_log(&self, contract_id: &str) -> Vec<&AuditEntry> {
        self.audit
            .iter()
            .filter(|e| e.contract_id == contract_id)
            .collect()
    }

    // -- Internals ------------------------------------------------------------

    fn contract_mut(&mut self, contract_id: &str) -> LedgerResult<&mut Contract> {
        self.contracts
            .get_mut(contract_id)
            .ok_or_else(|| LedgerError::NotFound {
                entity: "contract",
                id: contract_id.to_string(),
            })
    }

    fn require_contract(&self, contract_id: &str) -> LedgerResult<()> {
        if self.contracts.contains_key(contract_id) {
            Ok(())
        } else {
            Err(LedgerError::NotFound {
                entity: "contract",
                id: contract_id.to_string(),
            })
        }
    }
}

impl FactStore for InMemoryFactStore {
    fn contract(&self, contract_id: &str) -> LedgerResult<Contract> {
        self.contracts
            .get(contract_id)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound {
                entity: "contract",
                id: contract_id.to_string(),
            })
    }

    fn list_fees(&self, contract_id: &str) -> Vec<Fee> {
        current(&self.fees, |f| f.contract_id == contract_id)
    }

    fn list_installments(&self, contract_id: &str) -> Vec<Installment> {
        let mut rows = current(&self.installments, |i| i.contract_id == contract_id);
        rows.sort_by_key(|i| i.sequence);
        rows
    }

    fn list_payments(&self, contract_id: &str) -> Vec<Payment> {
        current(&self.payments, |p| p.contract_id == contract_id)
    }

    fn list_disbursements(&self, contract_id: &str) -> Vec<Disbursement> {
        current(&self.disbursements, |d| d.contract_id == contract_id)
    }

    fn list_deposits(&self, contract_id: &str) -> Vec<Deposit> {
        current(&self.deposits, |d| {
            d.contract_id == contract_id || d.target_contract.as_deref() == Some(contract_id)
        })
    }

    fn list_principal_allocations(&self, contract_id: &str) -> Vec<PrincipalAllocation> {
        current(&self.principal_allocations, |a| a.contract_id == contract_id)
    }
}

// ---------------------------------------------------------------------------
// Free helpers
// ---------------------------------------------------------------------------

fn wrap<T>(fact: T, options: RecordOptions) -> Recorded<T> {
    Recorded {
        fact,
        note: options.note,
        channel: options.channel,
        retraction: None,
    }
}

fn current<T: Clone>(rows: &[Recorded<T>], keep: impl Fn(&T) -> bool) -> Vec<T> {
    rows.iter()
        .filter(|r| r.is_current() && keep(&r.fact))
        .map(|r| r.fact.clone())
        .collect()
}

fn history<'a, T>(rows: &'a [Recorded<T>], keep: impl Fn(&T) -> bool) -> Vec<&'a Recorded<T>> {
    rows.iter().filter(|r| keep(&r.fact)).collect()
}

fn retract_by_id<T>(
    rows: &mut [Recorded<T>],
    id: &str,
    id_of: impl Fn(&T) -> &str,
    entity: &'static str,
    options: &RetractionOptions,
) -> LedgerResult<AuditEntry>
where
    T: HasContract,
{
    let row = rows
        .iter_mut()
        .find(|r| r.is_current() && id_of(&r.fact) == id)
        .ok_or_else(|| LedgerError::NotFound {
            entity,
            id: id.to_string(),
        })?;
    row.retraction = Some(Retraction {
        date: options.date,
        author: options.author.clone(),
        reason: options.reason.clone(),
    });
    Ok(AuditEntry {
        contract_id: row.fact.contract_id().to_string(),
        action: format!("retract_{entity}"),
        reference: id.to_string(),
        date: options.date,
        author: options.author.clone(),
        reason: options.reason.clone(),
    })
}

trait HasContract {
    fn contract_id(&self) -> &str;
}

macro_rules! has_contract {
    ($($ty:ty),*) => {
        $(impl HasContract for $ty {
            fn contract_id(&self) -> &str {
                &self.contract_id
            }
        })*
    };
}

has_contract!(Fee, Payment, Disbursement, Deposit, PrincipalAllocation);

fn require_positive(amount: Money, field: &str) -> LedgerResult<()> {
    if amount <= Decimal::ZERO {
        return Err(LedgerError::InvalidInput {
            field: field.to_string(),
            reason: "Amount must be positive.".into(),
        });
    }
    Ok(())
}

fn require_unique_id<'a>(
    mut existing: impl Iterator<Item = &'a str>,
    id: &str,
    entity: &str,
) -> LedgerResult<()> {
    if existing.any(|e| e == id) {
        return Err(LedgerError::InvalidInput {
            field: format!("{entity}.id"),
            reason: format!("Identifier '{id}' is already recorded."),
        });
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
