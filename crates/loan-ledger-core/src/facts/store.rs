//! Read-only query surface over the fact store.
//!
//! The derivation engine never talks to storage directly: callers inject a
//! `FactStore` value, and every composition reads all of a contract's
//! collections through one `snapshot` call so the whole computation sees a
//! single point-in-time view.

use serde::{Deserialize, Serialize};

use crate::facts::model::{
    Contract, Deposit, Disbursement, Fee, Installment, Payment, PrincipalAllocation,
};
use crate::LedgerResult;

/// One consistent snapshot of everything recorded against a contract.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractFacts {
    pub contract: Contract,
    #[serde(default)]
    pub fees: Vec<Fee>,
    #[serde(default)]
    pub installments: Vec<Installment>,
    #[serde(default)]
    pub payments: Vec<Payment>,
    #[serde(default)]
    pub disbursements: Vec<Disbursement>,
    #[serde(default)]
    pub deposits: Vec<Deposit>,
    #[serde(default)]
    pub principal_allocations: Vec<PrincipalAllocation>,
}

/// Read surface of the fact store, keyed by contract identifier.
///
/// Implementations must serve every method of one `snapshot` call from the
/// same point-in-time view of the store; mixing views within a composition
/// (an installment rate adjustment visible to one query but not another)
/// breaks internal consistency. List methods return current facts only;
/// retracted (tombstoned) rows are excluded.
pub trait FactStore {
    fn contract(&self, contract_id: &str) -> LedgerResult<Contract>;
    fn list_fees(&self, contract_id: &str) -> Vec<Fee>;
    fn list_installments(&self, contract_id: &str) -> Vec<Installment>;
    fn list_payments(&self, contract_id: &str) -> Vec<Payment>;
    fn list_disbursements(&self, contract_id: &str) -> Vec<Disbursement>;
    /// Includes transfer movements targeting `contract_id`, so deposit-held
    /// can credit transfers-in.
    fn list_deposits(&self, contract_id: &str) -> Vec<Deposit>;
    fn list_principal_allocations(&self, contract_id: &str) -> Vec<PrincipalAllocation>;

    /// Bundle all collections into one consistent snapshot.
    fn snapshot(&self, contract_id: &str) -> LedgerResult<ContractFacts> {
        let contract = self.contract(contract_id)?;
        Ok(ContractFacts {
            fees: self.list_fees(contract_id),
            installments: self.list_installments(contract_id),
            payments: self.list_payments(contract_id),
            disbursements: self.list_disbursements(contract_id),
            deposits: self.list_deposits(contract_id),
            principal_allocations: self.list_principal_allocations(contract_id),
            contract,
        })
    }
}
