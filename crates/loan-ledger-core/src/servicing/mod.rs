pub mod composer;
pub mod paid_dates;
pub mod status;

pub use composer::{compose_from_facts, compose_state, ContractState, FeeState, InstallmentState};
pub use status::{ContractStatus, FeeStatus, InstallmentStatus};
