pub mod memory;
pub mod model;
pub mod store;

pub use memory::InMemoryFactStore;
pub use model::*;
pub use store::{ContractFacts, FactStore};
