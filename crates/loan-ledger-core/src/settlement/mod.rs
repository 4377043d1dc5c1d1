pub mod calculator;

pub use calculator::{calculate_settlement, SettlementResult};
