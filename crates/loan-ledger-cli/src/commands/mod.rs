pub mod settle;
pub mod state;
