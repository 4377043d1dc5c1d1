pub mod allocator;

pub use allocator::{allocate, Allocation, DueFee, WaterfallOutcome};
