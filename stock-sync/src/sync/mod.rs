//! Stock item to Dynamics reconciliation
//!
//! One pass reads every stock item and, strictly one item at a time, makes
//! sure Dynamics holds a matching active product with a price list item on
//! the default price list.

pub mod engine;
pub mod outcome;

pub use engine::StockSync;
pub use outcome::{PassReport, PriceAction, ProductAction, RecordOutcome, SyncStage};
