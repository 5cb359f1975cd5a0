// src/codec/mod.rs
//! Wire formats shared with the ledger
//!
//! - State-transition call data and its selector
//! - The registry mapping function names to selectors and argument counts
//! - Decoding of optimistic transaction input into one of four shapes

mod call_data;
mod registry;
mod transaction;

pub use call_data::{selector, CallData, Selector};
pub use registry::{FunctionDef, FunctionRegistry};
pub use transaction::{OptimisticCall, TxShape};
