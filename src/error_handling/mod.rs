// src/error_handling/mod.rs
//! Error handling for the optimistic rollup client
//!
//! This module provides the error taxonomy shared by every component:
//! desync, permission, protocol guard and collaborator failures.

pub mod error_types;

// Re-export common types
pub use error_types::{LedgerError, LedgerResult, OriError, OriResult};
