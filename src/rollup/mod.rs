// src/rollup/mod.rs
//! Rollup accounts
//!
//! This module provides the account state shared by owned, mirrored and
//! fraudster views, and the engine that drives the owner's transitions.

mod account;
mod engine;

pub use account::{Account, AccountSnapshot, Mode};
pub use engine::{CallMode, QueuedTransition, TransitionEngine};
