// src/codec/registry.rs
//! Static table of state-transition functions
//!
//! Calls are built through one entry point keyed by function name; the table
//! maps each name to its selector and argument count.

use std::collections::HashMap;

use crate::commitment::{Address, Hash, Word};
use crate::error_handling::{OriError, OriResult};

use super::call_data::{selector, CallData, Selector};

/// A registered state-transition function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionDef {
    /// Function name
    pub name: String,

    /// Canonical signature the selector is derived from
    pub signature: String,

    /// Function selector
    pub selector: Selector,

    /// Number of argument words
    pub arity: usize,
}

/// Registry of state-transition functions
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    /// Definitions by selector
    by_selector: HashMap<Selector, FunctionDef>,

    /// Selectors by name
    by_name: HashMap<String, Selector>,
}

impl FunctionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`FunctionRegistry::register`]
    pub fn with(mut self, name: &str, arity: usize) -> Self {
        self.register(name, arity);
        self
    }

    /// Register a function taking `arity` argument words
    pub fn register(&mut self, name: &str, arity: usize) -> Selector {
        let signature = format!("{}(address,bytes32{})", name, ",uint256".repeat(arity));
        let function = selector(&signature);
        self.by_name.insert(name.to_string(), function);
        self.by_selector.insert(
            function,
            FunctionDef {
                name: name.to_string(),
                signature,
                selector: function,
                arity,
            },
        );
        function
    }

    /// Look up a function by name
    pub fn get(&self, name: &str) -> OriResult<&FunctionDef> {
        self.by_name
            .get(name)
            .and_then(|function| self.by_selector.get(function))
            .ok_or_else(|| OriError::InvalidArgument(format!("unknown function '{}'", name)))
    }

    /// Look up a function by selector
    pub fn by_selector(&self, function: &Selector) -> Option<&FunctionDef> {
        self.by_selector.get(function)
    }

    /// Check the argument count of a call to `name`
    pub fn check_args(&self, name: &str, args: &[Word]) -> OriResult<&FunctionDef> {
        let def = self.get(name)?;
        if def.arity != args.len() {
            return Err(OriError::InvalidArgument(format!(
                "{} takes {} arguments, got {}",
                def.signature,
                def.arity,
                args.len()
            )));
        }
        Ok(def)
    }

    /// Build the call data of `name` for `user` starting from `current_state`
    pub fn encode_call(&self, name: &str, user: Address, current_state: Hash, args: &[Word]) -> OriResult<Vec<u8>> {
        let def = self.check_args(name, args)?;
        CallData::new(def.selector, user, current_state, args.to_vec()).encode()
    }
}
