// src/fraud_proof_system/verifiers.rs
//! Local verifiers
//!
//! Pure re-implementations of state-transition functions, keyed by selector.
//! Detection runs these instead of asking the ledger whenever one exists for
//! the decoded function.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::codec::{CallData, Selector};
use crate::commitment::Hash;
use crate::error_handling::{LedgerError, LedgerResult};
use crate::ledger::TransitionLogic;

/// Pure transition function: resulting state, or a reason it cannot run
pub type LocalVerifier = Arc<dyn Fn(&CallData) -> Result<Hash, String> + Send + Sync>;

/// Local verifiers by selector
#[derive(Clone, Default)]
pub struct VerifierSet {
    verifiers: HashMap<Selector, LocalVerifier>,
}

impl VerifierSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder form of [`VerifierSet::register`]
    pub fn with<F>(mut self, function: Selector, verifier: F) -> Self
    where
        F: Fn(&CallData) -> Result<Hash, String> + Send + Sync + 'static,
    {
        self.register(function, verifier);
        self
    }

    /// Register the verifier for `function`, replacing any previous one
    pub fn register<F>(&mut self, function: Selector, verifier: F)
    where
        F: Fn(&CallData) -> Result<Hash, String> + Send + Sync + 'static,
    {
        self.verifiers.insert(function, Arc::new(verifier));
    }

    /// Check if `function` can be verified locally
    pub fn contains(&self, function: &Selector) -> bool {
        self.verifiers.contains_key(function)
    }

    /// Number of registered verifiers
    pub fn len(&self) -> usize {
        self.verifiers.len()
    }

    /// Check if no verifier is registered
    pub fn is_empty(&self) -> bool {
        self.verifiers.is_empty()
    }

    /// Run the local verifier for `call`, if there is one
    pub fn verify(&self, call: &CallData) -> Option<Result<Hash, String>> {
        self.verifiers.get(&call.function).map(|verifier| verifier(call))
    }
}

impl fmt::Debug for VerifierSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut selectors: Vec<String> = self.verifiers.keys().map(hex::encode).collect();
        selectors.sort();
        f.debug_struct("VerifierSet").field("selectors", &selectors).finish()
    }
}

#[async_trait]
impl TransitionLogic for VerifierSet {
    async fn execute(&self, call_data: &[u8]) -> LedgerResult<Hash> {
        let call = CallData::decode(call_data).map_err(|e| LedgerError::Reverted(e.to_string()))?;
        match self.verify(&call) {
            Some(result) => result.map_err(LedgerError::Reverted),
            None => Err(LedgerError::Reverted(format!(
                "unknown function 0x{}",
                hex::encode(call.function)
            ))),
        }
    }
}
