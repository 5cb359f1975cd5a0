// src/lib.rs
//! Optimistic rollup client
//!
//! This crate drives accounts on an optimistic-execution dispute ledger:
//! - Commitments binding history root, state and optimistic timestamp
//! - Append-only Merkle histories and the proofs the ledger verifies
//! - Pessimistic, optimistic and batched transitions of an owned account
//! - Fraud detection, fraud proofs and rollback of dishonest accounts

pub mod codec;
pub mod commitment;
pub mod config;
pub mod error_handling;
pub mod fraud_proof_system;
pub mod ledger;
pub mod merkle;
pub mod proof_adapter;
pub mod rollup;

pub use codec::{CallData, FunctionRegistry, OptimisticCall, TxShape};
pub use commitment::{commitment, Address, Hash, Word};
pub use config::ClientConfig;
pub use error_handling::{LedgerError, OriError, OriResult};
pub use fraud_proof_system::{DetectionReport, FraudMonitor, VerifierSet};
pub use ledger::{Ledger, LedgerEvent, Receipt, TransitionLogic};
pub use rollup::{Account, CallMode, Mode, TransitionEngine};

use std::sync::Arc;

use log::info;

use crate::commitment::short_hex;

/// Crate version
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Client bound to one ledger identity
pub struct OriClient<L: Ledger> {
    /// Ledger connection
    ledger: Arc<L>,

    /// Client configuration
    config: ClientConfig,

    /// State-transition functions
    registry: Arc<FunctionRegistry>,

    /// Collateral required by the ledger, read at connection time
    required_bond: u128,
}

impl<L: Ledger> OriClient<L> {
    /// Connect to the ledger
    pub async fn connect(ledger: Arc<L>, config: ClientConfig, registry: FunctionRegistry) -> OriResult<Self> {
        let required_bond = ledger.required_bond().await?;
        info!(
            "oprollups {} connected as {}, required bond {}",
            version(),
            short_hex(&ledger.sender()),
            required_bond
        );

        Ok(Self {
            ledger,
            config,
            registry: Arc::new(registry),
            required_bond,
        })
    }

    /// Signing identity
    pub fn address(&self) -> Address {
        self.ledger.sender()
    }

    /// Collateral required for optimistic transitions
    pub fn required_bond(&self) -> u128 {
        self.required_bond
    }

    /// Dispute window length
    pub async fn lock_time(&self) -> OriResult<u64> {
        Ok(self.ledger.lock_time().await?)
    }

    /// Bonded balance of `user`
    pub async fn balance(&self, user: Address) -> OriResult<u128> {
        Ok(self.ledger.balance(user).await?)
    }

    /// Engine for the client's own account, pessimistic at `initial_state`
    pub fn account(&self, initial_state: Hash) -> TransitionEngine<L> {
        TransitionEngine::new(
            Arc::clone(&self.ledger),
            Arc::clone(&self.registry),
            self.config.clone(),
            self.ledger.sender(),
            initial_state,
        )
    }

    /// Observer of other accounts
    pub fn monitor(&self, logic: Arc<dyn TransitionLogic>, verifiers: VerifierSet) -> FraudMonitor<L> {
        FraudMonitor::new(Arc::clone(&self.ledger), logic, verifiers, self.config.clone())
    }

    /// Function registry
    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }
}
