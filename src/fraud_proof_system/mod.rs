// src/fraud_proof_system/mod.rs
//! Fraud proof system
//!
//! This module watches other accounts and acts on dishonest ones:
//! - Detection of invalid optimistic transitions
//! - Reconstruction of fraudster views from a single transaction
//! - Fraud proof submission
//! - Rollback of histories proven fraudulent
//! - Mirrored views of honest accounts

mod detection;
mod proving;
mod reconstruction;
mod rollback;
mod verifiers;

pub use detection::{apply_observed, first_invalid, DetectionReport};
pub use proving::prove_account;
pub use reconstruction::reconstruct_fraudster;
pub use rollback::rollback_account;
pub use verifiers::{LocalVerifier, VerifierSet};

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};

use crate::codec::{OptimisticCall, TxShape};
use crate::commitment::{short_hex, Address, Hash};
use crate::config::ClientConfig;
use crate::error_handling::{OriError, OriResult};
use crate::ledger::{Ledger, ObservedTransaction, Receipt, TransitionLogic};
use crate::rollup::Account;

/// Observer of other accounts
pub struct FraudMonitor<L: Ledger> {
    /// Ledger connection, signing as the observer
    ledger: Arc<L>,

    /// Authoritative transition function
    logic: Arc<dyn TransitionLogic>,

    /// Local fast-path verifiers
    verifiers: VerifierSet,

    /// Client configuration
    config: ClientConfig,

    /// Fraudster views by suspect, one per address
    fraudsters: HashMap<Address, Account>,

    /// Mirrored accounts by address
    mirrors: HashMap<Address, Account>,
}

impl<L: Ledger> FraudMonitor<L> {
    /// Create a new monitor
    pub fn new(ledger: Arc<L>, logic: Arc<dyn TransitionLogic>, verifiers: VerifierSet, config: ClientConfig) -> Self {
        Self {
            ledger,
            logic,
            verifiers,
            config,
            fraudsters: HashMap::new(),
            mirrors: HashMap::new(),
        }
    }

    /// Fetch `tx_hash` and check it against `suspect`
    pub async fn check(&mut self, tx_hash: Hash, suspect: Address) -> OriResult<DetectionReport> {
        let tx = self.ledger.transaction(tx_hash).await?;
        self.check_transaction(&tx, suspect).await
    }

    /// Check an observed transaction against `suspect`.
    ///
    /// An invalid transaction leaves a fraudster view of `suspect` behind,
    /// replacing any earlier one.
    pub async fn check_transaction(&mut self, tx: &ObservedTransaction, suspect: Address) -> OriResult<DetectionReport> {
        let call = OptimisticCall::decode(&tx.input)?;
        let index = match self.detect(&call, &suspect).await {
            None => return Ok(DetectionReport { valid: true, user: suspect }),
            Some(index) => index,
        };

        let last_time = tx
            .receipt
            .optimistic_time(&tx.from)
            .ok_or_else(|| OriError::Decoding("transaction carries no optimistic-state event".to_string()))?;
        let fraudster = reconstruct_fraudster(suspect, index, &call, last_time)?;
        self.fraudsters.insert(suspect, fraudster);
        Ok(DetectionReport { valid: false, user: suspect })
    }

    /// Batch position of the first invalid transition of `call`, without recording anything
    pub async fn detect(&self, call: &OptimisticCall, suspect: &Address) -> Option<usize> {
        first_invalid(self.logic.as_ref(), &self.verifiers, suspect, call).await
    }

    /// Fraudster view of `suspect`
    pub fn fraudster(&self, suspect: &Address) -> Option<&Account> {
        self.fraudsters.get(suspect)
    }

    /// Number of fraudster views held
    pub fn fraudster_count(&self) -> usize {
        self.fraudsters.len()
    }

    /// Prove fraud against `suspect`.
    ///
    /// The fraudster view is consumed and handed back with its fraud index
    /// cleared, ready for [`FraudMonitor::rollback`]. It stays in the monitor
    /// if the proof is rejected.
    pub async fn prove_fraud(&mut self, suspect: Address) -> OriResult<(Receipt, Account)> {
        let mut account = self
            .fraudsters
            .remove(&suspect)
            .ok_or_else(|| OriError::NotFound(format!("no fraudster view of {}", short_hex(&suspect))))?;

        match prove_account(
            self.ledger.as_ref(),
            &account,
            self.config.lock_before_proving,
            self.config.check_sync,
        )
        .await
        {
            Ok(receipt) => {
                account.fraud_index = None;
                Ok((receipt, account))
            }
            Err(e) => {
                self.fraudsters.insert(suspect, account);
                Err(e)
            }
        }
    }

    /// Roll back an account proven fraudulent
    pub async fn rollback(&self, account: &mut Account) -> OriResult<Receipt> {
        rollback_account(self.ledger.as_ref(), account).await
    }

    /// Open a dispute against `suspect`
    pub async fn lock(&self, suspect: Address) -> OriResult<Receipt> {
        info!("locking {}", short_hex(&suspect));
        Ok(self.ledger.lock_user(suspect).await?)
    }

    /// Release `suspect` after the dispute window elapsed without a proof
    pub async fn unlock(&self, suspect: Address) -> OriResult<Receipt> {
        let view = self
            .fraudsters
            .get(&suspect)
            .or_else(|| self.mirrors.get(&suspect))
            .ok_or_else(|| OriError::NotFound(format!("no view of {}", short_hex(&suspect))))?;

        info!("unlocking {}", short_hex(&suspect));
        Ok(self
            .ledger
            .unlock(suspect, view.current_state, view.root(), view.last_time)
            .await?)
    }

    /// Start mirroring `user`, currently pessimistic at `state`
    pub fn watch(&mut self, user: Address, state: Hash) {
        self.mirrors.insert(user, Account::new(user, state));
    }

    /// Mirrored view of `user`
    pub fn mirror(&self, user: &Address) -> Option<&Account> {
        self.mirrors.get(user)
    }

    /// Fetch `tx_hash` and apply it to the sender's mirror
    pub async fn update(&mut self, tx_hash: Hash) -> OriResult<Address> {
        let tx = self.ledger.transaction(tx_hash).await?;
        self.apply_transaction(&tx)?;
        Ok(tx.from)
    }

    /// Apply an observed transaction to the sender's mirror
    pub fn apply_transaction(&mut self, tx: &ObservedTransaction) -> OriResult<()> {
        let user = tx.from;
        let mirror = self
            .mirrors
            .get_mut(&user)
            .ok_or_else(|| OriError::NotFound(format!("not watching {}", short_hex(&user))))?;

        if let Some(state) = tx.receipt.new_state(&user) {
            mirror.reset_pessimistic(state);
            return Ok(());
        }
        if let Some(last_time) = tx.receipt.rollback_time(&user) {
            return Err(OriError::Desync(format!(
                "{} rolled back at {}; mirror must be rebuilt",
                short_hex(&user),
                last_time
            )));
        }

        if tx.input.get(..4).and_then(TxShape::from_sighash).is_none() {
            debug!("{} sent no state transition, mirror unchanged", short_hex(&user));
            return Ok(());
        }

        let call = OptimisticCall::decode(&tx.input)?;
        let last_time = tx
            .receipt
            .optimistic_time(&user)
            .ok_or_else(|| OriError::Decoding("transaction carries no optimistic-state event".to_string()))?;
        apply_observed(mirror, &call, last_time)
    }
}
