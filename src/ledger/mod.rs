// src/ledger/mod.rs
//! Ledger contract and transition logic interfaces
//!
//! The ledger is the authoritative keeper of one commitment per account. The
//! client only talks to it through [`Ledger`], bound to the identity that
//! signs the submitted transactions. [`TransitionLogic`] is the deterministic
//! state-transition function the ledger runs for pessimistic calls and fraud
//! adjudication.

#[cfg(feature = "simulated")]
mod simulated;

#[cfg(feature = "simulated")]
pub use simulated::{LedgerParams, SimulatedChain, SimulatedLedger};

use async_trait::async_trait;

use crate::codec::OptimisticCall;
use crate::commitment::{Address, Hash};
use crate::error_handling::LedgerResult;
use crate::merkle::MultiProof;
use crate::proof_adapter::RollbackProof;

/// Dispute window of the deployed contract, in seconds
pub const DEFAULT_LOCK_TIME: u64 = 600;

/// Events emitted by the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LedgerEvent {
    /// Pessimistic transition (or initialisation) produced `state`
    NewState { user: Address, state: Hash },

    /// Single optimistic transition accepted at `last_time`
    NewOptimisticState { user: Address, last_time: u64 },

    /// Batch of optimistic transitions accepted at `last_time`
    NewOptimisticStates { user: Address, last_time: u64 },

    /// Bonded collateral changed
    Bonded { user: Address, balance: u128 },

    /// `locker` opened a dispute against `suspect`
    Locked { suspect: Address, locker: Address },

    /// Dispute window closed without a fraud proof
    Unlocked { suspect: Address },

    /// Fraud proven; `suspect` must roll back to `rollback_size` elements
    FraudProven { suspect: Address, accuser: Address, rollback_size: u64 },

    /// History of `user` was cut back; the account restarts its window at `last_time`
    RolledBack { user: Address, last_time: u64 },
}

/// Outcome of a submitted transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    /// Transaction hash
    pub tx_hash: Hash,

    /// Emitted events
    pub events: Vec<LedgerEvent>,
}

impl Receipt {
    /// State from a `NewState` event of `user`
    pub fn new_state(&self, user: &Address) -> Option<Hash> {
        self.events.iter().find_map(|event| match event {
            LedgerEvent::NewState { user: u, state } if u == user => Some(*state),
            _ => None,
        })
    }

    /// Timestamp from an optimistic-state event of `user`
    pub fn optimistic_time(&self, user: &Address) -> Option<u64> {
        self.events.iter().find_map(|event| match event {
            LedgerEvent::NewOptimisticState { user: u, last_time }
            | LedgerEvent::NewOptimisticStates { user: u, last_time }
                if u == user =>
            {
                Some(*last_time)
            }
            _ => None,
        })
    }

    /// Timestamp from a `RolledBack` event of `user`
    pub fn rollback_time(&self, user: &Address) -> Option<u64> {
        self.events.iter().find_map(|event| match event {
            LedgerEvent::RolledBack { user: u, last_time } if u == user => Some(*last_time),
            _ => None,
        })
    }

    /// Rollback size from a `FraudProven` event against `suspect`
    pub fn fraud_rollback_size(&self, suspect: &Address) -> Option<u64> {
        self.events.iter().find_map(|event| match event {
            LedgerEvent::FraudProven {
                suspect: s,
                rollback_size,
                ..
            } if s == suspect => Some(*rollback_size),
            _ => None,
        })
    }
}

/// A transaction read back from the ledger
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedTransaction {
    /// Sender
    pub from: Address,

    /// Raw input bytes
    pub input: Vec<u8>,

    /// Receipt with decoded events
    pub receipt: Receipt,
}

/// Arguments of the ledger's rollback entry point
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackRequest {
    /// Account being rolled back
    pub user: Address,

    /// Kept root, discarded elements and their proofs
    pub proof: RollbackProof,

    /// Current history root
    pub root: Hash,

    /// Current state
    pub state: Hash,

    /// Current lastTime
    pub last_time: u64,
}

/// Ledger contract surface, bound to the sending identity
#[async_trait]
pub trait Ledger: Send + Sync {
    /// Identity that signs submitted transactions
    fn sender(&self) -> Address;

    /// Create the sender's account with `bond` collateral
    async fn initialize(&self, bond: u128) -> LedgerResult<Receipt>;

    /// Add collateral to `user`
    async fn bond(&self, user: Address, amount: u128) -> LedgerResult<Receipt>;

    /// Pessimistic transition; requires lastTime == 0
    async fn perform(&self, call_data: Vec<u8>) -> LedgerResult<Receipt>;

    /// Pessimistic transition leaving optimism once the dispute window elapsed
    async fn perform_and_exit(&self, call_data: Vec<u8>, root: Hash, last_time: u64) -> LedgerResult<Receipt>;

    /// Any of the four optimistic entry points
    async fn perform_optimistic(&self, call: OptimisticCall) -> LedgerResult<Receipt>;

    /// Freeze `suspect` and the sender pending a dispute
    async fn lock_user(&self, suspect: Address) -> LedgerResult<Receipt>;

    /// Release a lock whose window elapsed without a proof
    async fn unlock(&self, suspect: Address, state: Hash, root: Hash, last_time: u64) -> LedgerResult<Receipt>;

    /// Adjudicate a fraud claim against `suspect`
    async fn prove_fraud(
        &self,
        suspect: Address,
        call_data: Vec<Vec<u8>>,
        state: Hash,
        root: Hash,
        proof: MultiProof,
        last_time: u64,
    ) -> LedgerResult<Receipt>;

    /// Revert a history proven fraudulent
    async fn rollback(&self, request: RollbackRequest) -> LedgerResult<Receipt>;

    /// Bonded balance of `user`
    async fn balance(&self, user: Address) -> LedgerResult<u128>;

    /// Collateral required to transition optimistically
    async fn required_bond(&self) -> LedgerResult<u128>;

    /// Dispute window length
    async fn lock_time(&self) -> LedgerResult<u64>;

    /// Committed account hash of `user`
    async fn account_hash(&self, user: Address) -> LedgerResult<Hash>;

    /// Current locker of `user`, if any
    async fn locker(&self, user: Address) -> LedgerResult<Option<Address>>;

    /// Time the lock on `user` was taken, 0 when unlocked
    async fn lock_timestamp(&self, user: Address) -> LedgerResult<u64>;

    /// History size `user` must roll back to, if fraud was proven
    async fn rollback_size(&self, user: Address) -> LedgerResult<Option<u64>>;

    /// Whether `user` may leave optimism now
    async fn can_exit(&self, user: Address) -> LedgerResult<bool>;

    /// Read back a submitted transaction
    async fn transaction(&self, tx_hash: Hash) -> LedgerResult<ObservedTransaction>;
}

/// Deterministic state-transition function
#[async_trait]
pub trait TransitionLogic: Send + Sync {
    /// State produced by running `call_data`
    async fn execute(&self, call_data: &[u8]) -> LedgerResult<Hash>;
}
