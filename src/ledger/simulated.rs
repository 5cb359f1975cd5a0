// src/ledger/simulated.rs
//! In-memory ledger for devnets and tests
//!
//! A stand-in for the deployed contract, which stays the only authority. It
//! mirrors the rules the client relies on: commitment checks on every
//! transition, bonding, locking, the dispute window, fraud adjudication and
//! rollback verification. Time only moves through
//! [`SimulatedChain::advance_time`]. Built with the `simulated` feature.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::codec::{selector, CallData, OptimisticCall};
use crate::commitment::{commitment, keccak256, short_hex, u64_word, Address, Hash, EMPTY_ROOT};
use crate::error_handling::{LedgerError, LedgerResult};
use crate::merkle::MultiProof;

use super::{Ledger, LedgerEvent, ObservedTransaction, Receipt, RollbackRequest, TransitionLogic, DEFAULT_LOCK_TIME};

/// Contract parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerParams {
    /// Dispute window in seconds
    pub lock_time: u64,

    /// Collateral required for optimistic transitions and for locking
    pub required_bond: u128,

    /// State of a freshly initialised account
    pub initial_state: Hash,

    /// Clock value at genesis
    pub genesis_time: u64,
}

impl Default for LedgerParams {
    fn default() -> Self {
        Self {
            lock_time: DEFAULT_LOCK_TIME,
            required_bond: 100,
            initial_state: [0; 32],
            genesis_time: 1_000,
        }
    }
}

/// Per-account contract storage
#[derive(Debug, Clone, Default)]
struct LedgerAccount {
    /// Committed hash
    hash: Hash,

    /// Bonded collateral
    balance: u128,

    /// Mirror of the committed lastTime, kept for the window views
    last_time: u64,

    /// Required rollback size after a proven fraud
    rollback_size: Option<u64>,
}

/// An open dispute
#[derive(Debug, Clone, Copy)]
struct Lock {
    /// Accuser
    locker: Address,

    /// Time the lock was taken
    timestamp: u64,
}

/// Mutable chain state
#[derive(Debug, Default)]
struct ChainState {
    /// Current time
    now: u64,

    /// Accounts by address
    accounts: HashMap<Address, LedgerAccount>,

    /// Open disputes by suspect
    locks: HashMap<Address, Lock>,

    /// Submitted transactions by hash
    transactions: HashMap<Hash, ObservedTransaction>,

    /// Transaction counter
    nonce: u64,
}

fn revert(message: impl Into<String>) -> LedgerError {
    LedgerError::Reverted(message.into())
}

impl ChainState {
    fn account(&self, user: &Address) -> LedgerResult<&LedgerAccount> {
        self.accounts
            .get(user)
            .ok_or_else(|| revert(format!("account {} not initialized", short_hex(user))))
    }

    fn account_mut(&mut self, user: &Address) -> LedgerResult<&mut LedgerAccount> {
        self.accounts
            .get_mut(user)
            .ok_or_else(|| revert(format!("account {} not initialized", short_hex(user))))
    }

    /// Locked as suspect or as accuser
    fn is_locked(&self, user: &Address) -> bool {
        self.locks.contains_key(user) || self.locks.values().any(|lock| lock.locker == *user)
    }

    /// Account may submit transitions
    fn ensure_active(&self, user: &Address) -> LedgerResult<()> {
        let account = self.account(user)?;
        if self.is_locked(user) {
            return Err(revert("account is locked"));
        }
        if account.rollback_size.is_some() {
            return Err(revert("account must roll back first"));
        }
        Ok(())
    }

    fn ensure_bonded(&self, user: &Address, required: u128) -> LedgerResult<()> {
        if self.account(user)?.balance < required {
            return Err(revert("insufficient bond"));
        }
        Ok(())
    }

    /// Store a transaction and build its receipt
    fn record(&mut self, from: Address, input: Vec<u8>, events: Vec<LedgerEvent>) -> Receipt {
        self.nonce += 1;
        let mut preimage = u64_word(self.nonce).to_vec();
        preimage.extend_from_slice(&from);
        preimage.extend_from_slice(&input);
        let receipt = Receipt {
            tx_hash: keccak256(&preimage),
            events,
        };
        self.transactions.insert(
            receipt.tx_hash,
            ObservedTransaction {
                from,
                input,
                receipt: receipt.clone(),
            },
        );
        receipt
    }
}

/// Shared in-memory chain
pub struct SimulatedChain {
    /// Contract parameters
    params: LedgerParams,

    /// State-transition function run by the contract
    logic: Arc<dyn TransitionLogic>,

    /// Chain state
    state: Mutex<ChainState>,
}

impl SimulatedChain {
    /// Create a new chain
    pub fn new(logic: Arc<dyn TransitionLogic>, params: LedgerParams) -> Arc<Self> {
        let state = ChainState {
            now: params.genesis_time,
            ..ChainState::default()
        };
        Arc::new(Self {
            params,
            logic,
            state: Mutex::new(state),
        })
    }

    /// Ledger handle signing as `sender`
    pub fn connect(self: &Arc<Self>, sender: Address) -> SimulatedLedger {
        SimulatedLedger {
            chain: Arc::clone(self),
            sender,
        }
    }

    /// Move the clock forward
    pub async fn advance_time(&self, seconds: u64) {
        let mut state = self.state.lock().await;
        state.now += seconds;
    }

    /// Current time
    pub async fn now(&self) -> u64 {
        self.state.lock().await.now
    }

    /// Number of transactions submitted so far
    pub async fn transaction_count(&self) -> usize {
        self.state.lock().await.transactions.len()
    }
}

/// Ledger handle bound to one sender
#[derive(Clone)]
pub struct SimulatedLedger {
    /// Shared chain
    chain: Arc<SimulatedChain>,

    /// Signing identity
    sender: Address,
}

impl SimulatedLedger {
    /// Chain behind this handle
    pub fn chain(&self) -> &Arc<SimulatedChain> {
        &self.chain
    }

    fn decode_call(&self, call_data: &[u8]) -> LedgerResult<CallData> {
        let call = CallData::decode(call_data).map_err(|e| revert(e.to_string()))?;
        if call.user != self.sender {
            return Err(revert("call data user is not the sender"));
        }
        Ok(call)
    }
}

#[async_trait]
impl Ledger for SimulatedLedger {
    fn sender(&self) -> Address {
        self.sender
    }

    async fn initialize(&self, bond: u128) -> LedgerResult<Receipt> {
        let initial_state = self.chain.params.initial_state;
        let mut state = self.chain.state.lock().await;
        if state.accounts.contains_key(&self.sender) {
            return Err(revert("account already initialized"));
        }
        state.accounts.insert(
            self.sender,
            LedgerAccount {
                hash: commitment(&EMPTY_ROOT, &initial_state, 0),
                balance: bond,
                ..LedgerAccount::default()
            },
        );

        let input = selector("initialize()").to_vec();
        Ok(state.record(
            self.sender,
            input,
            vec![LedgerEvent::NewState {
                user: self.sender,
                state: initial_state,
            }],
        ))
    }

    async fn bond(&self, user: Address, amount: u128) -> LedgerResult<Receipt> {
        let mut state = self.chain.state.lock().await;
        let account = state.account_mut(&user)?;
        account.balance += amount;
        let balance = account.balance;

        let mut input = selector("bond(address)").to_vec();
        input.extend_from_slice(&user);
        Ok(state.record(self.sender, input, vec![LedgerEvent::Bonded { user, balance }]))
    }

    async fn perform(&self, call_data: Vec<u8>) -> LedgerResult<Receipt> {
        let call = self.decode_call(&call_data)?;
        let new_state = self.chain.logic.execute(&call_data).await?;

        let mut state = self.chain.state.lock().await;
        state.ensure_active(&self.sender)?;
        let account = state.account_mut(&self.sender)?;
        if account.last_time != 0 {
            return Err(revert("account is optimistic"));
        }
        if account.hash != commitment(&EMPTY_ROOT, &call.current_state, 0) {
            return Err(revert("current state does not match the committed state"));
        }
        account.hash = commitment(&EMPTY_ROOT, &new_state, 0);

        let mut input = selector("perform(bytes)").to_vec();
        input.extend_from_slice(&call_data);
        Ok(state.record(
            self.sender,
            input,
            vec![LedgerEvent::NewState {
                user: self.sender,
                state: new_state,
            }],
        ))
    }

    async fn perform_and_exit(&self, call_data: Vec<u8>, root: Hash, last_time: u64) -> LedgerResult<Receipt> {
        let call = self.decode_call(&call_data)?;
        let new_state = self.chain.logic.execute(&call_data).await?;
        let lock_time = self.chain.params.lock_time;

        let mut state = self.chain.state.lock().await;
        state.ensure_active(&self.sender)?;
        let now = state.now;
        let account = state.account_mut(&self.sender)?;
        if account.last_time == 0 {
            return Err(revert("account is not optimistic"));
        }
        if account.hash != commitment(&root, &call.current_state, last_time) {
            return Err(revert("commitment mismatch"));
        }
        if now < last_time + lock_time {
            return Err(revert("dispute window has not elapsed"));
        }
        account.hash = commitment(&EMPTY_ROOT, &new_state, 0);
        account.last_time = 0;

        let mut input = selector("perform_and_exit(bytes,bytes32,uint256)").to_vec();
        input.extend_from_slice(&call_data);
        Ok(state.record(
            self.sender,
            input,
            vec![LedgerEvent::NewState {
                user: self.sender,
                state: new_state,
            }],
        ))
    }

    async fn perform_optimistic(&self, call: OptimisticCall) -> LedgerResult<Receipt> {
        let elements = call.call_data();
        let first = match elements.first() {
            Some(first) => self.decode_call(first)?,
            None => return Err(revert("empty batch")),
        };
        let input = call.encode().map_err(|e| revert(e.to_string()))?;
        let required_bond = self.chain.params.required_bond;

        let mut state = self.chain.state.lock().await;
        state.ensure_active(&self.sender)?;
        state.ensure_bonded(&self.sender, required_bond)?;
        let now = state.now;
        let account = state.account_mut(&self.sender)?;

        let (root, last_time) = match (call.root(), call.last_time()) {
            (Some(root), Some(last_time)) => {
                if account.last_time == 0 {
                    return Err(revert("account is not optimistic"));
                }
                (root, last_time)
            }
            _ => {
                if account.last_time != 0 {
                    return Err(revert("account is already optimistic"));
                }
                (EMPTY_ROOT, 0)
            }
        };
        if account.hash != commitment(&root, &first.current_state, last_time) {
            return Err(revert("commitment mismatch"));
        }
        if call.proof().root() != root {
            return Err(revert("append proof does not start from the committed root"));
        }
        let new_root = call.proof().appended_root(elements).map_err(|e| revert(e.to_string()))?;

        account.hash = commitment(&new_root, &call.new_state(), now);
        account.last_time = now;
        debug!(
            "{} appended {} element(s), root {}",
            short_hex(&self.sender),
            elements.len(),
            short_hex(&new_root)
        );

        let event = if call.shape().is_batch() {
            LedgerEvent::NewOptimisticStates {
                user: self.sender,
                last_time: now,
            }
        } else {
            LedgerEvent::NewOptimisticState {
                user: self.sender,
                last_time: now,
            }
        };
        Ok(state.record(self.sender, input, vec![event]))
    }

    async fn lock_user(&self, suspect: Address) -> LedgerResult<Receipt> {
        let required_bond = self.chain.params.required_bond;
        let mut state = self.chain.state.lock().await;
        if suspect == self.sender {
            return Err(revert("cannot lock yourself"));
        }
        state.ensure_bonded(&self.sender, required_bond)?;
        if state.account(&suspect)?.last_time == 0 {
            return Err(revert("suspect is not optimistic"));
        }
        if state.is_locked(&suspect) || state.is_locked(&self.sender) {
            return Err(revert("already locked"));
        }
        let timestamp = state.now;
        state.locks.insert(
            suspect,
            Lock {
                locker: self.sender,
                timestamp,
            },
        );

        let mut input = selector("lock_user(address)").to_vec();
        input.extend_from_slice(&suspect);
        Ok(state.record(
            self.sender,
            input,
            vec![LedgerEvent::Locked {
                suspect,
                locker: self.sender,
            }],
        ))
    }

    async fn unlock(&self, suspect: Address, current_state: Hash, root: Hash, last_time: u64) -> LedgerResult<Receipt> {
        let lock_time = self.chain.params.lock_time;
        let mut state = self.chain.state.lock().await;
        let lock = *state
            .locks
            .get(&suspect)
            .ok_or_else(|| revert("suspect is not locked"))?;
        if state.now < lock.timestamp + lock_time {
            return Err(revert("dispute window has not elapsed"));
        }
        if state.account(&suspect)?.hash != commitment(&root, &current_state, last_time) {
            return Err(revert("commitment mismatch"));
        }
        state.locks.remove(&suspect);

        let mut input = selector("unlock(address,bytes32,bytes32,uint256)").to_vec();
        input.extend_from_slice(&suspect);
        Ok(state.record(self.sender, input, vec![LedgerEvent::Unlocked { suspect }]))
    }

    async fn prove_fraud(
        &self,
        suspect: Address,
        call_data: Vec<Vec<u8>>,
        current_state: Hash,
        root: Hash,
        proof: MultiProof,
        last_time: u64,
    ) -> LedgerResult<Receipt> {
        if call_data.is_empty() || call_data.len() > 2 || proof.indices.len() != call_data.len() {
            return Err(revert("fraud proof must reveal one or two elements"));
        }
        if call_data.len() == 2 && proof.indices[1] != proof.indices[0] + 1 {
            return Err(revert("revealed elements are not consecutive"));
        }
        // A transition the logic refuses to run counts against the suspect
        let executed = self.chain.logic.execute(&call_data[0]).await;
        let lock_time = self.chain.params.lock_time;

        let mut state = self.chain.state.lock().await;
        let lock = *state
            .locks
            .get(&suspect)
            .ok_or_else(|| revert("suspect is not locked"))?;
        if lock.locker != self.sender {
            return Err(revert("suspect is locked by another accuser"));
        }
        if state.now >= lock.timestamp + lock_time {
            return Err(revert("dispute window has elapsed"));
        }
        if state.account(&suspect)?.hash != commitment(&root, &current_state, last_time) {
            return Err(revert("commitment mismatch"));
        }
        if !proof.verify(&root, &call_data) {
            return Err(revert("invalid membership proof"));
        }

        let fraud_index = proof.indices[0];
        if call_data.len() == 1 && fraud_index + 1 != proof.element_count {
            return Err(revert("a single revealed element must be the last one"));
        }
        // An element that does not decode or run is fraud whatever follows it
        let fraudulent = match (CallData::decode(&call_data[0]), executed) {
            (Ok(call), Ok(next)) => {
                let claimed_next = match call_data.get(1) {
                    Some(successor) => {
                        CallData::decode(successor)
                            .map_err(|e| revert(e.to_string()))?
                            .current_state
                    }
                    None => current_state,
                };
                call.user != suspect || next != claimed_next
            }
            _ => true,
        };
        if !fraudulent {
            return Err(revert("transition is valid"));
        }

        let suspect_account = state.account_mut(&suspect)?;
        let reward = suspect_account.balance;
        suspect_account.balance = 0;
        suspect_account.rollback_size = Some(fraud_index);
        state.account_mut(&self.sender)?.balance += reward;
        state.locks.remove(&suspect);

        let mut input = selector("prove_fraud(address,bytes[],bytes32,bytes32,bytes32[],uint256)").to_vec();
        input.extend_from_slice(&suspect);
        Ok(state.record(
            self.sender,
            input,
            vec![LedgerEvent::FraudProven {
                suspect,
                accuser: self.sender,
                rollback_size: fraud_index,
            }],
        ))
    }

    async fn rollback(&self, request: RollbackRequest) -> LedgerResult<Receipt> {
        let RollbackRequest {
            user,
            proof,
            root,
            state: current_state,
            last_time,
        } = request;

        let mut state = self.chain.state.lock().await;
        let now = state.now;
        let account = state.account_mut(&user)?;
        let target = account
            .rollback_size
            .ok_or_else(|| revert("no rollback required"))?;
        if account.hash != commitment(&root, &current_state, last_time) {
            return Err(revert("commitment mismatch"));
        }
        if proof.discarded.is_empty() {
            return Err(revert("nothing to discard"));
        }
        if proof.size_proof.element_count != proof.current_size || !proof.size_proof.verify(&root) {
            return Err(revert("invalid size proof"));
        }
        let kept = proof
            .current_size
            .checked_sub(proof.discarded.len() as u64)
            .ok_or_else(|| revert("discarding more elements than the history holds"))?;
        if kept < target {
            return Err(revert("rollback past the fraudulent index"));
        }
        if proof.append_proof.element_count != kept || proof.append_proof.root() != proof.old_root {
            return Err(revert("append proof does not start from the kept root"));
        }
        let rebuilt = proof
            .append_proof
            .appended_root(&proof.discarded)
            .map_err(|e| revert(e.to_string()))?;
        if rebuilt != root {
            return Err(revert("kept and discarded elements do not rebuild the current root"));
        }
        let restored = CallData::decode(&proof.discarded[0])
            .map_err(|e| revert(e.to_string()))?
            .current_state;

        account.hash = commitment(&proof.old_root, &restored, now);
        account.last_time = now;
        if kept == target {
            account.rollback_size = None;
        }

        let mut input = selector("rollback(bytes32,bytes[],bytes32[],uint256,bytes32[],bytes32,bytes32,uint256)").to_vec();
        input.extend_from_slice(&user);
        Ok(state.record(self.sender, input, vec![LedgerEvent::RolledBack { user, last_time: now }]))
    }

    async fn balance(&self, user: Address) -> LedgerResult<u128> {
        let state = self.chain.state.lock().await;
        Ok(state.accounts.get(&user).map(|account| account.balance).unwrap_or(0))
    }

    async fn required_bond(&self) -> LedgerResult<u128> {
        Ok(self.chain.params.required_bond)
    }

    async fn lock_time(&self) -> LedgerResult<u64> {
        Ok(self.chain.params.lock_time)
    }

    async fn account_hash(&self, user: Address) -> LedgerResult<Hash> {
        let state = self.chain.state.lock().await;
        state
            .accounts
            .get(&user)
            .map(|account| account.hash)
            .ok_or_else(|| LedgerError::NotFound(format!("account {}", short_hex(&user))))
    }

    async fn locker(&self, user: Address) -> LedgerResult<Option<Address>> {
        let state = self.chain.state.lock().await;
        Ok(state.locks.get(&user).map(|lock| lock.locker))
    }

    async fn lock_timestamp(&self, user: Address) -> LedgerResult<u64> {
        let state = self.chain.state.lock().await;
        Ok(state.locks.get(&user).map(|lock| lock.timestamp).unwrap_or(0))
    }

    async fn rollback_size(&self, user: Address) -> LedgerResult<Option<u64>> {
        let state = self.chain.state.lock().await;
        Ok(state.account(&user)?.rollback_size)
    }

    async fn can_exit(&self, user: Address) -> LedgerResult<bool> {
        let lock_time = self.chain.params.lock_time;
        let state = self.chain.state.lock().await;
        let account = state.account(&user)?;
        Ok(account.last_time != 0 && state.now >= account.last_time + lock_time && !state.is_locked(&user))
    }

    async fn transaction(&self, tx_hash: Hash) -> LedgerResult<ObservedTransaction> {
        let state = self.chain.state.lock().await;
        state
            .transactions
            .get(&tx_hash)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("transaction {}", short_hex(&tx_hash))))
    }
}
