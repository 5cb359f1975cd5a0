// src/rollup/engine.rs
//! Transition execution engine
//!
//! Drives the owner's account through pessimistic, optimistic and batched
//! optimistic transitions. Local state only advances after the ledger has
//! accepted a submission, so every call either fully applies or leaves the
//! account untouched.

use std::sync::Arc;

use log::{debug, error, info};

use crate::codec::{FunctionRegistry, OptimisticCall};
use crate::commitment::{short_hex, Address, Hash, Word};
use crate::config::ClientConfig;
use crate::error_handling::{OriError, OriResult};
use crate::fraud_proof_system::rollback_account;
use crate::ledger::{Ledger, Receipt};
use crate::proof_adapter;

use super::account::Account;

/// How a call is carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallMode {
    /// Verified synchronously by the ledger
    Pessimistic,
    /// Submitted now, trusting `new_state`
    Optimistic { new_state: Hash },
    /// Held in the pending queue, trusting `new_state`
    Queued { new_state: Hash },
}

/// A transition waiting in the pending queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedTransition {
    /// Function name
    pub function: String,

    /// Argument words
    pub args: Vec<Word>,

    /// State the caller expects after this transition
    pub new_state: Hash,
}

/// Owner-side engine for one account
pub struct TransitionEngine<L: Ledger> {
    /// Ledger connection, signing as the owner
    ledger: Arc<L>,

    /// State-transition functions
    registry: Arc<FunctionRegistry>,

    /// Client configuration
    config: ClientConfig,

    /// Canonical account state
    account: Account,

    /// Pending queue
    queue: Vec<QueuedTransition>,
}

impl<L: Ledger> TransitionEngine<L> {
    /// Create an engine for `user`, starting pessimistic at `initial_state`
    pub fn new(
        ledger: Arc<L>,
        registry: Arc<FunctionRegistry>,
        config: ClientConfig,
        user: Address,
        initial_state: Hash,
    ) -> Self {
        Self::from_account(ledger, registry, config, Account::new(user, initial_state))
    }

    /// Create an engine over an existing account view
    pub fn from_account(ledger: Arc<L>, registry: Arc<FunctionRegistry>, config: ClientConfig, account: Account) -> Self {
        Self {
            ledger,
            registry,
            config,
            account,
            queue: Vec::new(),
        }
    }

    /// Current account state
    pub fn account(&self) -> &Account {
        &self.account
    }

    /// Transitions waiting in the queue
    pub fn pending(&self) -> &[QueuedTransition] {
        &self.queue
    }

    /// Give up the engine, keeping the account
    pub fn into_account(self) -> Account {
        self.account
    }

    /// Only the owner may mutate the account
    fn ensure_owner(&self) -> OriResult<()> {
        let sender = self.ledger.sender();
        if sender != self.account.user {
            return Err(OriError::Unauthorized(format!(
                "{} cannot mutate the account of {}",
                short_hex(&sender),
                short_hex(&self.account.user)
            )));
        }
        Ok(())
    }

    /// Local commitment must equal the ledger's before building on it
    async fn ensure_synced(&self) -> OriResult<()> {
        if !self.config.check_sync {
            return Ok(());
        }
        let committed = self.ledger.account_hash(self.account.user).await?;
        let local = self.account.commitment();
        if committed != local {
            error!(
                "account {} out of sync: ledger holds {}, local commitment {}",
                short_hex(&self.account.user),
                short_hex(&committed),
                short_hex(&local)
            );
            return Err(OriError::Desync(format!(
                "ledger commitment {} differs from local {}",
                short_hex(&committed),
                short_hex(&local)
            )));
        }
        Ok(())
    }

    /// Create the account on the ledger with `bond` collateral
    pub async fn initialize(&mut self, bond: u128) -> OriResult<Receipt> {
        self.ensure_owner()?;
        let user = self.account.user;
        let receipt = self.ledger.initialize(bond).await?;
        let state = receipt
            .new_state(&user)
            .ok_or_else(|| OriError::Desync("initialize emitted no new state".to_string()))?;

        self.account = Account::new(user, state);
        info!("initialized {} at state {}", short_hex(&user), short_hex(&state));
        Ok(receipt)
    }

    /// Top up the bond to the required amount
    pub async fn bond(&self) -> OriResult<Receipt> {
        let user = self.account.user;
        let balance = self.ledger.balance(user).await?;
        let required = self.ledger.required_bond().await?;
        if balance >= required {
            return Err(OriError::ProtocolGuard(format!(
                "bond not required: balance {} covers {}",
                balance, required
            )));
        }

        info!("bonding {} for {}", required - balance, short_hex(&user));
        Ok(self.ledger.bond(user, required - balance).await?)
    }

    /// Run `function` in the given mode.
    ///
    /// Queued calls return `None`; they are submitted by [`TransitionEngine::send_queue`].
    pub async fn call(&mut self, function: &str, args: Vec<Word>, mode: CallMode) -> OriResult<Option<Receipt>> {
        match mode {
            CallMode::Pessimistic => self.call_pessimistic(function, args).await.map(Some),
            CallMode::Optimistic { new_state } => self.call_optimistic(function, args, new_state).await.map(Some),
            CallMode::Queued { new_state } => {
                self.queue(function, args, new_state)?;
                Ok(None)
            }
        }
    }

    /// Transition verified by the ledger; leaves optimism when the dispute window allows it
    pub async fn call_pessimistic(&mut self, function: &str, args: Vec<Word>) -> OriResult<Receipt> {
        self.ensure_owner()?;
        let user = self.account.user;
        let call_data = self
            .registry
            .encode_call(function, user, self.account.current_state, &args)?;

        let receipt = match self.account.continuation() {
            Some((root, last_time)) => {
                if !self.ledger.can_exit(user).await? {
                    return Err(OriError::ProtocolGuard(
                        "cannot leave optimism before the dispute window elapses".to_string(),
                    ));
                }
                self.ensure_synced().await?;
                self.ledger.perform_and_exit(call_data, root, last_time).await?
            }
            None => {
                self.ensure_synced().await?;
                self.ledger.perform(call_data).await?
            }
        };

        let state = receipt
            .new_state(&user)
            .ok_or_else(|| OriError::Desync(format!("{} emitted no new state", function)))?;
        self.account.reset_pessimistic(state);
        info!("{} performed {} pessimistically -> {}", short_hex(&user), function, short_hex(&state));
        Ok(receipt)
    }

    /// Single optimistic transition, entering optimism if needed
    pub async fn call_optimistic(&mut self, function: &str, args: Vec<Word>, new_state: Hash) -> OriResult<Receipt> {
        self.ensure_owner()?;
        let user = self.account.user;
        let call_data = self
            .registry
            .encode_call(function, user, self.account.current_state, &args)?;
        let outcome = proof_adapter::append_proof(&self.account.append_base(), call_data.clone());

        self.ensure_synced().await?;
        let call = OptimisticCall::single(call_data, new_state, outcome.proof, self.account.continuation());
        let receipt = self.ledger.perform_optimistic(call).await?;
        let last_time = receipt
            .optimistic_time(&user)
            .ok_or_else(|| OriError::Desync(format!("{} emitted no optimistic state", function)))?;

        self.account.history = outcome.tree;
        self.account.current_state = new_state;
        self.account.last_time = last_time;
        info!(
            "{} performed {} optimistically -> {} ({} transitions)",
            short_hex(&user),
            function,
            short_hex(&new_state),
            self.account.history.len()
        );
        Ok(receipt)
    }

    /// Submit `calls` as one batch, each chained on the previous expected state
    pub async fn call_many(&mut self, calls: &[QueuedTransition]) -> OriResult<Receipt> {
        self.ensure_owner()?;
        if calls.is_empty() {
            return Err(OriError::ProtocolGuard("cannot submit an empty batch".to_string()));
        }
        let user = self.account.user;

        let mut state = self.account.current_state;
        let mut elements = Vec::with_capacity(calls.len());
        for call in calls {
            elements.push(self.registry.encode_call(&call.function, user, state, &call.args)?);
            state = call.new_state;
        }
        let outcome = proof_adapter::append_multi(&self.account.append_base(), elements.clone());

        self.ensure_synced().await?;
        let call = OptimisticCall::batch(elements, state, outcome.proof, self.account.continuation());
        let receipt = self.ledger.perform_optimistic(call).await?;
        let last_time = receipt
            .optimistic_time(&user)
            .ok_or_else(|| OriError::Desync("batch emitted no optimistic state".to_string()))?;

        self.account.history = outcome.tree;
        self.account.current_state = state;
        self.account.last_time = last_time;
        info!(
            "{} performed {} transitions optimistically -> {}",
            short_hex(&user),
            calls.len(),
            short_hex(&state)
        );
        Ok(receipt)
    }

    /// Hold a transition for the next batch
    pub fn queue(&mut self, function: &str, args: Vec<Word>, new_state: Hash) -> OriResult<()> {
        self.ensure_owner()?;
        self.registry.check_args(function, &args)?;
        self.queue.push(QueuedTransition {
            function: function.to_string(),
            args,
            new_state,
        });
        debug!("queued {} ({} pending)", function, self.queue.len());
        Ok(())
    }

    /// Submit the whole queue as one batch; the queue is kept if the submission fails
    pub async fn send_queue(&mut self) -> OriResult<Receipt> {
        let pending = self.queue.clone();
        let receipt = self.call_many(&pending).await?;
        self.queue.clear();
        Ok(receipt)
    }

    /// Drop every queued transition
    pub fn clear_queue(&mut self) {
        self.queue.clear();
    }

    /// Roll the account back after fraud was proven against it
    pub async fn rollback(&mut self) -> OriResult<Receipt> {
        self.ensure_owner()?;
        self.ensure_synced().await?;
        rollback_account(self.ledger.as_ref(), &mut self.account).await
    }
}
