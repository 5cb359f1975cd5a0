// src/rollup/account.rs
//! Account state
//!
//! One per tracked address: the owner's own account, a mirrored view of
//! another account, or a fraudster view reconstructed from one transaction.

use serde::{Deserialize, Serialize};

use crate::commitment::{commitment, Address, Hash};
use crate::merkle::AppendTree;

/// Whether an account accepts unverified transitions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// lastTime == 0
    Pessimistic,
    /// lastTime != 0
    Optimistic,
}

/// Local view of an account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Account {
    /// Account address
    pub user: Address,

    /// Transitions since the account last left pessimistic mode
    pub history: AppendTree,

    /// Latest state
    pub current_state: Hash,

    /// Time optimism was entered or last extended; 0 when pessimistic
    pub last_time: u64,

    /// Position of the first invalid transition, for accounts known to have committed fraud
    pub fraud_index: Option<u64>,
}

impl Account {
    /// Pessimistic account with an empty history
    pub fn new(user: Address, initial_state: Hash) -> Self {
        Self {
            user,
            history: AppendTree::new(),
            current_state: initial_state,
            last_time: 0,
            fraud_index: None,
        }
    }

    /// Current mode
    pub fn mode(&self) -> Mode {
        if self.last_time == 0 {
            Mode::Pessimistic
        } else {
            Mode::Optimistic
        }
    }

    /// Check if the account is optimistic
    pub fn is_optimistic(&self) -> bool {
        self.mode() == Mode::Optimistic
    }

    /// History root
    pub fn root(&self) -> Hash {
        self.history.root()
    }

    /// Commitment the ledger should hold for this account
    pub fn commitment(&self) -> Hash {
        commitment(&self.history.root(), &self.current_state, self.last_time)
    }

    /// Root and lastTime to build on, when already optimistic
    pub fn continuation(&self) -> Option<(Hash, u64)> {
        if self.is_optimistic() {
            Some((self.history.root(), self.last_time))
        } else {
            None
        }
    }

    /// History a new optimistic transition is appended to
    pub fn append_base(&self) -> AppendTree {
        if self.is_optimistic() {
            self.history.clone()
        } else {
            AppendTree::new()
        }
    }

    /// Back to pessimistic mode with `state`
    pub fn reset_pessimistic(&mut self, state: Hash) {
        self.history = AppendTree::new();
        self.current_state = state;
        self.last_time = 0;
    }

    /// Hex-rendered summary
    pub fn snapshot(&self) -> AccountSnapshot {
        AccountSnapshot {
            user: format!("0x{}", hex::encode(self.user)),
            mode: self.mode(),
            root: format!("0x{}", hex::encode(self.history.root())),
            current_state: format!("0x{}", hex::encode(self.current_state)),
            last_time: self.last_time,
            history_len: self.history.len(),
            visible_from: self.history.base_len(),
            fraud_index: self.fraud_index,
            commitment: format!("0x{}", hex::encode(self.commitment())),
        }
    }
}

/// Serializable summary of an account
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub user: String,
    pub mode: Mode,
    pub root: String,
    pub current_state: String,
    pub last_time: u64,
    pub history_len: u64,
    pub visible_from: u64,
    pub fraud_index: Option<u64>,
    pub commitment: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::EMPTY_ROOT;

    #[test]
    fn test_new_account_is_pessimistic() {
        let account = Account::new([1; 20], [2; 32]);

        assert_eq!(account.mode(), Mode::Pessimistic);
        assert_eq!(account.continuation(), None);
        assert_eq!(account.commitment(), commitment(&EMPTY_ROOT, &[2; 32], 0));
    }

    #[test]
    fn test_optimistic_account_builds_on_its_history() {
        let mut account = Account::new([1; 20], [2; 32]);
        account.history.append(vec![1, 2, 3]);
        account.last_time = 1_000;

        assert!(account.is_optimistic());
        assert_eq!(account.continuation(), Some((account.root(), 1_000)));
        assert_eq!(account.append_base().len(), 1);

        account.reset_pessimistic([3; 32]);
        assert_eq!(account.mode(), Mode::Pessimistic);
        assert!(account.history.is_empty());
    }

    #[test]
    fn test_snapshot_serializes() {
        let account = Account::new([0xab; 20], [0; 32]);
        let json = serde_json::to_value(account.snapshot()).unwrap();

        assert_eq!(json["user"], format!("0x{}", "ab".repeat(20)));
        assert_eq!(json["mode"], "Pessimistic");
        assert_eq!(json["history_len"], 0);
    }
}
