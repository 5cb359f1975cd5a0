// src/error_handling/error_types.rs
//! Error types for the optimistic rollup client
//!
//! Every component reports failures through [`OriError`]. Failures raised by
//! the ledger or its transport are carried as [`LedgerError`] and passed
//! through without modification.

use thiserror::Error;

use crate::merkle::MerkleError;

/// Errors reported by the ledger contract or the transport in front of it
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The contract rejected the call
    #[error("Ledger call reverted: {0}")]
    Reverted(String),

    /// Transport or RPC failure
    #[error("Ledger transport error: {0}")]
    Transport(String),

    /// Requested record does not exist on the ledger
    #[error("Ledger record not found: {0}")]
    NotFound(String),
}

/// Base error type for the client
#[derive(Error, Debug)]
pub enum OriError {
    /// Collaborator failure, passed through unmodified
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Local root/state/lastTime disagree with the ledger or a decoded transaction
    #[error("Desync: {0}")]
    Desync(String),

    /// Mutation of an account the caller does not control
    #[error("Unauthorized operation: {0}")]
    Unauthorized(String),

    /// Local protocol check refused the operation before submission
    #[error("Protocol guard: {0}")]
    ProtocolGuard(String),

    /// Invalid argument
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Malformed call data or transaction input
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// Proof could not be built or does not verify
    #[error("Invalid proof: {0}")]
    InvalidProof(String),

    /// Resource not found
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Configuration could not be read
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl OriError {
    /// Convert to error code
    pub fn to_error_code(&self) -> u32 {
        match self {
            OriError::Ledger(LedgerError::Reverted(_)) => 1000,
            OriError::Ledger(LedgerError::Transport(_)) => 1001,
            OriError::Ledger(LedgerError::NotFound(_)) => 1002,
            OriError::Desync(_) => 1003,
            OriError::Unauthorized(_) => 1004,
            OriError::ProtocolGuard(_) => 1005,
            OriError::InvalidArgument(_) => 1006,
            OriError::Decoding(_) => 1007,
            OriError::InvalidProof(_) => 1008,
            OriError::NotFound(_) => 1009,
            OriError::Configuration(_) => 1010,
        }
    }

    /// Whether local state can no longer be trusted after this error
    pub fn is_fatal(&self) -> bool {
        matches!(self, OriError::Desync(_))
    }
}

impl From<MerkleError> for OriError {
    fn from(e: MerkleError) -> Self {
        OriError::InvalidProof(e.to_string())
    }
}

impl From<std::io::Error> for OriError {
    fn from(e: std::io::Error) -> Self {
        OriError::Decoding(e.to_string())
    }
}

/// Result alias used across the crate
pub type OriResult<T> = Result<T, OriError>;

/// Result alias for ledger collaborator calls
pub type LedgerResult<T> = Result<T, LedgerError>;
