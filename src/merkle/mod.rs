// src/merkle/mod.rs
//! Append-only Merkle primitive
//!
//! Account histories are append-only sequences of encoded transitions. This
//! module provides the tree and the three proof shapes the ledger verifies:
//! append proofs, multi-element membership proofs and size proofs.

mod append_tree;
mod proofs;

pub use append_tree::AppendTree;
pub use proofs::{AppendProof, MultiProof, SizeProof};

use thiserror::Error;

/// Errors raised by the Merkle primitive
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MerkleError {
    /// Position past the end of the tree
    #[error("index {index} out of range for tree of {len} elements")]
    OutOfRange { index: u64, len: u64 },

    /// Position inside the hidden prefix of a partial tree
    #[error("element {0} is not visible in this partial tree")]
    NotVisible(u64),

    /// Proof does not describe any tree
    #[error("malformed proof: {0}")]
    MalformedProof(String),

    /// Multi-proof requested for no positions
    #[error("no indices requested")]
    EmptyIndices,
}
