// src/proof_adapter.rs
//! Proof adapter
//!
//! Builds the proofs the ledger verifies out of an account history: append
//! proofs for optimistic transitions, the two-element membership proof used
//! to prove fraud, and the append/size proof pair used to roll back.

use log::debug;

use crate::commitment::{short_hex, Hash};
use crate::error_handling::{OriError, OriResult};
use crate::merkle::{AppendProof, AppendTree, MultiProof, SizeProof};

/// Append proof and the tree it leads to
#[derive(Debug, Clone)]
pub struct AppendOutcome {
    /// Proof against the tree before the append
    pub proof: AppendProof,

    /// Tree after the append
    pub tree: AppendTree,
}

/// Membership proof revealing an invalid transition and its successor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FraudPairProof {
    /// Root the proof is against
    pub root: Hash,

    /// Revealed call data, the invalid element first
    pub call_data: Vec<Vec<u8>>,

    /// Membership proof
    pub proof: MultiProof,
}

/// Everything the ledger needs to cut a history back to a prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RollbackProof {
    /// Root of the kept prefix
    pub old_root: Hash,

    /// Elements removed from the history, in order
    pub discarded: Vec<Vec<u8>>,

    /// Proof that appending `discarded` to `old_root` yields the current root
    pub append_proof: AppendProof,

    /// Size of the history before the rollback
    pub current_size: u64,

    /// Proof of `current_size` against the current root
    pub size_proof: SizeProof,
}

/// Extend a history by one element
pub fn append(tree: &AppendTree, element: Vec<u8>) -> AppendTree {
    let mut next = tree.clone();
    next.append(element);
    next
}

/// Extend a history by one element and prove it
pub fn append_proof(tree: &AppendTree, element: Vec<u8>) -> AppendOutcome {
    append_multi(tree, vec![element])
}

/// Extend a history by several elements and prove it
pub fn append_multi(tree: &AppendTree, elements: Vec<Vec<u8>>) -> AppendOutcome {
    let proof = tree.append_proof();
    let mut next = tree.clone();
    next.extend(elements);

    debug!(
        "append proof over {} elements: {} -> {}",
        proof.element_count,
        short_hex(&tree.root()),
        short_hex(&next.root())
    );
    AppendOutcome { proof, tree: next }
}

/// Membership proof over `history[index..index + count]`
pub fn multi_proof(tree: &AppendTree, index: u64, count: u64) -> OriResult<(Hash, Vec<Vec<u8>>, MultiProof)> {
    let indices: Vec<u64> = (index..index.saturating_add(count)).collect();
    Ok(tree.multi_proof(&indices)?)
}

/// Reveal the transition at `fraud_index` and the one after it, when there is one
pub fn fraud_proof(tree: &AppendTree, fraud_index: u64) -> OriResult<FraudPairProof> {
    if fraud_index >= tree.len() {
        return Err(OriError::InvalidArgument(format!(
            "fraud index {} outside history of {} elements",
            fraud_index,
            tree.len()
        )));
    }
    let count = if fraud_index + 1 < tree.len() { 2 } else { 1 };
    let (root, call_data, proof) = multi_proof(tree, fraud_index, count)?;

    debug!(
        "fraud proof over {} element(s) at {} against {}",
        count,
        fraud_index,
        short_hex(&root)
    );
    Ok(FraudPairProof { root, call_data, proof })
}

/// Prove the current element count
pub fn size_proof(tree: &AppendTree) -> (Hash, u64, SizeProof) {
    (tree.root(), tree.len(), tree.size_proof())
}

/// Rebuild a partial history from one observed append
pub fn from_append_proof(proof: &AppendProof, elements: Vec<Vec<u8>>) -> OriResult<AppendTree> {
    Ok(AppendTree::from_append_proof(proof, elements)?)
}

/// Split a history at `keep` and prove that the kept prefix plus the discarded suffix is the current history
pub fn rollback_proof(tree: &AppendTree, keep: u64) -> OriResult<(AppendTree, RollbackProof)> {
    if keep >= tree.len() {
        return Err(OriError::ProtocolGuard(format!(
            "nothing to roll back: history has {} elements, keeping {}",
            tree.len(),
            keep
        )));
    }

    let kept = tree.truncated(keep)?;
    let discarded = tree.elements_from(keep)?.to_vec();
    let outcome = append_multi(&kept, discarded.clone());
    if outcome.tree.root() != tree.root() {
        return Err(OriError::InvalidProof(format!(
            "kept prefix of {} elements does not extend to the current root",
            keep
        )));
    }
    let (_, current_size, size_proof) = size_proof(tree);

    Ok((
        kept.clone(),
        RollbackProof {
            old_root: kept.root(),
            discarded,
            append_proof: outcome.proof,
            current_size,
            size_proof,
        },
    ))
}
