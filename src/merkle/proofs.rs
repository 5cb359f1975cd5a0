// src/merkle/proofs.rs
//! Proof shapes of the append-only Merkle tree
//!
//! All three proofs are checked against a root alone, which is all the ledger
//! keeps for an account history.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::commitment::Hash;

use super::append_tree::{hash_nodes, leaf_hash, peak_layout, root_from_peaks, AppendTree};
use super::MerkleError;

/// Peaks of a tree before an append
#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct AppendProof {
    /// Element count before the append
    pub element_count: u64,

    /// Peaks before the append, highest first
    pub peaks: Vec<Hash>,
}

impl AppendProof {
    /// Root of the tree the proof starts from
    pub fn root(&self) -> Hash {
        root_from_peaks(self.element_count, &self.peaks)
    }

    /// Root after appending `elements`
    pub fn appended_root(&self, elements: &[Vec<u8>]) -> Result<Hash, MerkleError> {
        Ok(AppendTree::from_append_proof(self, elements.to_vec())?.root())
    }
}

/// Proof of a tree's element count
#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct SizeProof {
    /// Claimed element count
    pub element_count: u64,

    /// Peaks of the tree, highest first
    pub peaks: Vec<Hash>,
}

impl SizeProof {
    /// Check that a tree with `root` holds exactly `element_count` elements
    pub fn verify(&self, root: &Hash) -> bool {
        self.peaks.len() == self.element_count.count_ones() as usize
            && root_from_peaks(self.element_count, &self.peaks) == *root
    }
}

/// Membership proof for a set of positions
#[derive(Debug, Clone, Default, PartialEq, Eq, BorshSerialize, BorshDeserialize)]
pub struct MultiProof {
    /// Element count of the tree
    pub element_count: u64,

    /// Proven positions
    pub indices: Vec<u64>,

    /// Sibling path from each proven leaf up to its peak
    pub branches: Vec<Vec<Hash>>,

    /// Peaks of the tree, highest first
    pub peaks: Vec<Hash>,
}

impl MultiProof {
    /// Check that `elements` sit at `indices` in the tree with `root`
    pub fn verify(&self, root: &Hash, elements: &[Vec<u8>]) -> bool {
        if elements.len() != self.indices.len() || self.branches.len() != self.indices.len() {
            return false;
        }
        if self.peaks.len() != self.element_count.count_ones() as usize
            || root_from_peaks(self.element_count, &self.peaks) != *root
        {
            return false;
        }

        let layout = peak_layout(self.element_count);
        for ((index, branch), element) in self.indices.iter().zip(&self.branches).zip(elements) {
            let position = layout
                .iter()
                .position(|(height, start)| *index >= *start && *index < start + (1u64 << height));
            let position = match position {
                Some(position) => position,
                None => return false,
            };
            if branch.len() != layout[position].0 as usize {
                return false;
            }

            let mut current = leaf_hash(element);
            for (level, sibling) in branch.iter().enumerate() {
                current = if (index >> level) & 1 == 0 {
                    hash_nodes(&current, sibling)
                } else {
                    hash_nodes(sibling, &current)
                };
            }
            if current != self.peaks[position] {
                return false;
            }
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_of(n: u8) -> AppendTree {
        AppendTree::from_elements((0..n).map(|i| vec![i, i.wrapping_mul(7)]).collect())
    }

    #[test]
    fn test_size_proof_after_append() {
        let mut tree = tree_of(6);
        let before = tree.len();
        tree.append(b"x".to_vec());

        let proof = tree.size_proof();
        assert_eq!(proof.element_count, before + 1);
        assert!(proof.verify(&tree.root()));
    }

    #[test]
    fn test_size_proof_rejects_wrong_count() {
        let tree = tree_of(6);
        let mut proof = tree.size_proof();
        proof.element_count = 5;

        assert!(!proof.verify(&tree.root()));
    }

    #[test]
    fn test_multi_proof_pair() {
        let tree = tree_of(7);
        let (root, elements, proof) = tree.multi_proof(&[3, 4]).unwrap();

        assert_eq!(elements, vec![vec![3, 21], vec![4, 28]]);
        assert!(proof.verify(&root, &elements));

        // Swapped elements no longer match their positions
        let swapped = vec![elements[1].clone(), elements[0].clone()];
        assert!(!proof.verify(&root, &swapped));
    }

    #[test]
    fn test_multi_proof_rejects_other_root() {
        let tree = tree_of(4);
        let (_, elements, proof) = tree.multi_proof(&[0]).unwrap();

        assert!(!proof.verify(&tree_of(5).root(), &elements));
    }

    #[test]
    fn test_append_proof_round_trip_through_borsh() {
        let proof = tree_of(5).append_proof();
        let bytes = proof.try_to_vec().unwrap();

        assert_eq!(AppendProof::try_from_slice(&bytes).unwrap(), proof);
    }
}
