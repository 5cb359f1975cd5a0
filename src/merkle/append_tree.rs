// src/merkle/append_tree.rs
//! Append-only Merkle tree
//!
//! The tree is a Merkle mountain range: a list of perfect subtrees ("peaks")
//! whose heights follow the binary decomposition of the element count. The
//! root binds the element count and the peaks, so appending only needs the
//! current peaks and never the earlier elements.
//!
//! A tree may be *partial*: built from an append proof, it knows the peaks of
//! a hidden prefix (`base_count` elements) and the elements appended after
//! it. Every node on the path of a visible element is either built from
//! visible elements or is one of the hidden prefix's peaks, so partial trees
//! still produce proofs for everything they can see.

use crate::commitment::{keccak256, u64_word, Hash, EMPTY_ROOT};

use super::proofs::{AppendProof, MultiProof, SizeProof};
use super::MerkleError;

/// Hash of a leaf element
pub(crate) fn leaf_hash(element: &[u8]) -> Hash {
    let mut input = Vec::with_capacity(element.len() + 1);
    input.push(0x00);
    input.extend_from_slice(element);
    keccak256(&input)
}

/// Hash two nodes together
pub(crate) fn hash_nodes(left: &Hash, right: &Hash) -> Hash {
    let mut input = Vec::with_capacity(65);
    input.push(0x01);
    input.extend_from_slice(left);
    input.extend_from_slice(right);
    keccak256(&input)
}

/// `(height, first leaf)` of every peak of a tree with `count` elements, highest first
pub(crate) fn peak_layout(count: u64) -> Vec<(u32, u64)> {
    let mut layout = Vec::new();
    let mut start = 0u64;
    for height in (0..64u32).rev() {
        let width = 1u64 << height;
        if count & width != 0 {
            layout.push((height, start));
            start += width;
        }
    }
    layout
}

/// Root of a tree given its element count and peaks
pub(crate) fn root_from_peaks(count: u64, peaks: &[Hash]) -> Hash {
    if count == 0 {
        return EMPTY_ROOT;
    }
    let mut packed = Vec::with_capacity(32 * (peaks.len() + 1));
    packed.extend_from_slice(&u64_word(count));
    for peak in peaks {
        packed.extend_from_slice(peak);
    }
    keccak256(&packed)
}

/// Append-only Merkle tree, full or partial
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendTree {
    /// Number of elements hidden behind `base_peaks`
    base_count: u64,

    /// Peaks of the hidden prefix, highest first
    base_peaks: Vec<Hash>,

    /// Elements known locally, starting at position `base_count`
    elements: Vec<Vec<u8>>,

    /// Current peaks as `(height, hash)`, highest first
    peaks: Vec<(u32, Hash)>,
}

impl AppendTree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a full tree holding `elements`
    pub fn from_elements(elements: Vec<Vec<u8>>) -> Self {
        let mut tree = Self::new();
        tree.extend(elements);
        tree
    }

    /// Rebuild the smallest tree that can re-derive the root after an append.
    ///
    /// `proof` describes the tree before the append and `elements` are the
    /// appended elements, so the result has the same root and size as the
    /// tree that produced the proof after it appended `elements`.
    pub fn from_append_proof(proof: &AppendProof, elements: Vec<Vec<u8>>) -> Result<Self, MerkleError> {
        let layout = peak_layout(proof.element_count);
        if layout.len() != proof.peaks.len() {
            return Err(MerkleError::MalformedProof(format!(
                "{} elements need {} peaks, proof has {}",
                proof.element_count,
                layout.len(),
                proof.peaks.len()
            )));
        }

        let mut tree = Self {
            base_count: proof.element_count,
            base_peaks: proof.peaks.clone(),
            elements: Vec::with_capacity(elements.len()),
            peaks: layout
                .iter()
                .zip(proof.peaks.iter())
                .map(|((height, _), peak)| (*height, *peak))
                .collect(),
        };
        tree.extend(elements);
        Ok(tree)
    }

    /// Number of elements, hidden ones included
    pub fn len(&self) -> u64 {
        self.base_count + self.elements.len() as u64
    }

    /// Check if the tree is empty
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of leading elements this tree cannot reveal
    pub fn base_len(&self) -> u64 {
        self.base_count
    }

    /// Root of the tree
    pub fn root(&self) -> Hash {
        root_from_peaks(self.len(), &self.peaks())
    }

    /// Current peak hashes, highest first
    pub fn peaks(&self) -> Vec<Hash> {
        self.peaks.iter().map(|(_, hash)| *hash).collect()
    }

    /// Element at an absolute position, if visible
    pub fn element(&self, index: u64) -> Option<&[u8]> {
        if index < self.base_count {
            return None;
        }
        self.elements
            .get((index - self.base_count) as usize)
            .map(|element| element.as_slice())
    }

    /// Visible elements from an absolute position to the end
    pub fn elements_from(&self, index: u64) -> Result<&[Vec<u8>], MerkleError> {
        if index < self.base_count {
            return Err(MerkleError::NotVisible(index));
        }
        if index > self.len() {
            return Err(MerkleError::OutOfRange { index, len: self.len() });
        }
        Ok(&self.elements[(index - self.base_count) as usize..])
    }

    /// Append one element
    pub fn append(&mut self, element: Vec<u8>) {
        self.peaks.push((0, leaf_hash(&element)));
        self.elements.push(element);

        // Merge equal-height peaks from the right
        while self.peaks.len() >= 2 {
            let (right_height, right) = self.peaks[self.peaks.len() - 1];
            let (left_height, left) = self.peaks[self.peaks.len() - 2];
            if left_height != right_height {
                break;
            }
            self.peaks.truncate(self.peaks.len() - 2);
            self.peaks.push((left_height + 1, hash_nodes(&left, &right)));
        }
    }

    /// Append several elements in order
    pub fn extend<I: IntoIterator<Item = Vec<u8>>>(&mut self, elements: I) {
        for element in elements {
            self.append(element);
        }
    }

    /// Proof that lets a verifier holding only the root append to this tree
    pub fn append_proof(&self) -> AppendProof {
        AppendProof {
            element_count: self.len(),
            peaks: self.peaks(),
        }
    }

    /// Proof of the current element count
    pub fn size_proof(&self) -> SizeProof {
        SizeProof {
            element_count: self.len(),
            peaks: self.peaks(),
        }
    }

    /// Membership proof for the elements at `indices`.
    ///
    /// Returns the root, the proven elements in request order and the proof.
    pub fn multi_proof(&self, indices: &[u64]) -> Result<(Hash, Vec<Vec<u8>>, MultiProof), MerkleError> {
        if indices.is_empty() {
            return Err(MerkleError::EmptyIndices);
        }

        let layout = peak_layout(self.len());
        let mut elements = Vec::with_capacity(indices.len());
        let mut branches = Vec::with_capacity(indices.len());

        for &index in indices {
            if index >= self.len() {
                return Err(MerkleError::OutOfRange { index, len: self.len() });
            }
            let element = self.element(index).ok_or(MerkleError::NotVisible(index))?;
            let height = layout
                .iter()
                .find(|(height, start)| index >= *start && index < start + (1u64 << height))
                .map(|(height, _)| *height)
                .ok_or(MerkleError::OutOfRange { index, len: self.len() })?;

            let mut branch = Vec::with_capacity(height as usize);
            for level in 0..height {
                let sibling = (index >> level) ^ 1;
                branch.push(self.node(level, sibling).ok_or(MerkleError::NotVisible(index))?);
            }

            elements.push(element.to_vec());
            branches.push(branch);
        }

        let proof = MultiProof {
            element_count: self.len(),
            indices: indices.to_vec(),
            branches,
            peaks: self.peaks(),
        };
        Ok((self.root(), elements, proof))
    }

    /// Tree holding only the first `size` elements.
    ///
    /// Partial trees can only be cut at or after their hidden prefix.
    pub fn truncated(&self, size: u64) -> Result<AppendTree, MerkleError> {
        if size > self.len() {
            return Err(MerkleError::OutOfRange { index: size, len: self.len() });
        }
        if size < self.base_count {
            return Err(MerkleError::NotVisible(size));
        }

        let kept = self.elements[..(size - self.base_count) as usize].to_vec();
        let base = AppendProof {
            element_count: self.base_count,
            peaks: self.base_peaks.clone(),
        };
        AppendTree::from_append_proof(&base, kept)
    }

    /// Hash of the perfect subtree of `height` at position `index` on its level
    fn node(&self, height: u32, index: u64) -> Option<Hash> {
        let width = 1u64 << height;
        let start = index.checked_mul(width)?;
        let end = start.checked_add(width)?;
        if end > self.len() {
            return None;
        }

        if end <= self.base_count {
            // Fully hidden: only available when it is one of the prefix peaks
            return peak_layout(self.base_count)
                .iter()
                .position(|(h, s)| *h == height && *s == start)
                .map(|position| self.base_peaks[position]);
        }

        if height == 0 {
            return self.element(start).map(leaf_hash);
        }

        let left = self.node(height - 1, index * 2)?;
        let right = self.node(height - 1, index * 2 + 1)?;
        Some(hash_nodes(&left, &right))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn elements(range: std::ops::Range<u8>) -> Vec<Vec<u8>> {
        range.map(|i| vec![i; 3]).collect()
    }

    #[test]
    fn test_empty_tree() {
        let tree = AppendTree::new();

        assert_eq!(tree.root(), EMPTY_ROOT, "Empty tree root should be zero");
        assert!(tree.is_empty());
        assert_eq!(tree.len(), 0);
        assert!(tree.peaks().is_empty());
    }

    #[test]
    fn test_peak_layout_follows_binary_size() {
        assert_eq!(peak_layout(0), vec![]);
        assert_eq!(peak_layout(1), vec![(0, 0)]);
        assert_eq!(peak_layout(6), vec![(2, 0), (1, 4)]);
        assert_eq!(peak_layout(7), vec![(2, 0), (1, 4), (0, 6)]);
    }

    #[test]
    fn test_incremental_append_matches_bulk_build() {
        let all = elements(0..11);
        let bulk = AppendTree::from_elements(all.clone());

        let mut incremental = AppendTree::new();
        for element in all {
            incremental.append(element);
        }

        assert_eq!(bulk.root(), incremental.root());
        assert_eq!(bulk.len(), 11);
        assert_eq!(bulk.peaks().len(), 3);
    }

    #[test]
    fn test_root_changes_on_every_append() {
        let mut tree = AppendTree::new();
        let mut seen = vec![tree.root()];
        for element in elements(0..9) {
            tree.append(element);
            let root = tree.root();
            assert!(!seen.contains(&root), "Root repeated after append");
            seen.push(root);
        }
    }

    #[test]
    fn test_partial_tree_reproduces_root() {
        let mut full = AppendTree::from_elements(elements(0..5));
        let proof = full.append_proof();
        let appended = elements(5..9);
        full.extend(appended.clone());

        let partial = AppendTree::from_append_proof(&proof, appended).unwrap();

        assert_eq!(partial.root(), full.root());
        assert_eq!(partial.len(), 9);
        assert_eq!(partial.base_len(), 5);
        assert!(partial.element(4).is_none());
        assert_eq!(partial.element(5), Some(&[5u8, 5, 5][..]));
    }

    #[test]
    fn test_partial_tree_proves_visible_elements() {
        for base in 0..9u8 {
            let mut full = AppendTree::from_elements(elements(0..base));
            let proof = full.append_proof();
            let appended = elements(base..base + 5);
            full.extend(appended.clone());

            let partial = AppendTree::from_append_proof(&proof, appended).unwrap();
            for index in base as u64..partial.len() {
                let (root, proven, multi) = partial.multi_proof(&[index]).unwrap();
                assert_eq!(root, full.root());
                assert!(multi.verify(&root, &proven), "base {} index {}", base, index);
            }
        }
    }

    #[test]
    fn test_partial_tree_cannot_prove_hidden_elements() {
        let full = AppendTree::from_elements(elements(0..4));
        let partial = AppendTree::from_append_proof(&full.append_proof(), elements(4..6)).unwrap();

        assert_eq!(partial.multi_proof(&[1]), Err(MerkleError::NotVisible(1)));
        assert_eq!(partial.truncated(2), Err(MerkleError::NotVisible(2)));
    }

    #[test]
    fn test_truncated_prefix_plus_suffix_reproduces_root() {
        let tree = AppendTree::from_elements(elements(0..10));

        for keep in 0..=10u64 {
            let kept = tree.truncated(keep).unwrap();
            let discarded = tree.elements_from(keep).unwrap().to_vec();

            let rebuilt = kept.append_proof().appended_root(&discarded).unwrap();
            assert_eq!(rebuilt, tree.root(), "keep {}", keep);
        }
    }

    #[test]
    fn test_malformed_append_proof_is_rejected() {
        let proof = AppendProof {
            element_count: 3,
            peaks: vec![[1; 32]],
        };

        assert!(matches!(
            AppendTree::from_append_proof(&proof, vec![]),
            Err(MerkleError::MalformedProof(_))
        ));
    }
}
