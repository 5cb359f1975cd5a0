// src/commitment.rs
//! Commitment model
//!
//! The ledger stores a single hash per account binding the history root, the
//! current state and the last optimistic timestamp. Everything the client
//! checks against the ledger reduces to this function, so the packing here is
//! byte-exact with the contract: `keccak256(root ‖ state ‖ u256(lastTime))`.

use sha3::{Digest, Keccak256};

/// 32-byte hash (roots, states, commitments)
pub type Hash = [u8; 32];

/// 20-byte account address
pub type Address = [u8; 20];

/// 32-byte argument word of a state-transition call
pub type Word = [u8; 32];

/// Root of a history that holds no transitions
pub const EMPTY_ROOT: Hash = [0; 32];

/// Keccak-256 of arbitrary bytes
pub fn keccak256(data: &[u8]) -> Hash {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Left-pad a `u64` into a big-endian 32-byte word
pub fn u64_word(value: u64) -> Word {
    let mut word = [0u8; 32];
    word[24..].copy_from_slice(&value.to_be_bytes());
    word
}

/// Commitment the ledger holds for an account
pub fn commitment(root: &Hash, state: &Hash, last_time: u64) -> Hash {
    let mut packed = Vec::with_capacity(96);
    packed.extend_from_slice(root);
    packed.extend_from_slice(state);
    packed.extend_from_slice(&u64_word(last_time));
    keccak256(&packed)
}

/// Short hex rendering for log lines
pub fn short_hex(bytes: &[u8]) -> String {
    let encoded = hex::encode(bytes);
    if encoded.len() > 12 {
        format!("0x{}…", &encoded[..12])
    } else {
        format!("0x{}", encoded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keccak_of_empty_input() {
        assert_eq!(
            hex::encode(keccak256(&[])),
            "c5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_commitment_is_order_sensitive() {
        let a = [1u8; 32];
        let b = [2u8; 32];

        assert_ne!(commitment(&a, &b, 0), commitment(&b, &a, 0));
        assert_ne!(commitment(&a, &b, 0), commitment(&a, &b, 1));
    }

    #[test]
    fn test_commitment_packs_time_as_word() {
        let root = [3u8; 32];
        let state = [4u8; 32];

        let mut packed = Vec::new();
        packed.extend_from_slice(&root);
        packed.extend_from_slice(&state);
        packed.extend_from_slice(&[0u8; 24]);
        packed.extend_from_slice(&600u64.to_be_bytes());

        assert_eq!(commitment(&root, &state, 600), keccak256(&packed));
    }
}
