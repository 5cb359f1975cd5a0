// src/codec/transaction.rs
//! Optimistic ledger transactions
//!
//! Four ledger entry points accept optimistic transitions. Each is identified
//! by the 4-byte sighash at the start of the transaction input and decoded
//! once into an [`OptimisticCall`] variant.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::commitment::Hash;
use crate::error_handling::{OriError, OriResult};
use crate::merkle::AppendProof;

use super::call_data::{selector, Selector};

/// Shape of an optimistic ledger transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TxShape {
    /// First optimistic transition of a pessimistic account
    SingleEnter,
    /// Further optimistic transition
    SingleContinue,
    /// Batch entering optimism
    BatchEnter,
    /// Batch continuing optimism
    BatchContinue,
}

impl TxShape {
    /// All shapes
    pub const ALL: [TxShape; 4] = [
        TxShape::SingleEnter,
        TxShape::SingleContinue,
        TxShape::BatchEnter,
        TxShape::BatchContinue,
    ];

    /// Ledger entry-point signature
    pub fn signature(&self) -> &'static str {
        match self {
            TxShape::SingleEnter => "perform_optimistically_and_enter(bytes,bytes32,bytes32[])",
            TxShape::SingleContinue => "perform_optimistically(bytes,bytes32,bytes32,bytes32[],uint256)",
            TxShape::BatchEnter => "perform_many_optimistically_and_enter(bytes[],bytes32,bytes32[])",
            TxShape::BatchContinue => "perform_many_optimistically(bytes[],bytes32,bytes32,bytes32[],uint256)",
        }
    }

    /// Sighash prefix of the transaction input
    pub fn sighash(&self) -> Selector {
        selector(self.signature())
    }

    /// Shape carrying `sighash`, if any
    pub fn from_sighash(sighash: &[u8]) -> Option<TxShape> {
        TxShape::ALL
            .iter()
            .copied()
            .find(|shape| shape.sighash()[..] == *sighash)
    }

    /// Whether the shape carries several transitions
    pub fn is_batch(&self) -> bool {
        matches!(self, TxShape::BatchEnter | TxShape::BatchContinue)
    }

    /// Whether the shape moves a pessimistic account into optimism
    pub fn is_enter(&self) -> bool {
        matches!(self, TxShape::SingleEnter | TxShape::BatchEnter)
    }
}

/// A decoded optimistic transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptimisticCall {
    Enter {
        call_data: Vec<u8>,
        new_state: Hash,
        proof: AppendProof,
    },
    Continue {
        call_data: Vec<u8>,
        new_state: Hash,
        root: Hash,
        proof: AppendProof,
        last_time: u64,
    },
    EnterMany {
        call_data: Vec<Vec<u8>>,
        new_state: Hash,
        proof: AppendProof,
    },
    ContinueMany {
        call_data: Vec<Vec<u8>>,
        new_state: Hash,
        root: Hash,
        proof: AppendProof,
        last_time: u64,
    },
}

impl OptimisticCall {
    /// Single transition; `continuation` carries the current root and lastTime when already optimistic
    pub fn single(call_data: Vec<u8>, new_state: Hash, proof: AppendProof, continuation: Option<(Hash, u64)>) -> Self {
        match continuation {
            None => OptimisticCall::Enter {
                call_data,
                new_state,
                proof,
            },
            Some((root, last_time)) => OptimisticCall::Continue {
                call_data,
                new_state,
                root,
                proof,
                last_time,
            },
        }
    }

    /// Batch of transitions; `continuation` as for [`OptimisticCall::single`]
    pub fn batch(
        call_data: Vec<Vec<u8>>,
        new_state: Hash,
        proof: AppendProof,
        continuation: Option<(Hash, u64)>,
    ) -> Self {
        match continuation {
            None => OptimisticCall::EnterMany {
                call_data,
                new_state,
                proof,
            },
            Some((root, last_time)) => OptimisticCall::ContinueMany {
                call_data,
                new_state,
                root,
                proof,
                last_time,
            },
        }
    }

    /// Transaction shape
    pub fn shape(&self) -> TxShape {
        match self {
            OptimisticCall::Enter { .. } => TxShape::SingleEnter,
            OptimisticCall::Continue { .. } => TxShape::SingleContinue,
            OptimisticCall::EnterMany { .. } => TxShape::BatchEnter,
            OptimisticCall::ContinueMany { .. } => TxShape::BatchContinue,
        }
    }

    /// Call data of every carried transition, in order
    pub fn call_data(&self) -> &[Vec<u8>] {
        match self {
            OptimisticCall::Enter { call_data, .. } | OptimisticCall::Continue { call_data, .. } => {
                std::slice::from_ref(call_data)
            }
            OptimisticCall::EnterMany { call_data, .. } | OptimisticCall::ContinueMany { call_data, .. } => {
                call_data
            }
        }
    }

    /// State asserted after the last transition
    pub fn new_state(&self) -> Hash {
        match self {
            OptimisticCall::Enter { new_state, .. }
            | OptimisticCall::Continue { new_state, .. }
            | OptimisticCall::EnterMany { new_state, .. }
            | OptimisticCall::ContinueMany { new_state, .. } => *new_state,
        }
    }

    /// Append proof against the history before this transaction
    pub fn proof(&self) -> &AppendProof {
        match self {
            OptimisticCall::Enter { proof, .. }
            | OptimisticCall::Continue { proof, .. }
            | OptimisticCall::EnterMany { proof, .. }
            | OptimisticCall::ContinueMany { proof, .. } => proof,
        }
    }

    /// History root the transaction builds on, for continuation shapes
    pub fn root(&self) -> Option<Hash> {
        match self {
            OptimisticCall::Continue { root, .. } | OptimisticCall::ContinueMany { root, .. } => Some(*root),
            _ => None,
        }
    }

    /// lastTime the transaction builds on, for continuation shapes
    pub fn last_time(&self) -> Option<u64> {
        match self {
            OptimisticCall::Continue { last_time, .. } | OptimisticCall::ContinueMany { last_time, .. } => {
                Some(*last_time)
            }
            _ => None,
        }
    }

    /// Encode into transaction input bytes
    pub fn encode(&self) -> OriResult<Vec<u8>> {
        let mut out = self.shape().sighash().to_vec();
        match self {
            OptimisticCall::Enter {
                call_data,
                new_state,
                proof,
            } => (call_data, new_state, proof).serialize(&mut out)?,
            OptimisticCall::Continue {
                call_data,
                new_state,
                root,
                proof,
                last_time,
            } => (call_data, new_state, root, proof, last_time).serialize(&mut out)?,
            OptimisticCall::EnterMany {
                call_data,
                new_state,
                proof,
            } => (call_data, new_state, proof).serialize(&mut out)?,
            OptimisticCall::ContinueMany {
                call_data,
                new_state,
                root,
                proof,
                last_time,
            } => (call_data, new_state, root, proof, last_time).serialize(&mut out)?,
        }
        Ok(out)
    }

    /// Decode transaction input bytes
    pub fn decode(input: &[u8]) -> OriResult<Self> {
        if input.len() < 4 {
            return Err(OriError::Decoding(format!("input of {} bytes has no sighash", input.len())));
        }
        let shape = TxShape::from_sighash(&input[..4]).ok_or_else(|| {
            OriError::Decoding(format!("sighash 0x{} is not an optimistic call", hex::encode(&input[..4])))
        })?;
        let payload = &input[4..];
        let malformed = |e: std::io::Error| OriError::Decoding(format!("{:?} payload: {}", shape, e));

        let call = match shape {
            TxShape::SingleEnter => {
                let (call_data, new_state, proof) =
                    <(Vec<u8>, Hash, AppendProof)>::try_from_slice(payload).map_err(malformed)?;
                OptimisticCall::Enter {
                    call_data,
                    new_state,
                    proof,
                }
            }
            TxShape::SingleContinue => {
                let (call_data, new_state, root, proof, last_time) =
                    <(Vec<u8>, Hash, Hash, AppendProof, u64)>::try_from_slice(payload).map_err(malformed)?;
                OptimisticCall::Continue {
                    call_data,
                    new_state,
                    root,
                    proof,
                    last_time,
                }
            }
            TxShape::BatchEnter => {
                let (call_data, new_state, proof) =
                    <(Vec<Vec<u8>>, Hash, AppendProof)>::try_from_slice(payload).map_err(malformed)?;
                OptimisticCall::EnterMany {
                    call_data,
                    new_state,
                    proof,
                }
            }
            TxShape::BatchContinue => {
                let (call_data, new_state, root, proof, last_time) =
                    <(Vec<Vec<u8>>, Hash, Hash, AppendProof, u64)>::try_from_slice(payload).map_err(malformed)?;
                OptimisticCall::ContinueMany {
                    call_data,
                    new_state,
                    root,
                    proof,
                    last_time,
                }
            }
        };
        Ok(call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shapes_have_distinct_sighashes() {
        for a in TxShape::ALL {
            for b in TxShape::ALL {
                if a != b {
                    assert_ne!(a.sighash(), b.sighash());
                }
            }
            assert_eq!(TxShape::from_sighash(&a.sighash()), Some(a));
        }
    }

    #[test]
    fn test_decode_dispatches_on_sighash() {
        let proof = AppendProof {
            element_count: 1,
            peaks: vec![[4; 32]],
        };
        let call = OptimisticCall::batch(vec![vec![1, 2], vec![3]], [9; 32], proof, Some(([8; 32], 1_000)));
        let decoded = OptimisticCall::decode(&call.encode().unwrap()).unwrap();

        assert_eq!(decoded.shape(), TxShape::BatchContinue);
        assert_eq!(decoded.call_data(), &[vec![1, 2], vec![3]][..]);
        assert_eq!(decoded.root(), Some([8; 32]));
        assert_eq!(decoded.last_time(), Some(1_000));
        assert_eq!(decoded, call);
    }

    #[test]
    fn test_single_enter_has_no_continuation_fields() {
        let call = OptimisticCall::single(vec![1], [2; 32], AppendProof::default(), None);

        assert_eq!(call.shape(), TxShape::SingleEnter);
        assert!(call.shape().is_enter());
        assert!(!call.shape().is_batch());
        assert_eq!(call.root(), None);
        assert_eq!(call.last_time(), None);
        assert_eq!(call.call_data().len(), 1);
    }

    #[test]
    fn test_unknown_sighash_is_rejected() {
        let result = OptimisticCall::decode(&[0xde, 0xad, 0xbe, 0xef, 0x00]);
        assert!(matches!(result, Err(OriError::Decoding(_))));
    }
}
