// src/codec/call_data.rs
//! Encoded state-transition calls
//!
//! A history element is the raw call that produced one transition:
//! `selector(4) ‖ borsh(user, current_state, args)`.

use borsh::{BorshDeserialize, BorshSerialize};

use crate::commitment::{keccak256, Address, Hash, Word};
use crate::error_handling::{OriError, OriResult};

/// 4-byte function or entry-point selector
pub type Selector = [u8; 4];

/// Selector of a textual signature
pub fn selector(signature: &str) -> Selector {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

/// A decoded state-transition call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallData {
    /// Function selector
    pub function: Selector,

    /// Acting user
    pub user: Address,

    /// State the call starts from
    pub current_state: Hash,

    /// Call arguments
    pub args: Vec<Word>,
}

impl CallData {
    /// Create a new call
    pub fn new(function: Selector, user: Address, current_state: Hash, args: Vec<Word>) -> Self {
        Self {
            function,
            user,
            current_state,
            args,
        }
    }

    /// Encode into history-element bytes
    pub fn encode(&self) -> OriResult<Vec<u8>> {
        let mut out = self.function.to_vec();
        (self.user, self.current_state, self.args.clone()).serialize(&mut out)?;
        Ok(out)
    }

    /// Decode history-element bytes
    pub fn decode(bytes: &[u8]) -> OriResult<Self> {
        if bytes.len() < 4 {
            return Err(OriError::Decoding(format!(
                "call data of {} bytes has no selector",
                bytes.len()
            )));
        }
        let function = [bytes[0], bytes[1], bytes[2], bytes[3]];
        let (user, current_state, args) = <(Address, Hash, Vec<Word>)>::try_from_slice(&bytes[4..])
            .map_err(|e| OriError::Decoding(format!("call data payload: {}", e)))?;

        Ok(Self {
            function,
            user,
            current_state,
            args,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selector_is_keccak_prefix() {
        // transfer(address,uint256)
        assert_eq!(hex::encode(selector("transfer(address,uint256)")), "a9059cbb");
    }

    #[test]
    fn test_call_data_decodes_what_it_encodes() {
        let call = CallData::new(selector("add(address,bytes32,uint256)"), [7; 20], [9; 32], vec![[1; 32]]);
        let bytes = call.encode().unwrap();

        assert_eq!(&bytes[..4], &call.function);
        assert_eq!(CallData::decode(&bytes).unwrap(), call);
    }

    #[test]
    fn test_truncated_call_data_is_rejected() {
        let call = CallData::new([1, 2, 3, 4], [7; 20], [9; 32], vec![]);
        let bytes = call.encode().unwrap();

        assert!(matches!(CallData::decode(&bytes[..3]), Err(OriError::Decoding(_))));
        assert!(matches!(CallData::decode(&bytes[..30]), Err(OriError::Decoding(_))));
    }
}
