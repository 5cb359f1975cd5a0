// src/fraud_proof_system/reconstruction.rs
//! Fraudster views
//!
//! A suspect's account rebuilt from the one transaction that proved it
//! dishonest. Only the appended elements are visible; everything before
//! them is represented by the peaks in the transaction's append proof.

use log::info;

use crate::codec::OptimisticCall;
use crate::commitment::{short_hex, Address};
use crate::error_handling::OriResult;
use crate::proof_adapter;
use crate::rollup::Account;

/// Build the view of `suspect` after `call`, with the invalid transition at `batch_index`
pub fn reconstruct_fraudster(
    suspect: Address,
    batch_index: usize,
    call: &OptimisticCall,
    last_time: u64,
) -> OriResult<Account> {
    let history = proof_adapter::from_append_proof(call.proof(), call.call_data().to_vec())?;
    let fraud_index = history.base_len() + batch_index as u64;

    let mut account = Account::new(suspect, call.new_state());
    account.history = history;
    account.last_time = last_time;
    account.fraud_index = Some(fraud_index);

    info!(
        "reconstructed {} with fraud at {} of {} transitions",
        short_hex(&suspect),
        fraud_index,
        account.history.len()
    );
    Ok(account)
}
