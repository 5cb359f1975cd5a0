// src/fraud_proof_system/rollback.rs
//! Rollback constructor

use log::info;

use crate::codec::CallData;
use crate::commitment::short_hex;
use crate::error_handling::{OriError, OriResult};
use crate::ledger::{Ledger, Receipt, RollbackRequest};
use crate::proof_adapter;
use crate::rollup::Account;

/// Cut `account` back to the size the ledger demands after a proven fraud.
///
/// The account keeps its history prefix and resumes from the state the
/// first discarded transition started from.
pub async fn rollback_account<L: Ledger + ?Sized>(ledger: &L, account: &mut Account) -> OriResult<Receipt> {
    let user = account.user;
    let target = ledger
        .rollback_size(user)
        .await?
        .ok_or_else(|| OriError::ProtocolGuard(format!("no rollback required for {}", short_hex(&user))))?;

    let (kept, proof) = proof_adapter::rollback_proof(&account.history, target)?;
    let restored = match proof.discarded.first() {
        Some(first) => CallData::decode(first)?.current_state,
        None => return Err(OriError::ProtocolGuard("nothing to roll back".to_string())),
    };
    let discarded = proof.discarded.len();

    let request = RollbackRequest {
        user,
        proof,
        root: account.root(),
        state: account.current_state,
        last_time: account.last_time,
    };
    let receipt = ledger.rollback(request).await?;
    let last_time = receipt
        .rollback_time(&user)
        .ok_or_else(|| OriError::Desync("rollback emitted no timestamp".to_string()))?;

    account.history = kept;
    account.current_state = restored;
    account.last_time = last_time;
    account.fraud_index = None;
    info!(
        "rolled {} back to {} transitions, dropping {}",
        short_hex(&user),
        account.history.len(),
        discarded
    );
    Ok(receipt)
}
