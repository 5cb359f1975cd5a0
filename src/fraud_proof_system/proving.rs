// src/fraud_proof_system/proving.rs
//! Fraud proof submission

use log::{error, info};

use crate::commitment::short_hex;
use crate::error_handling::{OriError, OriResult};
use crate::ledger::{Ledger, Receipt};
use crate::proof_adapter;
use crate::rollup::Account;

/// Submit a fraud proof against `account` at its recorded fraud index.
///
/// With `lock_first` the suspect is locked beforehand unless the sender
/// already holds the lock. With `check_sync` the view must match the
/// ledger's commitment before anything is submitted.
pub async fn prove_account<L: Ledger + ?Sized>(
    ledger: &L,
    account: &Account,
    lock_first: bool,
    check_sync: bool,
) -> OriResult<Receipt> {
    let suspect = account.user;
    let fraud_index = account
        .fraud_index
        .ok_or_else(|| OriError::ProtocolGuard(format!("no fraud recorded against {}", short_hex(&suspect))))?;
    let pair = proof_adapter::fraud_proof(&account.history, fraud_index)?;

    if check_sync {
        let committed = ledger.account_hash(suspect).await?;
        if committed != account.commitment() {
            error!(
                "view of {} does not match the ledger commitment {}",
                short_hex(&suspect),
                short_hex(&committed)
            );
            return Err(OriError::Desync(format!(
                "ledger moved past the view of {}",
                short_hex(&suspect)
            )));
        }
    }

    if lock_first && ledger.locker(suspect).await? != Some(ledger.sender()) {
        info!("locking {} before proving fraud", short_hex(&suspect));
        ledger.lock_user(suspect).await?;
    }

    let receipt = ledger
        .prove_fraud(
            suspect,
            pair.call_data,
            account.current_state,
            pair.root,
            pair.proof,
            account.last_time,
        )
        .await?;
    info!("proved fraud by {} at transition {}", short_hex(&suspect), fraud_index);
    Ok(receipt)
}
