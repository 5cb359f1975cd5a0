// src/fraud_proof_system/detection.rs
//! Fraud detection
//!
//! Every transition of an observed optimistic transaction is re-checked
//! against the state the next transition starts from (or, for the last one,
//! the asserted new state). Anything that cannot be verified counts as
//! invalid, and an element that does not decode is blamed on itself.

use log::{debug, error, warn};

use crate::codec::{CallData, OptimisticCall};
use crate::commitment::{short_hex, Address, Hash};
use crate::error_handling::{OriError, OriResult};
use crate::ledger::TransitionLogic;
use crate::rollup::Account;

use super::verifiers::VerifierSet;

/// Outcome of checking one transaction against a suspect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectionReport {
    /// Every transition checked out
    pub valid: bool,

    /// Account the transaction was checked against
    pub user: Address,
}

/// Position in the batch of the first invalid transition, if any
pub async fn first_invalid(
    logic: &dyn TransitionLogic,
    verifiers: &VerifierSet,
    suspect: &Address,
    call: &OptimisticCall,
) -> Option<usize> {
    let elements = call.call_data();
    let decoded: Vec<OriResult<CallData>> = elements.iter().map(|raw| CallData::decode(raw)).collect();

    for (index, raw) in elements.iter().enumerate() {
        // An undecodable successor carries no claim for this transition;
        // the successor is judged on its own decode at the next step.
        let expected = match decoded.get(index + 1) {
            None => Some(call.new_state()),
            Some(Ok(next)) => Some(next.current_state),
            Some(Err(_)) => None,
        };
        let checked = match &decoded[index] {
            Ok(transition) => check_transition(logic, verifiers, suspect, transition, raw, expected).await,
            Err(e) => Err(e.to_string()),
        };
        let valid = checked.unwrap_or_else(|reason| {
            warn!(
                "could not verify transition {} of {}: {}; treating it as invalid",
                index,
                short_hex(suspect),
                reason
            );
            false
        });
        if !valid {
            warn!(
                "transition {} of {} by {} is invalid",
                index,
                elements.len(),
                short_hex(suspect)
            );
            return Some(index);
        }
    }
    None
}

/// Whether one transition leads to `expected`; `Err` when it cannot be run.
/// Without an expected state the transition only has to run.
async fn check_transition(
    logic: &dyn TransitionLogic,
    verifiers: &VerifierSet,
    suspect: &Address,
    transition: &CallData,
    raw: &[u8],
    expected: Option<Hash>,
) -> Result<bool, String> {
    if transition.user != *suspect {
        debug!(
            "transition acts for {}, not {}",
            short_hex(&transition.user),
            short_hex(suspect)
        );
        return Ok(false);
    }

    let next = match verifiers.verify(transition) {
        Some(local) => local?,
        None => logic.execute(raw).await.map_err(|e| e.to_string())?,
    };
    Ok(expected.map_or(true, |expected| next == expected))
}

fn desync(user: &Address, message: String) -> OriResult<()> {
    error!("mirror of {} out of sync: {}", short_hex(user), message);
    Err(OriError::Desync(message))
}

/// Apply an already accepted optimistic transaction to a mirrored account.
///
/// The transaction must build on exactly what the mirror holds; any mismatch
/// is a desync and leaves the mirror untouched.
pub fn apply_observed(account: &mut Account, call: &OptimisticCall, last_time: u64) -> OriResult<()> {
    match (call.root(), call.last_time()) {
        (Some(root), Some(observed_time)) => {
            if !account.is_optimistic() {
                return desync(&account.user, "continuation observed for a pessimistic account".to_string());
            }
            if observed_time != account.last_time {
                return desync(
                    &account.user,
                    format!("lastTime {} observed, {} known", observed_time, account.last_time),
                );
            }
            if root != account.root() {
                return desync(
                    &account.user,
                    format!("root {} observed, {} known", short_hex(&root), short_hex(&account.root())),
                );
            }
        }
        _ => {
            if account.is_optimistic() {
                return desync(&account.user, "entering transaction observed for an optimistic account".to_string());
            }
        }
    }

    let first = match call.call_data().first() {
        Some(raw) => CallData::decode(raw)?,
        None => return Err(OriError::Decoding("optimistic transaction without call data".to_string())),
    };
    if first.current_state != account.current_state {
        return desync(
            &account.user,
            format!(
                "call starts from {}, known state is {}",
                short_hex(&first.current_state),
                short_hex(&account.current_state)
            ),
        );
    }

    let mut history = account.append_base();
    if call.proof().root() != history.root() {
        return desync(&account.user, "append proof does not start from the known root".to_string());
    }
    history.extend(call.call_data().iter().cloned());

    account.history = history;
    account.current_state = call.new_state();
    account.last_time = last_time;
    debug!(
        "mirror of {} now holds {} transitions",
        short_hex(&account.user),
        account.history.len()
    );
    Ok(())
}
