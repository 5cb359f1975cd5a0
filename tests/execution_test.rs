// tests/execution_test.rs
mod common;

use std::sync::Arc;

use common::*;
use oprollups::codec::CallData;
use oprollups::{CallMode, ClientConfig, Ledger, LedgerError, Mode, OriClient, OriError, TransitionEngine};

#[tokio::test]
async fn test_initialize_then_two_optimistic_calls() {
    let h = setup();
    let mut alice = h.engine(ALICE);

    // Initialize the account
    alice.initialize(BOND).await.unwrap();
    assert_eq!(alice.account().current_state, state(0));
    assert_eq!(alice.account().mode(), Mode::Pessimistic);
    assert_eq!(alice.account().commitment(), h.committed(ALICE).await);

    // First optimistic call enters optimism
    alice
        .call("add", vec![word(5)], CallMode::Optimistic { new_state: state(5) })
        .await
        .unwrap();
    assert_eq!(alice.account().mode(), Mode::Optimistic);
    assert_eq!(alice.account().history.len(), 1);
    assert_eq!(alice.account().last_time, h.chain.now().await);
    assert_eq!(alice.account().commitment(), h.committed(ALICE).await);

    // Second optimistic call continues from the first
    h.chain.advance_time(10).await;
    let first_root = alice.account().root();
    alice
        .call("add", vec![word(2)], CallMode::Optimistic { new_state: state(7) })
        .await
        .unwrap();
    assert_eq!(alice.account().history.len(), 2);
    assert_eq!(alice.account().current_state, state(7));
    assert_eq!(alice.account().last_time, h.chain.now().await);
    assert_ne!(alice.account().root(), first_root);
    assert_eq!(alice.account().commitment(), h.committed(ALICE).await);
}

#[tokio::test]
async fn test_pessimistic_call_uses_ledger_state() {
    let h = setup();
    let mut alice = h.initialized(ALICE).await;

    let receipt = alice
        .call("add", vec![word(3)], CallMode::Pessimistic)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(receipt.new_state(&ALICE), Some(state(3)));
    assert_eq!(alice.account().current_state, state(3));
    assert_eq!(alice.account().last_time, 0);
    assert_eq!(alice.account().commitment(), h.committed(ALICE).await);
}

#[tokio::test]
async fn test_exit_before_window_fails_without_submission() {
    let h = setup();
    let mut alice = h.initialized(ALICE).await;
    alice
        .call_optimistic("add", vec![word(5)], state(5))
        .await
        .unwrap();

    let before = alice.account().clone();
    let submitted = h.chain.transaction_count().await;

    let result = alice.call_pessimistic("add", vec![word(1)]).await;
    assert!(matches!(result, Err(OriError::ProtocolGuard(_))));
    assert_eq!(h.chain.transaction_count().await, submitted);
    assert_eq!(alice.account(), &before);
}

#[tokio::test]
async fn test_exit_after_window() {
    let h = setup();
    let mut alice = h.initialized(ALICE).await;
    alice
        .call_optimistic("add", vec![word(5)], state(5))
        .await
        .unwrap();

    h.chain.advance_time(600).await;
    alice.call_pessimistic("add", vec![word(1)]).await.unwrap();

    assert_eq!(alice.account().mode(), Mode::Pessimistic);
    assert!(alice.account().history.is_empty());
    assert_eq!(alice.account().current_state, state(6));
    assert_eq!(alice.account().commitment(), h.committed(ALICE).await);
}

#[tokio::test]
async fn test_mutating_another_account_is_unauthorized() {
    let h = setup();
    h.initialized(ALICE).await;

    // Bob's identity driving Alice's account
    let mut intruder = TransitionEngine::new(
        h.ledger(BOB),
        Arc::clone(&h.registry),
        ClientConfig::default(),
        ALICE,
        state(0),
    );
    let submitted = h.chain.transaction_count().await;

    let result = intruder.call_optimistic("add", vec![word(1)], state(1)).await;
    assert!(matches!(result, Err(OriError::Unauthorized(_))));
    let result = intruder.call_pessimistic("add", vec![word(1)]).await;
    assert!(matches!(result, Err(OriError::Unauthorized(_))));
    let result = intruder.queue("add", vec![word(1)], state(1));
    assert!(matches!(result, Err(OriError::Unauthorized(_))));
    assert!(intruder.pending().is_empty());
    assert_eq!(h.chain.transaction_count().await, submitted);
}

#[tokio::test]
async fn test_queue_submits_in_order_and_chains_states() {
    let h = setup();
    let mut alice = h.initialized(ALICE).await;
    let submitted = h.chain.transaction_count().await;

    // Queue three calls
    let queued = alice
        .call("add", vec![word(1)], CallMode::Queued { new_state: state(1) })
        .await
        .unwrap();
    assert!(queued.is_none());
    alice.queue("set", vec![word(9)], state(9)).unwrap();
    alice.queue("add", vec![word(1)], state(10)).unwrap();
    assert_eq!(alice.pending().len(), 3);
    assert_eq!(h.chain.transaction_count().await, submitted);

    // Flush them as one batch
    alice.send_queue().await.unwrap();
    assert!(alice.pending().is_empty());
    assert_eq!(h.chain.transaction_count().await, submitted + 1);

    let account = alice.account();
    assert_eq!(account.history.len(), 3);
    assert_eq!(account.current_state, state(10));
    assert_eq!(account.commitment(), h.committed(ALICE).await);

    let add = h.registry.get("add").unwrap().selector;
    let set = h.registry.get("set").unwrap().selector;
    let calls: Vec<CallData> = (0..3)
        .map(|i| CallData::decode(account.history.element(i).unwrap()).unwrap())
        .collect();
    assert_eq!(calls[0].function, add);
    assert_eq!(calls[0].current_state, state(0));
    assert_eq!(calls[1].function, set);
    assert_eq!(calls[1].current_state, state(1));
    assert_eq!(calls[2].function, add);
    assert_eq!(calls[2].current_state, state(9));
}

#[tokio::test]
async fn test_batch_continues_optimism() {
    let h = setup();
    let mut alice = h.initialized(ALICE).await;
    alice
        .call_optimistic("add", vec![word(2)], state(2))
        .await
        .unwrap();

    h.chain.advance_time(30).await;
    alice.queue("add", vec![word(2)], state(4)).unwrap();
    alice.queue("add", vec![word(2)], state(6)).unwrap();
    let receipt = alice.send_queue().await.unwrap();

    assert_eq!(receipt.optimistic_time(&ALICE), Some(h.chain.now().await));
    assert_eq!(alice.account().history.len(), 3);
    assert_eq!(alice.account().commitment(), h.committed(ALICE).await);
}

#[tokio::test]
async fn test_empty_queue_is_refused() {
    let h = setup();
    let mut alice = h.initialized(ALICE).await;
    let submitted = h.chain.transaction_count().await;

    let result = alice.send_queue().await;
    assert!(matches!(result, Err(OriError::ProtocolGuard(_))));
    assert_eq!(h.chain.transaction_count().await, submitted);
}

#[tokio::test]
async fn test_queue_checks_arguments() {
    let h = setup();
    let mut alice = h.initialized(ALICE).await;

    let result = alice.queue("add", vec![], state(1));
    assert!(matches!(result, Err(OriError::InvalidArgument(_))));
    let result = alice.queue("mul", vec![word(2)], state(1));
    assert!(matches!(result, Err(OriError::InvalidArgument(_))));
    assert!(alice.pending().is_empty());

    alice.queue("add", vec![word(1)], state(1)).unwrap();
    alice.clear_queue();
    assert!(alice.pending().is_empty());
}

#[tokio::test]
async fn test_rejected_batch_keeps_queue() {
    let h = setup();
    let mut alice = h.engine(ALICE);
    alice.initialize(0).await.unwrap();

    alice.queue("add", vec![word(1)], state(1)).unwrap();
    alice.queue("add", vec![word(1)], state(2)).unwrap();
    let before = alice.account().clone();

    // The ledger refuses optimism without a bond
    let result = alice.send_queue().await;
    assert!(matches!(result, Err(OriError::Ledger(LedgerError::Reverted(_)))));
    assert_eq!(alice.pending().len(), 2);
    assert_eq!(alice.account(), &before);

    // Retry once bonded
    alice.bond().await.unwrap();
    assert_eq!(h.ledger(ALICE).balance(ALICE).await.unwrap(), BOND);
    alice.send_queue().await.unwrap();
    assert!(alice.pending().is_empty());
    assert_eq!(alice.account().current_state, state(2));
}

#[tokio::test]
async fn test_bond_tops_up_only_the_difference() {
    let h = setup();
    let mut alice = h.engine(ALICE);
    alice.initialize(40).await.unwrap();

    alice.bond().await.unwrap();
    assert_eq!(h.ledger(ALICE).balance(ALICE).await.unwrap(), BOND);

    let result = alice.bond().await;
    assert!(matches!(result, Err(OriError::ProtocolGuard(_))));
    assert_eq!(h.ledger(ALICE).balance(ALICE).await.unwrap(), BOND);
}

#[tokio::test]
async fn test_stale_engine_detects_desync() {
    let h = setup();
    let mut alice = h.initialized(ALICE).await;
    let mut stale = h.engine(ALICE);

    alice
        .call_optimistic("add", vec![word(1)], state(1))
        .await
        .unwrap();

    let submitted = h.chain.transaction_count().await;
    let error = stale
        .call_optimistic("add", vec![word(1)], state(1))
        .await
        .unwrap_err();
    assert!(matches!(error, OriError::Desync(_)));
    assert!(error.is_fatal());
    assert_eq!(h.chain.transaction_count().await, submitted);
}

#[tokio::test]
async fn test_client_facade() {
    let h = setup();
    let client = OriClient::connect(h.ledger(ALICE), ClientConfig::default(), registry())
        .await
        .unwrap();

    assert_eq!(client.address(), ALICE);
    assert_eq!(client.required_bond(), BOND);
    assert_eq!(client.lock_time().await.unwrap(), 600);
    assert!(client.registry().get("set").is_ok());

    let mut alice = client.account(state(0));
    alice.initialize(client.required_bond()).await.unwrap();
    assert_eq!(client.balance(ALICE).await.unwrap(), BOND);

    alice
        .call("set", vec![word(11)], CallMode::Optimistic { new_state: state(11) })
        .await
        .unwrap();
    assert_eq!(alice.account().commitment(), h.committed(ALICE).await);
}
