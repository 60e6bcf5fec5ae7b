//! End-to-end pairing scenarios: two machines, one shared folder
//!
//! Both machines see the same shared directory, which stands in for whatever
//! external mechanism syncs it between them.

mod common;

use std::time::Duration;

use chrono::Utc;
use pairlock::crypto::Secret;
use pairlock::handshake::{
    on_ask_observed, submit_ask_request, AskOutcome, HandshakeError, DEFAULT_ASK_TIMEOUT,
};
use pairlock::registry::{EventSource, Registry, RegistryWorker, WatchEvent};

use common::{certified_identity, shared_folder, Machine};

#[tokio::test]
async fn test_full_pairing_grants_access_to_existing_content() {
    let (root, shared) = shared_folder();

    // alice holds the key and already has content in the pair
    let alice = Machine::new(&root, "alice", &shared, Secret::generate());
    std::fs::write(alice.local.join("budget.xls"), b"rows and rows").unwrap();
    alice.registry.initialize().unwrap();
    let (dispatcher, asks, worker) = RegistryWorker::spawn(alice.registry.clone());

    // bob only has the shared folder and asks for the key
    let (bob_identity, bob_key) = certified_identity("bob");
    let pending = submit_ask_request(&shared, &bob_identity, &bob_key).unwrap();

    // the ask file lands in the shared folder and alice's watcher reports it
    let ask_path = shared.join(pairlock::handshake::ask_filename(pending.id()));
    dispatcher
        .dispatch(EventSource::Shared, WatchEvent::Created(ask_path))
        .unwrap();
    let signal = asks.recv_async().await.unwrap();

    // alice vets the ask and her user approves it
    let approval = match on_ask_observed(&signal.ask_path, &alice.identity, Utc::now()).unwrap() {
        AskOutcome::Pending(approval) => approval,
        _ => panic!("expected a pending approval"),
    };
    assert_eq!(approval.requester(), &bob_identity);
    approval
        .approve(&alice.registry.algorithm(), &alice.registry.key())
        .unwrap();

    // bob recovers the key and builds his own side of the pair
    let granted = pending.await_grant(DEFAULT_ASK_TIMEOUT).await.unwrap();
    assert_eq!(granted.key, alice.registry.key());

    let bob_local = root.path().join("bob-local");
    std::fs::create_dir(&bob_local).unwrap();
    let bob_registry = Registry::new(
        bob_identity,
        granted.algorithm,
        granted.key,
        &shared,
        &bob_local,
    );
    bob_registry.initialize().unwrap();

    // alice's file decrypts into bob's local folder
    assert_eq!(
        std::fs::read(bob_local.join("budget.xls")).unwrap(),
        b"rows and rows"
    );

    dispatcher.shutdown();
    worker.stopped().await;
}

#[tokio::test]
async fn test_denied_requester_learns_nothing() {
    let (root, shared) = shared_folder();
    let alice = Machine::new(&root, "alice", &shared, Secret::generate());
    alice.registry.initialize().unwrap();

    let (bob_identity, bob_key) = certified_identity("bob");
    let pending = submit_ask_request(&shared, &bob_identity, &bob_key).unwrap();

    let ask_path = shared.join(pairlock::handshake::ask_filename(pending.id()));
    match on_ask_observed(&ask_path, &alice.identity, Utc::now()).unwrap() {
        AskOutcome::Pending(approval) => approval.deny().unwrap(),
        _ => panic!("expected a pending approval"),
    }

    let err = pending.await_grant(DEFAULT_ASK_TIMEOUT).await.unwrap_err();
    assert!(matches!(err, HandshakeError::Denied));
}

#[tokio::test(start_paused = true)]
async fn test_ask_with_nobody_listening_times_out() {
    let (_root, shared) = shared_folder();
    let (bob_identity, bob_key) = certified_identity("bob");
    let pending = submit_ask_request(&shared, &bob_identity, &bob_key).unwrap();

    let err = pending
        .await_grant(Duration::from_secs(5))
        .await
        .unwrap_err();
    assert!(matches!(err, HandshakeError::Timeout));
    // the abandoned ask was retracted
    assert_eq!(std::fs::read_dir(&shared).unwrap().count(), 0);
}
