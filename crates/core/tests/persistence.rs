//! Sealing a registry across restarts

mod common;

use pairlock::crypto::Secret;
use pairlock::snapshot::{Snapshot, SnapshotError};

use common::{shared_folder, Machine};

#[test]
fn test_restart_catches_up_with_offline_changes() {
    let (root, shared) = shared_folder();
    let key = Secret::generate();
    let alice = Machine::new(&root, "alice", &shared, key.clone());
    std::fs::write(alice.local.join("kept.txt"), b"kept").unwrap();
    alice.registry.initialize().unwrap();

    // shut down and seal
    alice.registry.stop();
    let snapshot_path = root.path().join("alice.pairlock");
    Snapshot::seal(&alice.registry, "correct horse")
        .unwrap()
        .save(&snapshot_path)
        .unwrap();

    // while alice is offline, bob adds a file through the shared folder
    let bob = Machine::new(&root, "bob", &shared, key);
    bob.registry.initialize().unwrap();
    std::fs::write(bob.local.join("while-away.txt"), b"news").unwrap();
    // bob's own reconciliation pushes it into the shared side
    bob.registry.stop();
    bob.registry.initialize().unwrap();

    // alice restarts: load, unseal, re-initialize
    let restored = Snapshot::load(&snapshot_path)
        .unwrap()
        .unseal("correct horse")
        .unwrap();
    restored.initialize().unwrap();

    assert_eq!(
        std::fs::read(alice.local.join("kept.txt")).unwrap(),
        b"kept"
    );
    assert_eq!(
        std::fs::read(alice.local.join("while-away.txt")).unwrap(),
        b"news"
    );
}

#[test]
fn test_wrong_password_on_restart() {
    let (root, shared) = shared_folder();
    let alice = Machine::new(&root, "alice", &shared, Secret::generate());
    alice.registry.initialize().unwrap();
    alice.registry.stop();

    let snapshot = Snapshot::seal(&alice.registry, "correct horse").unwrap();
    assert!(matches!(
        snapshot.unseal("battery staple"),
        Err(SnapshotError::WrongPassword)
    ));
}
