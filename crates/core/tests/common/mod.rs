//! Shared test utilities for pairing scenario tests
#![allow(dead_code)]

use std::path::PathBuf;

use chrono::{Duration, Utc};
use pairlock::crypto::{Secret, SecretKey};
use pairlock::identity::{Certificate, Identity};
use pairlock::registry::Registry;
use tempfile::TempDir;

/// A certified identity plus the signing key its certificate vouches for
pub fn certified_identity(id: &str) -> (Identity, SecretKey) {
    let key = SecretKey::generate();
    let now = Utc::now();
    let certificate = Certificate::new(
        id,
        key.public(),
        now - Duration::hours(1),
        now + Duration::days(365),
    );
    let identity = Identity::new(id, format!("{id}-machine"), certificate);
    (identity, key)
}

/// One "machine": an identity, a private local folder, and a registry over
/// the shared folder every machine in the test sees
pub struct Machine {
    pub identity: Identity,
    pub identity_key: SecretKey,
    pub local: PathBuf,
    pub registry: Registry,
}

impl Machine {
    pub fn new(root: &TempDir, name: &str, shared: &PathBuf, key: Secret) -> Machine {
        let (identity, identity_key) = certified_identity(name);
        let local = root.path().join(format!("{name}-local"));
        std::fs::create_dir(&local).unwrap();
        let registry = Registry::new(
            identity.clone(),
            "chacha20-poly1305",
            key,
            shared,
            &local,
        );
        Machine {
            identity,
            identity_key,
            local,
            registry,
        }
    }
}

/// A shared folder plus the tempdir roots everything lives under
pub fn shared_folder() -> (TempDir, PathBuf) {
    // RUST_LOG=debug makes scenario failures readable
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let root = TempDir::new().unwrap();
    let shared = root.path().join("shared");
    std::fs::create_dir(&shared).unwrap();
    (root, shared)
}
