//! Fixtures shared across the unit tests

use std::path::PathBuf;

use chrono::{Duration, Utc};

use crate::crypto::SecretKey;
use crate::identity::{Certificate, Identity};

/// A certified identity plus the signing key its certificate vouches for
///
/// The certificate window opens an hour ago and closes in a year, so "now"
/// is always inside it.
pub fn test_identity(id: &str) -> (Identity, SecretKey) {
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

/// A tempdir holding fresh `shared/` and `local/` folders
pub fn folder_pair() -> (tempfile::TempDir, PathBuf, PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let shared = dir.path().join("shared");
    let local = dir.path().join("local");
    std::fs::create_dir(&shared).expect("create shared dir");
    std::fs::create_dir(&local).expect("create local dir");
    (dir, shared, local)
}
