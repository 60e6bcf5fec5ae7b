//! Password-sealed registry snapshots
//!
//! A registry's serialized state (key material included) persists between
//! runs as a snapshot sealed under a password. The password goes through
//! Argon2id; the derived key both encrypts the state and keys a verifier
//! hash, so a wrong password is reported as [`SnapshotError::WrongPassword`]
//! rather than as corruption.

use std::path::Path;

use argon2::{Algorithm, Argon2, Params, Version};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use crate::crypto::{Secret, SECRET_SIZE};
use crate::registry::{Registry, RegistryError};

const VERIFIER_CONTEXT: &[u8; 32] = b"pairlock snapshot verifier key\0\0";

/// Errors raised while sealing or unsealing a snapshot
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("snapshot error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("wrong password")]
    WrongPassword,
    #[error("snapshot is corrupted")]
    Corrupted,
    #[error("registry is {0}")]
    InvalidState(&'static str),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Argon2id parameters stored alongside the ciphertext
///
/// Defaults follow the current OWASP recommendation (19 MiB, two passes).
/// The salt is fresh per snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KdfParams {
    pub salt: [u8; 16],
    pub mem_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        let mut salt = [0u8; 16];
        getrandom::getrandom(&mut salt).expect("failed to generate random bytes");
        Self {
            salt,
            mem_cost: 19_456,
            time_cost: 2,
            parallelism: 1,
        }
    }
}

impl KdfParams {
    fn derive(&self, password: &str) -> Result<[u8; SECRET_SIZE], SnapshotError> {
        let params = Params::new(
            self.mem_cost,
            self.time_cost,
            self.parallelism,
            Some(SECRET_SIZE),
        )
        .map_err(|e| anyhow::anyhow!("invalid KDF parameters: {e}"))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut derived = [0u8; SECRET_SIZE];
        argon2
            .hash_password_into(password.as_bytes(), &self.salt, &mut derived)
            .map_err(|e| anyhow::anyhow!("key derivation failed: {e}"))?;
        Ok(derived)
    }
}

/// One registry, sealed under a password
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    kdf: KdfParams,
    verifier: [u8; 32],
    ciphertext: Vec<u8>,
}

impl Snapshot {
    /// Seal a stopped registry's state under `password`
    ///
    /// Refused while the registry is running: stop it first so the sealed
    /// tree cannot race concurrent event application.
    pub fn seal(registry: &Registry, password: &str) -> Result<Self, SnapshotError> {
        let inner = registry.export().map_err(|e| match e {
            RegistryError::InvalidState(state) => SnapshotError::InvalidState(state),
            other => SnapshotError::Default(other.into()),
        })?;
        let plain =
            bincode::serialize(&inner).map_err(|e| anyhow::anyhow!("encode error: {e}"))?;

        let kdf = KdfParams::default();
        let derived = kdf.derive(password)?;
        let verifier = *blake3::keyed_hash(&derived, VERIFIER_CONTEXT).as_bytes();
        let ciphertext = Secret::from(derived)
            .encrypt(&plain)
            .map_err(|e| anyhow::anyhow!("seal error: {e}"))?;

        Ok(Snapshot {
            kdf,
            verifier,
            ciphertext,
        })
    }

    /// Recover the sealed registry
    ///
    /// A wrong password and a damaged snapshot are distinct failures; the
    /// restored registry always comes back idle and must be initialized.
    pub fn unseal(&self, password: &str) -> Result<Registry, SnapshotError> {
        let derived = self.kdf.derive(password)?;
        let verifier = blake3::keyed_hash(&derived, VERIFIER_CONTEXT);
        if !bool::from(verifier.as_bytes().ct_eq(&self.verifier)) {
            return Err(SnapshotError::WrongPassword);
        }

        let plain = Secret::from(derived)
            .decrypt(&self.ciphertext)
            .map_err(|_| SnapshotError::Corrupted)?;
        let inner = bincode::deserialize(&plain).map_err(|_| SnapshotError::Corrupted)?;
        Ok(Registry::from_inner(inner))
    }

    /// Write the snapshot to disk
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        let bytes = bincode::serialize(self).map_err(|e| anyhow::anyhow!("encode error: {e}"))?;
        std::fs::write(path, bytes)?;
        Ok(())
    }

    /// Read a snapshot back from disk
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let bytes = std::fs::read(path)?;
        bincode::deserialize(&bytes).map_err(|_| SnapshotError::Corrupted)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testkit::{folder_pair, test_identity};

    fn stopped_registry() -> (Registry, tempfile::TempDir) {
        let (dir, shared, local) = folder_pair();
        std::fs::write(local.join("kept.txt"), b"kept across restarts").unwrap();
        let (identity, _) = test_identity("owner");
        let registry = Registry::new(
            identity,
            "chacha20-poly1305",
            Secret::generate(),
            &shared,
            &local,
        );
        registry.initialize().unwrap();
        registry.stop();
        (registry, dir)
    }

    #[test]
    fn test_seal_unseal_round_trip() {
        let (registry, _dir) = stopped_registry();
        let snapshot = Snapshot::seal(&registry, "hunter2").unwrap();
        let restored = snapshot.unseal("hunter2").unwrap();

        assert_eq!(restored.id(), registry.id());
        assert_eq!(restored.key(), registry.key());
        assert_eq!(restored.shared_path(), registry.shared_path());
        // restored registries start idle
        assert_eq!(restored.state(), crate::registry::RegistryState::Idle);
        // and still know their tree
        let local_file = registry.local_path().join("kept.txt");
        let via_restored = restored.translate_to_shared(&local_file).unwrap();
        let via_original = registry.translate_to_shared(&local_file).unwrap();
        assert_eq!(via_restored, via_original);
    }

    #[test]
    fn test_wrong_password_is_not_corruption() {
        let (registry, _dir) = stopped_registry();
        let snapshot = Snapshot::seal(&registry, "hunter2").unwrap();
        assert!(matches!(
            snapshot.unseal("*******"),
            Err(SnapshotError::WrongPassword)
        ));
    }

    #[test]
    fn test_tampered_snapshot_is_corrupted() {
        let (registry, _dir) = stopped_registry();
        let mut snapshot = Snapshot::seal(&registry, "hunter2").unwrap();
        let last = snapshot.ciphertext.len() - 1;
        snapshot.ciphertext[last] ^= 0xff;
        assert!(matches!(
            snapshot.unseal("hunter2"),
            Err(SnapshotError::Corrupted)
        ));
    }

    #[test]
    fn test_running_registry_refuses_to_seal() {
        let (registry, _dir) = stopped_registry();
        registry.initialize().unwrap();
        assert!(matches!(
            Snapshot::seal(&registry, "hunter2"),
            Err(SnapshotError::InvalidState(_))
        ));
    }

    #[test]
    fn test_save_and_load() {
        let (registry, dir) = stopped_registry();
        let snapshot = Snapshot::seal(&registry, "hunter2").unwrap();
        let path = dir.path().join("registry.pairlock");
        snapshot.save(&path).unwrap();
        let loaded = Snapshot::load(&path).unwrap();
        assert_eq!(loaded.unseal("hunter2").unwrap().id(), registry.id());
    }
}
