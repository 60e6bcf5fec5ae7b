//! Folder-key wrapping for grant messages, using ECDH + AES Key Wrap
//!
//! When a trusted holder approves an ask, the pairing's symmetric key travels
//! back through the shared folder inside a grant file. The key is wrapped so
//! that only the requester, as holder of the ephemeral secret key whose
//! public half was signed into the ask, can recover it:
//!
//! 1. Generate an ephemeral Ed25519 keypair on the granting side
//! 2. Convert both keys to X25519 and compute an ECDH shared secret
//! 3. AES-KW (RFC 3394) the folder key under that shared secret
//! 4. Ship `[ephemeral_pubkey || wrapped_key]` in the grant body
//!
//! An attacker who can write into the shared folder learns nothing from a
//! grant addressed to someone else, and cannot redirect one without breaking
//! the ask signature it answers.

use std::convert::TryFrom;

use aes_kw::KekAes256 as Kek;
use serde::{Deserialize, Serialize};

use super::keys::{KeyError, PublicKey, SecretKey, PUBLIC_KEY_SIZE};
use super::secret::{Secret, SecretError, SECRET_SIZE};

/// Size of AES Key Wrap padding in bytes
pub const KW_PAD_SIZE: usize = 8;
/// Total size of a wrapped key in bytes
///
/// Layout: ephemeral_pubkey (32) || wrapped_key (40) = 72 bytes.
/// AES-KW adds 8 bytes to the 32-byte folder key.
pub const KEY_WRAP_SIZE: usize = PUBLIC_KEY_SIZE + SECRET_SIZE + KW_PAD_SIZE;

/// Errors that can occur while wrapping or recovering a folder key
#[derive(Debug, thiserror::Error)]
pub enum KeyWrapError {
    #[error("key wrap error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("key error: {0}")]
    Key(#[from] KeyError),
    #[error("secret error: {0}")]
    Secret(#[from] SecretError),
}

/// A folder key wrapped for exactly one recipient
///
/// Contains an ephemeral public key and the AES-KW wrapped folder key. Only
/// the recipient whose public key was used during wrapping can recover the
/// key; anyone else gets an unwrap failure, indistinguishable from tampering.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct KeyWrap(#[serde(with = "serde_bytes_72")] [u8; KEY_WRAP_SIZE]);

// serde's const-generic array impls stop being available through bincode's
// fixed-int encoding for large arrays on some serde versions, so the 72-byte
// buffer round-trips through a length-checked byte buffer instead.
mod serde_bytes_72 {
    use super::KEY_WRAP_SIZE;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        bytes: &[u8; KEY_WRAP_SIZE],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<[u8; KEY_WRAP_SIZE], D::Error> {
        let bytes = <&[u8]>::deserialize(deserializer)?;
        if bytes.len() != KEY_WRAP_SIZE {
            return Err(D::Error::invalid_length(
                bytes.len(),
                &format!("expected {} bytes", KEY_WRAP_SIZE).as_str(),
            ));
        }
        let mut array = [0u8; KEY_WRAP_SIZE];
        array.copy_from_slice(bytes);
        Ok(array)
    }
}

impl Default for KeyWrap {
    fn default() -> Self {
        KeyWrap([0; KEY_WRAP_SIZE])
    }
}

impl From<[u8; KEY_WRAP_SIZE]> for KeyWrap {
    fn from(bytes: [u8; KEY_WRAP_SIZE]) -> Self {
        KeyWrap(bytes)
    }
}

impl TryFrom<&[u8]> for KeyWrap {
    type Error = KeyWrapError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        if bytes.len() != KEY_WRAP_SIZE {
            return Err(anyhow::anyhow!(
                "invalid key wrap size, expected {}, got {}",
                KEY_WRAP_SIZE,
                bytes.len()
            )
            .into());
        }
        let mut wrap = KeyWrap::default();
        wrap.0.copy_from_slice(bytes);
        Ok(wrap)
    }
}

impl KeyWrap {
    /// Wrap a folder key for a specific recipient
    ///
    /// # Errors
    ///
    /// Returns an error if key conversion or AES-KW encryption fails.
    pub fn new(secret: &Secret, recipient: &PublicKey) -> Result<Self, KeyWrapError> {
        let ephemeral_private = SecretKey::generate();
        let ephemeral_public = ephemeral_private.public();

        let ephemeral_x25519_private = ephemeral_private.to_x25519();
        let recipient_x25519_public = recipient.to_x25519()?;

        let shared_secret = ephemeral_x25519_private.diffie_hellman(&recipient_x25519_public);

        let mut shared_secret_bytes = [0; SECRET_SIZE];
        shared_secret_bytes.copy_from_slice(shared_secret.as_bytes());
        let kek = Kek::from(shared_secret_bytes);
        let wrapped = kek
            .wrap_vec(secret.bytes())
            .map_err(|_| anyhow::anyhow!("AES-KW wrap error"))?;

        let mut out = KeyWrap::default();
        let ephemeral_bytes = ephemeral_public.to_bytes();

        if ephemeral_bytes.len() + wrapped.len() != KEY_WRAP_SIZE {
            return Err(anyhow::anyhow!("expected key wrap size is incorrect").into());
        };

        out.0[..PUBLIC_KEY_SIZE].copy_from_slice(&ephemeral_bytes);
        out.0[PUBLIC_KEY_SIZE..PUBLIC_KEY_SIZE + wrapped.len()].copy_from_slice(&wrapped);

        Ok(out)
    }

    /// Recover the wrapped folder key using the recipient's secret key
    ///
    /// # Errors
    ///
    /// Fails if the wrap was addressed to a different recipient, the data was
    /// corrupted, or someone tampered with it. Those cases are deliberately
    /// indistinguishable.
    pub fn recover(&self, recipient_secret: &SecretKey) -> Result<Secret, KeyWrapError> {
        let ephemeral_public_bytes = &self.0[..PUBLIC_KEY_SIZE];
        let ephemeral_public = PublicKey::try_from(ephemeral_public_bytes)?;

        let recipient_x25519_private = recipient_secret.to_x25519();
        let ephemeral_x25519_public = ephemeral_public.to_x25519()?;

        let shared_secret = recipient_x25519_private.diffie_hellman(&ephemeral_x25519_public);

        let shared_secret_bytes = *shared_secret.as_bytes();
        let kek = Kek::from(shared_secret_bytes);
        let wrapped_data = &self.0[PUBLIC_KEY_SIZE..];

        let unwrapped = kek
            .unwrap_vec(wrapped_data)
            .map_err(|_| anyhow::anyhow!("AES-KW unwrap error"))?;

        if unwrapped.len() != SECRET_SIZE {
            return Err(anyhow::anyhow!("unwrapped key has wrong size").into());
        }

        let mut secret_bytes = [0; SECRET_SIZE];
        secret_bytes.copy_from_slice(&unwrapped);
        Ok(Secret::from(secret_bytes))
    }

    /// Get a reference to the raw wrap bytes
    pub fn bytes(&self) -> &[u8] {
        &self.0
    }
}
