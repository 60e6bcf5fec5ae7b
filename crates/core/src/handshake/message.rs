//! On-disk handshake messages and their reserved names
//!
//! Handshake messages are ordinary files in the shared folder, carried to the
//! other machines by the same external sync mechanism as everything else.
//! Their names start with a marker no encoded entry name can (encoded names
//! are hex), so the registry skips them and the protocol spots them.

use serde::{Deserialize, Serialize};

use crate::crypto::{KeyWrap, PublicKey, Signature};
use crate::identity::Identity;

use super::HandshakeError;

/// Marker prefixing every handshake filename
pub const RESERVED_MARKER: &str = "\u{00bb}";

const ASK_PREFIX: &str = "\u{00bb}ask";
const KEY_PREFIX: &str = "\u{00bb}key";
const INVALID_PREFIX: &str = "\u{00bb}invalid";

/// The three message files of the pairing handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// A machine requesting the folder key
    Ask,
    /// A wrapped key answering an ask
    KeyGrant,
    /// A denial answering an ask
    InvalidGrant,
}

/// Whether `name` is reserved for the handshake and must never enter the tree
pub fn is_reserved_name(name: &str) -> bool {
    name.starts_with(RESERVED_MARKER)
}

/// Classify a reserved filename, returning its kind and request id
pub fn message_kind(name: &str) -> Option<(MessageKind, &str)> {
    if let Some(id) = name.strip_prefix(INVALID_PREFIX) {
        return Some((MessageKind::InvalidGrant, id));
    }
    if let Some(id) = name.strip_prefix(ASK_PREFIX) {
        return Some((MessageKind::Ask, id));
    }
    if let Some(id) = name.strip_prefix(KEY_PREFIX) {
        return Some((MessageKind::KeyGrant, id));
    }
    None
}

pub fn ask_filename(id: &str) -> String {
    format!("{ASK_PREFIX}{id}")
}

pub fn key_filename(id: &str) -> String {
    format!("{KEY_PREFIX}{id}")
}

pub fn invalid_filename(id: &str) -> String {
    format!("{INVALID_PREFIX}{id}")
}

/// The body of an ask file
///
/// Self-authenticating: the signature over the ephemeral public key is made
/// with the long-lived key the requester's certificate vouches for, so any
/// trusted holder can vet the ask with no channel but the folder itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ask {
    id: String,
    identity: Identity,
    ephemeral_key: PublicKey,
    signature: Signature,
}

impl Ask {
    pub fn new(
        id: impl Into<String>,
        identity: Identity,
        ephemeral_key: PublicKey,
        signature: Signature,
    ) -> Self {
        Self {
            id: id.into(),
            identity,
            ephemeral_key,
            signature,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn ephemeral_key(&self) -> &PublicKey {
        &self.ephemeral_key
    }

    /// Vet the ask: certificate valid at `now`, signature binds the
    /// ephemeral key to the certified identity
    pub fn verify(&self, now: chrono::DateTime<chrono::Utc>) -> Result<(), HandshakeError> {
        let certificate = self.identity.certificate();
        certificate.check_validity(now)?;
        certificate.verify(&self.ephemeral_key.to_bytes(), &self.signature)?;
        Ok(())
    }

    pub fn encode(&self) -> Result<Vec<u8>, HandshakeError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, HandshakeError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

/// The body of a key grant file
///
/// The algorithm label travels in the clear; the folder key only inside the
/// wrap, recoverable solely by the ask's ephemeral key holder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyGrant {
    algorithm: String,
    wrapped: KeyWrap,
}

impl KeyGrant {
    pub fn new(algorithm: impl Into<String>, wrapped: KeyWrap) -> Self {
        Self {
            algorithm: algorithm.into(),
            wrapped,
        }
    }

    pub fn algorithm(&self) -> &str {
        &self.algorithm
    }

    pub fn wrapped(&self) -> &KeyWrap {
        &self.wrapped
    }

    pub fn encode(&self) -> Result<Vec<u8>, HandshakeError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, HandshakeError> {
        Ok(bincode::deserialize(bytes)?)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_reserved_names() {
        assert!(is_reserved_name("\u{00bb}ask1a2b"));
        assert!(is_reserved_name("\u{00bb}key1a2b"));
        assert!(is_reserved_name("\u{00bb}invalid1a2b"));
        assert!(!is_reserved_name("deadbeef"));
        assert!(!is_reserved_name("ask1a2b"));
    }

    #[test]
    fn test_message_kind_classification() {
        assert_eq!(
            message_kind(&ask_filename("1a2b")),
            Some((MessageKind::Ask, "1a2b"))
        );
        assert_eq!(
            message_kind(&key_filename("1a2b")),
            Some((MessageKind::KeyGrant, "1a2b"))
        );
        assert_eq!(
            message_kind(&invalid_filename("1a2b")),
            Some((MessageKind::InvalidGrant, "1a2b"))
        );
        assert_eq!(message_kind("plain.txt"), None);
        // a bare marker is reserved but classifies as nothing
        assert_eq!(message_kind(RESERVED_MARKER), None);
    }
}
