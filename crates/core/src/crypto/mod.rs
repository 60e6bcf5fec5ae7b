//! Cryptographic primitives for paired folders
//!
//! This module is the codec the registry and the handshake lean on:
//!
//! - **Content & names**: one ChaCha20-Poly1305 `Secret` per pairing encrypts
//!   file bytes and name strings (names hex-encoded for filename safety)
//! - **Identity signatures**: Ed25519 keypairs bound to certificates sign the
//!   ephemeral public key inside an ask message
//! - **Key wrapping**: ECDH (via Ed25519→X25519 conversion) plus AES-KW moves
//!   the pairing's symmetric key to a newly granted machine
//!
//! # Trust Model
//!
//! The shared folder is the only channel between machines and it is writable
//! by anyone the external sync mechanism admits. Every handshake message is
//! therefore self-authenticating: the ask carries a signature over the
//! ephemeral public key, verified against a certificate, and the grant is
//! wrapped so only that ephemeral key's holder can open it.

mod keys;
mod secret;
mod wrap;

pub use ed25519_dalek::Signature;
pub use keys::{KeyError, PublicKey, SecretKey, PUBLIC_KEY_SIZE};
pub use secret::{Secret, SecretError, SECRET_SIZE};
pub use wrap::{KeyWrap, KeyWrapError, KEY_WRAP_SIZE};
