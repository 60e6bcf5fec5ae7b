//! The pairing handshake over the shared folder
//!
//! Three kinds of reserved-name files carry the whole protocol: an ask, a
//! key grant, and an invalid grant (denial). See [`protocol`] for the two
//! sides of the exchange and [`message`] for the wire formats.

mod message;
mod protocol;

pub use message::{
    ask_filename, invalid_filename, is_reserved_name, key_filename, message_kind, Ask, KeyGrant,
    MessageKind, RESERVED_MARKER,
};
pub use protocol::{
    on_ask_observed, submit_ask_request, AskOutcome, GrantedKey, PendingApproval, PendingAsk,
    DEFAULT_ASK_TIMEOUT,
};

use crate::crypto::KeyWrapError;
use crate::identity::CertificateError;

/// Errors raised during the pairing handshake
#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("handshake error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("the ask was denied")]
    Denied,
    #[error("no answer arrived before the deadline")]
    Timeout,
    #[error("certificate check failed: {0}")]
    Certificate(#[from] CertificateError),
    #[error("key wrap error: {0}")]
    Crypto(#[from] KeyWrapError),
    #[error("message decode error: {0}")]
    Decode(#[from] bincode::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
