/**
 * Cryptographic types and operations.
 *  - Per-pairing symmetric secret (content and name codec)
 *  - Identity and ephemeral keypairs
 *  - Key-to-key folder key wrapping for grants
 */
pub mod crypto;
/**
 * The pairing handshake carried over the shared
 *  folder itself: ask, key grant and invalid grant
 *  message files plus both protocol sides.
 */
pub mod handshake;
/**
 * Certified identities, as issued by an external
 *  provider and consumed by handshake vetting.
 */
pub mod identity;
/**
 * The registry of one paired folder: the entry
 *  tree mapping real to encoded names, both-way
 *  reconciliation and the per-registry worker.
 */
pub mod registry;
/**
 * Password-sealed persistence of a registry
 *  between runs.
 */
pub mod snapshot;

#[cfg(test)]
mod testkit;

pub mod prelude {
    pub use crate::crypto::{PublicKey, Secret, SecretKey};
    pub use crate::handshake::{AskOutcome, GrantedKey, HandshakeError, PendingApproval};
    pub use crate::identity::{Certificate, Identity};
    pub use crate::registry::{Registry, RegistryError, RegistryWorker};
    pub use crate::snapshot::Snapshot;
}
