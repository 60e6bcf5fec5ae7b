//! Identities and the certificates that vouch for them
//!
//! An [`Identity`] arrives from an external provider (a smart-card token, a
//! PKI enrollment, a test fixture) already verified; this crate only consumes
//! it. The [`Certificate`] inside is the X.509 material distilled to what the
//! handshake actually checks: the subject's signing key and a validity window.
//! The wall clock used for validity checks is always passed in by the caller,
//! never read ambiently, so vetting stays deterministic under test.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::crypto::{PublicKey, Signature};

/// Errors raised while checking a certificate
#[derive(Debug, thiserror::Error)]
pub enum CertificateError {
    #[error("certificate not valid before {0}")]
    NotYetValid(DateTime<Utc>),
    #[error("certificate expired at {0}")]
    Expired(DateTime<Utc>),
    #[error("signature does not verify against certificate key")]
    BadSignature,
}

/// The certificate material the handshake consumes
///
/// Issued and verified outside this crate. The embedded public key is the
/// long-lived key the subject signs ask payloads with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    subject: String,
    public_key: PublicKey,
    not_before: DateTime<Utc>,
    not_after: DateTime<Utc>,
}

impl Certificate {
    pub fn new(
        subject: impl Into<String>,
        public_key: PublicKey,
        not_before: DateTime<Utc>,
        not_after: DateTime<Utc>,
    ) -> Self {
        Self {
            subject: subject.into(),
            public_key,
            not_before,
            not_after,
        }
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Check that `now` falls inside the validity window
    pub fn check_validity(&self, now: DateTime<Utc>) -> Result<(), CertificateError> {
        if now < self.not_before {
            return Err(CertificateError::NotYetValid(self.not_before));
        }
        if now > self.not_after {
            return Err(CertificateError::Expired(self.not_after));
        }
        Ok(())
    }

    /// Verify a detached signature against the certificate's key
    pub fn verify(&self, msg: &[u8], signature: &Signature) -> Result<(), CertificateError> {
        self.public_key
            .verify(msg, signature)
            .map_err(|_| CertificateError::BadSignature)
    }
}

/// One user on one machine, as vouched for by a certificate
///
/// Immutable. Two identities are the same participant iff their ids match;
/// machine name and certificate play no part in equality.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Identity {
    id: String,
    machine_name: String,
    certificate: Certificate,
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Identity {}

impl std::hash::Hash for Identity {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.id, self.machine_name)
    }
}

impl Identity {
    pub fn new(
        id: impl Into<String>,
        machine_name: impl Into<String>,
        certificate: Certificate,
    ) -> Self {
        Self {
            id: id.into(),
            machine_name: machine_name.into(),
            certificate,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn machine_name(&self) -> &str {
        &self.machine_name
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::crypto::SecretKey;
    use chrono::Duration;

    fn cert_around(now: DateTime<Utc>, key: PublicKey) -> Certificate {
        Certificate::new(
            "test-subject",
            key,
            now - Duration::days(1),
            now + Duration::days(1),
        )
    }

    #[test]
    fn test_validity_window() {
        let now = Utc::now();
        let cert = cert_around(now, SecretKey::generate().public());

        assert!(cert.check_validity(now).is_ok());
        assert!(matches!(
            cert.check_validity(now - Duration::days(2)),
            Err(CertificateError::NotYetValid(_))
        ));
        assert!(matches!(
            cert.check_validity(now + Duration::days(2)),
            Err(CertificateError::Expired(_))
        ));
    }

    #[test]
    fn test_certificate_verifies_subject_signatures() {
        let now = Utc::now();
        let key = SecretKey::generate();
        let cert = cert_around(now, key.public());

        let msg = b"ephemeral public key bytes";
        let sig = key.sign(msg);
        assert!(cert.verify(msg, &sig).is_ok());

        let other = SecretKey::generate();
        let forged = other.sign(msg);
        assert!(matches!(
            cert.verify(msg, &forged),
            Err(CertificateError::BadSignature)
        ));
    }

    #[test]
    fn test_identity_equality_by_id() {
        let now = Utc::now();
        let a = Identity::new(
            "id-1",
            "laptop",
            cert_around(now, SecretKey::generate().public()),
        );
        let b = Identity::new(
            "id-1",
            "desktop",
            cert_around(now, SecretKey::generate().public()),
        );
        let c = Identity::new(
            "id-2",
            "laptop",
            cert_around(now, SecretKey::generate().public()),
        );

        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
