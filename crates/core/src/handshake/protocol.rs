//! The pairing handshake, requester and holder sides
//!
//! A machine without the folder key drops an ask file into the shared folder
//! and polls for an answer. A machine holding the key observes the ask,
//! vets the requester's certificate and signature, and answers with either a
//! wrapped key or a denial file. The approval decision itself sits with the
//! caller (typically a human), so the holder side splits into an observation
//! step and a [`PendingApproval`] to resolve.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::crypto::{KeyWrap, PublicKey, Secret, SecretKey};
use crate::identity::Identity;

use super::message::{
    ask_filename, invalid_filename, key_filename, message_kind, Ask, KeyGrant, MessageKind,
};
use super::HandshakeError;

/// How long a requester waits before abandoning its ask
pub const DEFAULT_ASK_TIMEOUT: Duration = Duration::from_secs(90);

const POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Key material recovered from an approved ask
#[derive(Debug, Clone)]
pub struct GrantedKey {
    pub algorithm: String,
    pub key: Secret,
}

/// Write an ask file into `shared_dir` and start waiting for an answer
///
/// `identity_key` must be the long-lived key the identity's certificate
/// vouches for; it signs the fresh ephemeral public key any grant will be
/// wrapped to.
pub fn submit_ask_request(
    shared_dir: &Path,
    identity: &Identity,
    identity_key: &SecretKey,
) -> Result<PendingAsk, HandshakeError> {
    let ephemeral = SecretKey::generate();
    let id = Uuid::new_v4().simple().to_string();
    let signature = identity_key.sign(&ephemeral.public().to_bytes());
    let ask = Ask::new(&id, identity.clone(), ephemeral.public(), signature);

    std::fs::write(shared_dir.join(ask_filename(&id)), ask.encode()?)?;
    tracing::info!(ask = %id, requester = %identity, "ask request submitted");

    Ok(PendingAsk {
        id,
        ephemeral,
        shared_dir: shared_dir.to_path_buf(),
    })
}

/// An ask this machine submitted and is still waiting on
pub struct PendingAsk {
    id: String,
    ephemeral: SecretKey,
    shared_dir: PathBuf,
}

impl PendingAsk {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Poll the shared folder until a grant or denial answers this ask
    ///
    /// Answer files are consumed. On timeout the ask file itself is removed
    /// so holders stop seeing a request nobody is waiting on.
    pub async fn await_grant(self, timeout: Duration) -> Result<GrantedKey, HandshakeError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let key_path = self.shared_dir.join(key_filename(&self.id));
            if key_path.is_file() {
                let bytes = std::fs::read(&key_path)?;
                let _ = std::fs::remove_file(&key_path);
                let grant = KeyGrant::decode(&bytes)?;
                let key = grant.wrapped().recover(&self.ephemeral)?;
                tracing::info!(ask = %self.id, "key grant received");
                return Ok(GrantedKey {
                    algorithm: grant.algorithm().to_string(),
                    key,
                });
            }

            let invalid_path = self.shared_dir.join(invalid_filename(&self.id));
            if invalid_path.is_file() {
                let _ = std::fs::remove_file(&invalid_path);
                return Err(HandshakeError::Denied);
            }

            if tokio::time::Instant::now() >= deadline {
                let _ = std::fs::remove_file(self.shared_dir.join(ask_filename(&self.id)));
                return Err(HandshakeError::Timeout);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }
}

/// What observing an ask file led to
pub enum AskOutcome {
    /// The ask vetted clean; the caller decides whether to grant
    Pending(PendingApproval),
    /// The ask failed vetting and a denial was written
    Denied,
    /// Not an ask this machine should act on; the file was left alone
    Ignored,
}

/// Vet an ask file that appeared in the shared folder
///
/// This machine's own asks are ignored and left in place for a machine that
/// actually holds the key. Foreign asks are consumed: the file is deleted
/// here so one observer answers each ask at most once locally, then the
/// certificate window (at `now`) and the signature are checked. A failed
/// check writes the denial immediately; a clean one returns the approval
/// decision to the caller.
pub fn on_ask_observed(
    ask_path: &Path,
    own_identity: &Identity,
    now: DateTime<Utc>,
) -> Result<AskOutcome, HandshakeError> {
    let name = ask_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("unreadable ask filename"))?;
    let id = match message_kind(name) {
        Some((MessageKind::Ask, id)) => id.to_string(),
        _ => return Ok(AskOutcome::Ignored),
    };
    let shared_dir = ask_path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("ask file has no parent folder"))?
        .to_path_buf();

    // the watcher may deliver the same appearance twice
    if !ask_path.is_file() {
        return Ok(AskOutcome::Ignored);
    }
    let bytes = std::fs::read(ask_path)?;

    let ask = match Ask::decode(&bytes) {
        Ok(ask) => ask,
        Err(e) => {
            tracing::warn!(ask = %id, error = %e, "undecodable ask denied");
            std::fs::remove_file(ask_path)?;
            write_denial(&shared_dir, &id)?;
            return Ok(AskOutcome::Denied);
        }
    };

    if ask.identity() == own_identity {
        return Ok(AskOutcome::Ignored);
    }
    std::fs::remove_file(ask_path)?;

    if ask.id() != id {
        tracing::warn!(ask = %id, body_id = %ask.id(), "ask id mismatch denied");
        write_denial(&shared_dir, &id)?;
        return Ok(AskOutcome::Denied);
    }
    if let Err(e) = ask.verify(now) {
        tracing::warn!(ask = %id, requester = %ask.identity(), error = %e, "ask failed vetting");
        write_denial(&shared_dir, &id)?;
        return Ok(AskOutcome::Denied);
    }

    tracing::info!(ask = %id, requester = %ask.identity(), "ask vetted, awaiting approval");
    Ok(AskOutcome::Pending(PendingApproval {
        id,
        requester: ask.identity().clone(),
        ephemeral_key: *ask.ephemeral_key(),
        shared_dir,
    }))
}

/// A vetted ask waiting on this machine's approval decision
pub struct PendingApproval {
    id: String,
    requester: Identity,
    ephemeral_key: PublicKey,
    shared_dir: PathBuf,
}

impl PendingApproval {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// The certified identity asking for the key
    pub fn requester(&self) -> &Identity {
        &self.requester
    }

    /// Grant the folder key to the requester
    ///
    /// If wrapping fails, a denial is written in place of the grant so the
    /// requester is not left polling until timeout, and the error surfaces
    /// to the caller.
    pub fn approve(self, algorithm: &str, key: &Secret) -> Result<(), HandshakeError> {
        let wrapped = match KeyWrap::new(key, &self.ephemeral_key) {
            Ok(wrapped) => wrapped,
            Err(e) => {
                let _ = write_denial(&self.shared_dir, &self.id);
                return Err(e.into());
            }
        };
        let grant = KeyGrant::new(algorithm, wrapped);
        std::fs::write(self.shared_dir.join(key_filename(&self.id)), grant.encode()?)?;
        tracing::info!(ask = %self.id, requester = %self.requester, "key granted");
        Ok(())
    }

    /// Refuse the requester
    pub fn deny(self) -> Result<(), HandshakeError> {
        tracing::info!(ask = %self.id, requester = %self.requester, "ask denied");
        write_denial(&self.shared_dir, &self.id)
    }
}

fn write_denial(shared_dir: &Path, id: &str) -> Result<(), HandshakeError> {
    std::fs::write(shared_dir.join(invalid_filename(id)), [])?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testkit::test_identity;

    fn shared_dir() -> tempfile::TempDir {
        tempfile::tempdir().unwrap()
    }

    fn submitted_ask(dir: &Path) -> (PendingAsk, Identity, PathBuf) {
        let (identity, key) = test_identity("requester");
        let pending = submit_ask_request(dir, &identity, &key).unwrap();
        let ask_path = dir.join(ask_filename(pending.id()));
        assert!(ask_path.is_file());
        (pending, identity, ask_path)
    }

    #[tokio::test]
    async fn test_approved_ask_delivers_the_key() {
        let dir = shared_dir();
        let (pending, _, ask_path) = submitted_ask(dir.path());

        let (holder, _) = test_identity("holder");
        let outcome = on_ask_observed(&ask_path, &holder, Utc::now()).unwrap();
        let approval = match outcome {
            AskOutcome::Pending(approval) => approval,
            _ => panic!("expected a pending approval"),
        };
        assert_eq!(approval.requester().id(), "requester");
        // the ask file was consumed by observation
        assert!(!ask_path.exists());

        let folder_key = Secret::generate();
        approval.approve("chacha20-poly1305", &folder_key).unwrap();

        let granted = pending.await_grant(DEFAULT_ASK_TIMEOUT).await.unwrap();
        assert_eq!(granted.key, folder_key);
        assert_eq!(granted.algorithm, "chacha20-poly1305");
        // nothing handshake-related lingers in the folder
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_denied_ask() {
        let dir = shared_dir();
        let (pending, _, ask_path) = submitted_ask(dir.path());

        let (holder, _) = test_identity("holder");
        match on_ask_observed(&ask_path, &holder, Utc::now()).unwrap() {
            AskOutcome::Pending(approval) => approval.deny().unwrap(),
            _ => panic!("expected a pending approval"),
        }

        let err = pending.await_grant(DEFAULT_ASK_TIMEOUT).await.unwrap_err();
        assert!(matches!(err, HandshakeError::Denied));
    }

    #[tokio::test]
    async fn test_expired_certificate_is_denied_without_approval() {
        let dir = shared_dir();
        let (pending, _, ask_path) = submitted_ask(dir.path());

        // vet far in the future, past the certificate window
        let later = Utc::now() + chrono::Duration::days(365 * 10);
        let (holder, _) = test_identity("holder");
        match on_ask_observed(&ask_path, &holder, later).unwrap() {
            AskOutcome::Denied => {}
            _ => panic!("expected automatic denial"),
        }

        let err = pending.await_grant(DEFAULT_ASK_TIMEOUT).await.unwrap_err();
        assert!(matches!(err, HandshakeError::Denied));
    }

    #[tokio::test]
    async fn test_ask_with_mismatched_signature_is_denied() {
        let dir = shared_dir();
        let (identity, identity_key) = test_identity("mallory");

        // a well-formed ask whose signature covers a different ephemeral key
        // than the one carried in the body
        let signed_ephemeral = SecretKey::generate();
        let carried_ephemeral = SecretKey::generate();
        let signature = identity_key.sign(&signed_ephemeral.public().to_bytes());
        let ask = Ask::new("feedface", identity, carried_ephemeral.public(), signature);
        let ask_path = dir.path().join(ask_filename("feedface"));
        std::fs::write(&ask_path, ask.encode().unwrap()).unwrap();

        let (holder, _) = test_identity("holder");
        match on_ask_observed(&ask_path, &holder, Utc::now()).unwrap() {
            AskOutcome::Denied => {}
            _ => panic!("expected automatic denial"),
        }
        assert!(!ask_path.exists());
        assert!(dir.path().join(invalid_filename("feedface")).is_file());
    }

    #[tokio::test]
    async fn test_garbage_ask_is_denied() {
        let dir = shared_dir();
        let ask_path = dir.path().join(ask_filename("bogus"));
        std::fs::write(&ask_path, b"not an ask").unwrap();

        let (holder, _) = test_identity("holder");
        match on_ask_observed(&ask_path, &holder, Utc::now()).unwrap() {
            AskOutcome::Denied => {}
            _ => panic!("expected automatic denial"),
        }
        assert!(!ask_path.exists());
        assert!(dir.path().join(invalid_filename("bogus")).is_file());
    }

    #[tokio::test]
    async fn test_own_ask_is_ignored_and_left_in_place() {
        let dir = shared_dir();
        let (_pending, requester, ask_path) = submitted_ask(dir.path());

        match on_ask_observed(&ask_path, &requester, Utc::now()).unwrap() {
            AskOutcome::Ignored => {}
            _ => panic!("expected the ask to be ignored"),
        }
        // still there for a machine that actually holds the key
        assert!(ask_path.is_file());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unanswered_ask_times_out_and_retracts_itself() {
        let dir = shared_dir();
        let (pending, _, ask_path) = submitted_ask(dir.path());

        let err = pending
            .await_grant(Duration::from_secs(2))
            .await
            .unwrap_err();
        assert!(matches!(err, HandshakeError::Timeout));
        assert!(!ask_path.exists());
    }
}
