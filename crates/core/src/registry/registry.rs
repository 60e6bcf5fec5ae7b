//! The registry: one pairing's key material, folders, and entry tree
//!
//! A registry owns everything one local↔shared pairing needs: the symmetric
//! key and its algorithm label, the two folder locations, and the entry tree
//! mapping real names to encoded names. All mutation goes through a single
//! mutex, so filesystem events racing in from both watched folders are
//! serialized before they touch the tree.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::crypto::{Secret, SecretError};
use crate::handshake::is_reserved_name;
use crate::identity::Identity;

use super::entry::{EntryId, EntryTree, TreeError};
use super::events::{EventSource, WatchEvent};

/// Errors raised by registry operations
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("default error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("paired folder is missing: {0}")]
    ExternalFolderMissing(PathBuf),
    #[error("name conflict: {0:?}")]
    Conflict(String),
    #[error("path is outside this registry: {0}")]
    PathOutsideRegistry(PathBuf),
    #[error("invalid path: {0}")]
    InvalidPath(PathBuf),
    #[error("registry is {0}")]
    InvalidState(&'static str),
    #[error("tree error: {0}")]
    Tree(#[from] TreeError),
    #[error("crypto error: {0}")]
    Crypto(#[from] SecretError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Lifecycle of a registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistryState {
    /// Created or restored, not yet reconciling
    #[default]
    Idle,
    /// Reconciling; tree mutation allowed
    Running,
    /// Stopped; must be re-initialized before further reconciliation
    Stopped,
}

/// Serializable state of one pairing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct RegistryInner {
    pub(crate) id: Uuid,
    pub(crate) owner: Identity,
    pub(crate) algorithm: String,
    pub(crate) key: Secret,
    pub(crate) shared_path: PathBuf,
    pub(crate) local_path: PathBuf,
    pub(crate) tree: EntryTree,
    #[serde(skip, default)]
    pub(crate) state: RegistryState,
}

/// Handle to one pairing
///
/// Cheap to clone; all clones share the same serialized state behind one
/// lock. The lock is the unit of atomicity: a whole-subtree operation either
/// completes under it or leaves the tree untouched.
#[derive(Clone)]
pub struct Registry(Arc<Mutex<RegistryInner>>);

impl Registry {
    /// Create a fresh registry for a new pairing
    pub fn new(
        owner: Identity,
        algorithm: impl Into<String>,
        key: Secret,
        shared_path: impl Into<PathBuf>,
        local_path: impl Into<PathBuf>,
    ) -> Self {
        Registry(Arc::new(Mutex::new(RegistryInner {
            id: Uuid::new_v4(),
            owner,
            algorithm: algorithm.into(),
            key,
            shared_path: shared_path.into(),
            local_path: local_path.into(),
            tree: EntryTree::new(),
            state: RegistryState::Idle,
        })))
    }

    pub(crate) fn from_inner(inner: RegistryInner) -> Self {
        Registry(Arc::new(Mutex::new(inner)))
    }

    pub fn id(&self) -> Uuid {
        self.0.lock().id
    }

    pub fn owner(&self) -> Identity {
        self.0.lock().owner.clone()
    }

    pub fn algorithm(&self) -> String {
        self.0.lock().algorithm.clone()
    }

    pub fn key(&self) -> Secret {
        self.0.lock().key.clone()
    }

    pub fn shared_path(&self) -> PathBuf {
        self.0.lock().shared_path.clone()
    }

    pub fn local_path(&self) -> PathBuf {
        self.0.lock().local_path.clone()
    }

    pub fn state(&self) -> RegistryState {
        self.0.lock().state
    }

    /// Clone of the serializable state, refused while running
    pub(crate) fn export(&self) -> Result<RegistryInner, RegistryError> {
        let inner = self.0.lock();
        if inner.state == RegistryState::Running {
            return Err(RegistryError::InvalidState("running; stop it first"));
        }
        Ok(inner.clone())
    }

    /// Install key material received through a grant
    ///
    /// Refused while running: adopt before `initialize`.
    pub fn adopt_key(
        &self,
        algorithm: impl Into<String>,
        key: Secret,
    ) -> Result<(), RegistryError> {
        let mut inner = self.0.lock();
        if inner.state == RegistryState::Running {
            return Err(RegistryError::InvalidState("running; stop it first"));
        }
        inner.algorithm = algorithm.into();
        inner.key = key;
        Ok(())
    }

    /// Reconcile both folders against the tree and start accepting events
    ///
    /// Every shared-side entry that is not a reserved handshake name is
    /// resolved or created (first occurrence of a name wins) and mirrored to
    /// the local side if absent; local-only entries are encrypted into the
    /// shared side. Idempotent when the folders already match the tree.
    ///
    /// Per-entry crypto failures are logged and skipped. Structural failures
    /// (name conflicts) abort the pass with [`RegistryError::Conflict`].
    pub fn initialize(&self) -> Result<(), RegistryError> {
        let mut inner = self.0.lock();
        if !inner.shared_path.is_dir() {
            let path = inner.shared_path.clone();
            inner.state = RegistryState::Stopped;
            return Err(RegistryError::ExternalFolderMissing(path));
        }
        if !inner.local_path.is_dir() {
            let path = inner.local_path.clone();
            inner.state = RegistryState::Stopped;
            return Err(RegistryError::ExternalFolderMissing(path));
        }

        let root = inner.tree.root();
        let shared = inner.shared_path.clone();
        let local = inner.local_path.clone();
        Self::reconcile_shared_dir(&mut inner, root, &shared, &local)?;
        Self::reconcile_local_dir(&mut inner, root, &shared, &local)?;

        inner.state = RegistryState::Running;
        tracing::info!(registry = %inner.id, "registry initialized");
        Ok(())
    }

    /// Stop reconciliation; idempotent
    ///
    /// Required before [`crate::snapshot::Snapshot::seal`] and before
    /// discarding the registry. Events arriving after this fail with
    /// `InvalidState` until the next `initialize`.
    pub fn stop(&self) {
        let mut inner = self.0.lock();
        if inner.state != RegistryState::Stopped {
            tracing::info!(registry = %inner.id, "registry stopped");
        }
        inner.state = RegistryState::Stopped;
    }

    /// Re-point the local folder after it vanished externally
    ///
    /// Leaves the shared side and the key untouched. The new location must
    /// exist and be writable.
    pub fn change_local_path(&self, new_path: impl Into<PathBuf>) -> Result<(), RegistryError> {
        let new_path = new_path.into();
        if !new_path.is_dir() {
            return Err(RegistryError::InvalidPath(new_path));
        }
        // writability is only observable by writing
        let probe = new_path.join(".pairlock-write-probe");
        if std::fs::write(&probe, b"").is_err() {
            return Err(RegistryError::InvalidPath(new_path));
        }
        let _ = std::fs::remove_file(&probe);

        let mut inner = self.0.lock();
        inner.local_path = new_path;
        Ok(())
    }

    /// Translate a path below the local folder to its shared counterpart
    ///
    /// Walks the tree segment by segment, creating entries for segments seen
    /// for the first time. Fails with `PathOutsideRegistry` for paths not
    /// below the local root or segments that cannot be matched or created.
    pub fn translate_to_shared(&self, path: &Path) -> Result<PathBuf, RegistryError> {
        let mut inner = self.0.lock();
        let rel = path
            .strip_prefix(inner.local_path.clone())
            .map_err(|_| RegistryError::PathOutsideRegistry(path.to_path_buf()))?
            .to_path_buf();
        if rel.as_os_str().is_empty() {
            return Ok(inner.shared_path.clone());
        }
        let entry = Self::walk_local(&mut inner, &rel, path)?;
        let encoded = inner.tree.encoded_path_of(entry)?;
        Ok(inner.shared_path.join(encoded))
    }

    /// Translate a path below the shared folder to its local counterpart
    ///
    /// Symmetric to [`Registry::translate_to_shared`]; unseen segments have
    /// their names decrypted to produce the local side. Reserved handshake
    /// names are never translated.
    pub fn translate_to_local(&self, path: &Path) -> Result<PathBuf, RegistryError> {
        let mut inner = self.0.lock();
        let rel = path
            .strip_prefix(inner.shared_path.clone())
            .map_err(|_| RegistryError::PathOutsideRegistry(path.to_path_buf()))?
            .to_path_buf();
        if rel.as_os_str().is_empty() {
            return Ok(inner.local_path.clone());
        }
        let entry = Self::walk_shared(&mut inner, &rel, path)?;
        let real = inner.tree.real_path_of(entry)?;
        Ok(inner.local_path.join(real))
    }

    /// Apply one filesystem event from either watched folder
    ///
    /// Called from the per-registry worker, so events are already serialized.
    /// Per-entry crypto failures log and return `Ok`; structural failures
    /// surface as errors.
    pub(crate) fn apply_event(
        &self,
        source: EventSource,
        event: WatchEvent,
    ) -> Result<(), RegistryError> {
        let mut inner = self.0.lock();
        if inner.state != RegistryState::Running {
            return Err(RegistryError::InvalidState("not running"));
        }
        // a vanished paired folder halts reconciliation until remediated
        if !inner.shared_path.is_dir() {
            let path = inner.shared_path.clone();
            inner.state = RegistryState::Stopped;
            return Err(RegistryError::ExternalFolderMissing(path));
        }
        if !inner.local_path.is_dir() {
            let path = inner.local_path.clone();
            inner.state = RegistryState::Stopped;
            return Err(RegistryError::ExternalFolderMissing(path));
        }

        match source {
            EventSource::Local => Self::apply_local_event(&mut inner, event),
            EventSource::Shared => Self::apply_shared_event(&mut inner, event),
        }
    }

    // --- reconciliation -------------------------------------------------

    fn reconcile_shared_dir(
        inner: &mut RegistryInner,
        folder: EntryId,
        shared_dir: &Path,
        local_dir: &Path,
    ) -> Result<(), RegistryError> {
        for dir_entry in std::fs::read_dir(shared_dir)? {
            let dir_entry = dir_entry?;
            let name = match dir_entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    tracing::warn!(?raw, "skipping non-UTF-8 name in shared folder");
                    continue;
                }
            };
            if is_reserved_name(&name) {
                continue;
            }

            if dir_entry.file_type()?.is_dir() {
                let id = match inner.tree.resolve_folder(folder, &name) {
                    Ok(id) => id,
                    Err(TreeError::NotFound(_)) => {
                        let real = match inner.key.decrypt_name(&name) {
                            Ok(real) => real,
                            Err(e) => {
                                tracing::warn!(encoded = %name, error = %e, "skipping undecryptable folder name");
                                continue;
                            }
                        };
                        inner
                            .tree
                            .new_folder(folder, &name, &real)
                            .map_err(|_| RegistryError::Conflict(real.clone()))?
                    }
                    Err(e) => return Err(e.into()),
                };
                let real = inner.tree.real_name(id)?.to_string();
                let local_sub = local_dir.join(&real);
                std::fs::create_dir_all(&local_sub)?;
                Self::reconcile_shared_dir(inner, id, &dir_entry.path(), &local_sub)?;
            } else {
                let id = match inner.tree.resolve_file(folder, &name) {
                    Ok(id) => id,
                    Err(TreeError::NotFound(_)) => {
                        let real = match inner.key.decrypt_name(&name) {
                            Ok(real) => real,
                            Err(e) => {
                                tracing::warn!(encoded = %name, error = %e, "skipping undecryptable file name");
                                continue;
                            }
                        };
                        inner
                            .tree
                            .new_file(folder, &name, &real)
                            .map_err(|_| RegistryError::Conflict(real.clone()))?
                    }
                    Err(e) => return Err(e.into()),
                };
                let real = inner.tree.real_name(id)?.to_string();
                let local_file = local_dir.join(&real);
                if !local_file.exists() {
                    let ciphertext = std::fs::read(dir_entry.path())?;
                    match inner.key.decrypt(&ciphertext) {
                        Ok(plaintext) => std::fs::write(&local_file, plaintext)?,
                        Err(e) => {
                            tracing::warn!(encoded = %name, error = %e, "skipping undecryptable file content");
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn reconcile_local_dir(
        inner: &mut RegistryInner,
        folder: EntryId,
        shared_dir: &Path,
        local_dir: &Path,
    ) -> Result<(), RegistryError> {
        for dir_entry in std::fs::read_dir(local_dir)? {
            let dir_entry = dir_entry?;
            let name = match dir_entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    tracing::warn!(?raw, "skipping non-UTF-8 name in local folder");
                    continue;
                }
            };

            if dir_entry.file_type()?.is_dir() {
                let id = match inner.tree.resolve_folder(folder, &name) {
                    Ok(id) => id,
                    Err(TreeError::NotFound(_)) => {
                        let encoded = inner.key.encrypt_name(&name)?;
                        inner
                            .tree
                            .new_folder(folder, &encoded, &name)
                            .map_err(|_| RegistryError::Conflict(name.clone()))?
                    }
                    Err(e) => return Err(e.into()),
                };
                let encoded = inner.tree.encoded_name(id)?.to_string();
                let shared_sub = shared_dir.join(&encoded);
                std::fs::create_dir_all(&shared_sub)?;
                Self::reconcile_local_dir(inner, id, &shared_sub, &dir_entry.path())?;
            } else {
                let id = match inner.tree.resolve_file(folder, &name) {
                    Ok(id) => id,
                    Err(TreeError::NotFound(_)) => {
                        let encoded = inner.key.encrypt_name(&name)?;
                        inner
                            .tree
                            .new_file(folder, &encoded, &name)
                            .map_err(|_| RegistryError::Conflict(name.clone()))?
                    }
                    Err(e) => return Err(e.into()),
                };
                let encoded = inner.tree.encoded_name(id)?.to_string();
                let shared_file = shared_dir.join(&encoded);
                if !shared_file.exists() {
                    let plaintext = std::fs::read(dir_entry.path())?;
                    let ciphertext = inner.key.encrypt(&plaintext)?;
                    std::fs::write(&shared_file, ciphertext)?;
                }
            }
        }
        Ok(())
    }

    // --- path walking ---------------------------------------------------

    /// Walk a local-relative path, creating entries for unseen segments
    ///
    /// `full_path` is consulted only to decide the kind of a new final
    /// segment (directory vs file); an absent path defaults to a file.
    fn walk_local(
        inner: &mut RegistryInner,
        rel: &Path,
        full_path: &Path,
    ) -> Result<EntryId, RegistryError> {
        let segments = Self::segments(rel, full_path)?;
        let mut folder = inner.tree.root();
        let last = segments.len().saturating_sub(1);

        for (i, segment) in segments.iter().enumerate() {
            let is_last = i == last;
            let want_dir = !is_last || full_path.is_dir();

            if is_last && !want_dir {
                match inner.tree.resolve_file(folder, segment) {
                    Ok(id) => return Ok(id),
                    Err(TreeError::NotFound(_)) => {
                        let encoded = inner
                            .key
                            .encrypt_name(segment)
                            .map_err(|_| RegistryError::PathOutsideRegistry(full_path.into()))?;
                        return inner
                            .tree
                            .new_file(folder, &encoded, segment)
                            .map_err(|_| RegistryError::PathOutsideRegistry(full_path.into()));
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            folder = match inner.tree.resolve_folder(folder, segment) {
                Ok(id) => id,
                Err(TreeError::NotFound(_)) => {
                    let encoded = inner
                        .key
                        .encrypt_name(segment)
                        .map_err(|_| RegistryError::PathOutsideRegistry(full_path.into()))?;
                    inner
                        .tree
                        .new_folder(folder, &encoded, segment)
                        .map_err(|_| RegistryError::PathOutsideRegistry(full_path.into()))?
                }
                Err(e) => return Err(e.into()),
            };
        }
        Ok(folder)
    }

    /// Walk a shared-relative path of encoded segments, decrypting unseen ones
    fn walk_shared(
        inner: &mut RegistryInner,
        rel: &Path,
        full_path: &Path,
    ) -> Result<EntryId, RegistryError> {
        let segments = Self::segments(rel, full_path)?;
        let mut folder = inner.tree.root();
        let last = segments.len().saturating_sub(1);

        for (i, segment) in segments.iter().enumerate() {
            if is_reserved_name(segment) {
                return Err(RegistryError::PathOutsideRegistry(full_path.into()));
            }
            let is_last = i == last;
            let want_dir = !is_last || full_path.is_dir();

            if is_last && !want_dir {
                match inner.tree.resolve_file(folder, segment) {
                    Ok(id) => return Ok(id),
                    Err(TreeError::NotFound(_)) => {
                        let real = inner.key.decrypt_name(segment).map_err(|e| {
                            tracing::warn!(encoded = %segment, error = %e, "undecryptable segment");
                            RegistryError::PathOutsideRegistry(full_path.into())
                        })?;
                        return inner
                            .tree
                            .new_file(folder, segment, &real)
                            .map_err(|_| RegistryError::PathOutsideRegistry(full_path.into()));
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            folder = match inner.tree.resolve_folder(folder, segment) {
                Ok(id) => id,
                Err(TreeError::NotFound(_)) => {
                    let real = inner.key.decrypt_name(segment).map_err(|e| {
                        tracing::warn!(encoded = %segment, error = %e, "undecryptable segment");
                        RegistryError::PathOutsideRegistry(full_path.into())
                    })?;
                    inner
                        .tree
                        .new_folder(folder, segment, &real)
                        .map_err(|_| RegistryError::PathOutsideRegistry(full_path.into()))?
                }
                Err(e) => return Err(e.into()),
            };
        }
        Ok(folder)
    }

    /// Walk a relative path without creating anything
    fn lookup(inner: &RegistryInner, rel: &Path) -> Result<EntryId, TreeError> {
        let mut folder = inner.tree.root();
        let mut segments = rel
            .iter()
            .map(|s| s.to_string_lossy().to_string())
            .collect::<Vec<_>>();
        let last = match segments.pop() {
            Some(last) => last,
            None => return Ok(folder),
        };
        for segment in &segments {
            folder = inner.tree.resolve_folder(folder, segment)?;
        }
        inner
            .tree
            .resolve_file(folder, &last)
            .or_else(|_| inner.tree.resolve_folder(folder, &last))
    }

    fn segments(rel: &Path, full_path: &Path) -> Result<Vec<String>, RegistryError> {
        let segments = rel
            .iter()
            .map(|s| {
                s.to_str()
                    .map(str::to_string)
                    .ok_or_else(|| RegistryError::PathOutsideRegistry(full_path.into()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        if segments.is_empty() {
            return Err(RegistryError::PathOutsideRegistry(full_path.into()));
        }
        Ok(segments)
    }

    // --- event application ----------------------------------------------

    fn apply_local_event(
        inner: &mut RegistryInner,
        event: WatchEvent,
    ) -> Result<(), RegistryError> {
        match event {
            WatchEvent::Created(path) | WatchEvent::Modified(path) => {
                let rel = Self::rel_to(&inner.local_path, &path)?;
                let entry = Self::walk_local(inner, &rel, &path)?;
                let target = inner.shared_path.join(inner.tree.encoded_path_of(entry)?);
                if path.is_dir() {
                    std::fs::create_dir_all(&target)?;
                } else if path.is_file() {
                    let plaintext = std::fs::read(&path)?;
                    let ciphertext = inner.key.encrypt(&plaintext)?;
                    std::fs::write(&target, ciphertext)?;
                }
                Ok(())
            }
            WatchEvent::Deleted(path) => {
                let rel = Self::rel_to(&inner.local_path, &path)?;
                let entry = match Self::lookup(inner, &rel) {
                    Ok(entry) => entry,
                    Err(TreeError::NotFound(name)) => {
                        tracing::debug!(%name, "deletion of untracked local entry ignored");
                        return Ok(());
                    }
                    Err(e) => return Err(e.into()),
                };
                let target = inner.shared_path.join(inner.tree.encoded_path_of(entry)?);
                inner.tree.detach(entry)?;
                Self::remove_counterpart(&target)
            }
            WatchEvent::Renamed { from, to } => {
                let rel_from = Self::rel_to(&inner.local_path, &from)?;
                let rel_to = Self::rel_to(&inner.local_path, &to)?;
                let entry = Self::lookup(inner, &rel_from)?;
                let old_target = inner.shared_path.join(inner.tree.encoded_path_of(entry)?);

                Self::reparent(inner, entry, &rel_from, &rel_to)?;

                let new_real = Self::leaf_name(&rel_to, &to)?;
                let new_encoded = inner.key.encrypt_name(&new_real)?;
                inner.tree.rename(entry, &new_encoded, &new_real)?;

                let new_target = inner.shared_path.join(inner.tree.encoded_path_of(entry)?);
                if old_target.exists() {
                    std::fs::rename(&old_target, &new_target)?;
                }
                Ok(())
            }
        }
    }

    fn apply_shared_event(
        inner: &mut RegistryInner,
        event: WatchEvent,
    ) -> Result<(), RegistryError> {
        match event {
            WatchEvent::Created(path) | WatchEvent::Modified(path) => {
                let rel = Self::rel_to(&inner.shared_path, &path)?;
                let entry = Self::walk_shared(inner, &rel, &path)?;
                let target = inner.local_path.join(inner.tree.real_path_of(entry)?);
                if path.is_dir() {
                    std::fs::create_dir_all(&target)?;
                } else if path.is_file() {
                    let ciphertext = std::fs::read(&path)?;
                    match inner.key.decrypt(&ciphertext) {
                        Ok(plaintext) => std::fs::write(&target, plaintext)?,
                        Err(e) => {
                            tracing::warn!(path = %path.display(), error = %e, "skipping undecryptable content");
                        }
                    }
                }
                Ok(())
            }
            WatchEvent::Deleted(path) => {
                let rel = Self::rel_to(&inner.shared_path, &path)?;
                let entry = match Self::lookup(inner, &rel) {
                    Ok(entry) => entry,
                    Err(TreeError::NotFound(name)) => {
                        tracing::debug!(%name, "deletion of untracked shared entry ignored");
                        return Ok(());
                    }
                    Err(e) => return Err(e.into()),
                };
                let target = inner.local_path.join(inner.tree.real_path_of(entry)?);
                inner.tree.detach(entry)?;
                Self::remove_counterpart(&target)
            }
            WatchEvent::Renamed { from, to } => {
                let rel_from = Self::rel_to(&inner.shared_path, &from)?;
                let rel_to = Self::rel_to(&inner.shared_path, &to)?;
                let entry = Self::lookup(inner, &rel_from)?;
                let old_target = inner.local_path.join(inner.tree.real_path_of(entry)?);

                Self::reparent(inner, entry, &rel_from, &rel_to)?;

                let new_encoded = Self::leaf_name(&rel_to, &to)?;
                let new_real = inner.key.decrypt_name(&new_encoded)?;
                inner.tree.rename(entry, &new_encoded, &new_real)?;

                let new_target = inner.local_path.join(inner.tree.real_path_of(entry)?);
                if old_target.exists() {
                    std::fs::rename(&old_target, &new_target)?;
                }
                Ok(())
            }
        }
    }

    /// Move `entry` when a rename also changed its parent directory
    fn reparent(
        inner: &mut RegistryInner,
        entry: EntryId,
        rel_from: &Path,
        rel_to: &Path,
    ) -> Result<(), RegistryError> {
        let from_parent = rel_from.parent().unwrap_or(Path::new(""));
        let to_parent = rel_to.parent().unwrap_or(Path::new(""));
        if from_parent == to_parent {
            return Ok(());
        }
        let new_parent = if to_parent.as_os_str().is_empty() {
            inner.tree.root()
        } else {
            Self::lookup(inner, to_parent)?
        };
        inner
            .tree
            .move_entry(entry, new_parent)
            .map_err(|e| match e {
                TreeError::DuplicateName(name) => RegistryError::Conflict(name),
                other => RegistryError::Tree(other),
            })?;
        Ok(())
    }

    fn leaf_name(rel: &Path, full_path: &Path) -> Result<String, RegistryError> {
        rel.file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| RegistryError::PathOutsideRegistry(full_path.into()))
    }

    fn rel_to(root: &Path, path: &Path) -> Result<PathBuf, RegistryError> {
        path.strip_prefix(root)
            .map(|p| p.to_path_buf())
            .map_err(|_| RegistryError::PathOutsideRegistry(path.to_path_buf()))
    }

    fn remove_counterpart(target: &Path) -> Result<(), RegistryError> {
        if target.is_dir() {
            std::fs::remove_dir_all(target)?;
        } else if target.is_file() {
            std::fs::remove_file(target)?;
        }
        Ok(())
    }
}
