//! The entry tree: a hierarchical real-name / encoded-name mapping
//!
//! Every file and folder under a pairing is one entry. An entry knows both of
//! its names, the real name shown in the local folder and the encrypted name
//! stored in the shared folder, so a path on either side resolves to the
//! same node.
//!
//! Nodes live in an id-indexed arena owned by the tree. Children hold their
//! parent's id as a non-owning back-reference; ownership flows strictly
//! downward through the child id vectors, so the structure is a tree by
//! construction and serializes cleanly.
//!
//! Name uniqueness is case-insensitive and per kind: two files or two folders
//! with colliding names cannot share a parent, but a file and a folder can.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque handle to one entry in a tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(Uuid);

impl EntryId {
    fn new() -> Self {
        EntryId(Uuid::new_v4())
    }
}

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Whether an entry is a folder or a file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    Folder,
    File,
}

/// Errors raised by tree operations
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("no entry named {0:?} here")]
    NotFound(String),
    #[error("an entry named {0:?} already exists here")]
    DuplicateName(String),
    #[error("entry names must be non-empty")]
    EmptyName,
    #[error("moving {0} here would create a cycle")]
    Cycle(EntryId),
    #[error("entry {0} is not in this tree")]
    MissingEntry(EntryId),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FileEntry {
    encoded_name: String,
    real_name: String,
    parent: EntryId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct FolderEntry {
    encoded_name: String,
    real_name: String,
    /// None only for the root
    parent: Option<EntryId>,
    /// Insertion-ordered, deduplicated by id
    sub_folders: Vec<EntryId>,
    sub_files: Vec<EntryId>,
}

fn names_match(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// The real⇄encoded mapping for one pairing
///
/// The root folder carries no names of its own; it stands for the paired
/// directories themselves.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryTree {
    root: EntryId,
    folders: HashMap<EntryId, FolderEntry>,
    files: HashMap<EntryId, FileEntry>,
}

impl Default for EntryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl EntryTree {
    pub fn new() -> Self {
        let root = EntryId::new();
        let mut folders = HashMap::new();
        folders.insert(
            root,
            FolderEntry {
                encoded_name: String::new(),
                real_name: String::new(),
                parent: None,
                sub_folders: Vec::new(),
                sub_files: Vec::new(),
            },
        );
        EntryTree {
            root,
            folders,
            files: HashMap::new(),
        }
    }

    pub fn root(&self) -> EntryId {
        self.root
    }

    pub fn kind_of(&self, id: EntryId) -> Option<EntryKind> {
        if self.folders.contains_key(&id) {
            Some(EntryKind::Folder)
        } else if self.files.contains_key(&id) {
            Some(EntryKind::File)
        } else {
            None
        }
    }

    pub fn real_name(&self, id: EntryId) -> Result<&str, TreeError> {
        self.folders
            .get(&id)
            .map(|f| f.real_name.as_str())
            .or_else(|| self.files.get(&id).map(|f| f.real_name.as_str()))
            .ok_or(TreeError::MissingEntry(id))
    }

    pub fn encoded_name(&self, id: EntryId) -> Result<&str, TreeError> {
        self.folders
            .get(&id)
            .map(|f| f.encoded_name.as_str())
            .or_else(|| self.files.get(&id).map(|f| f.encoded_name.as_str()))
            .ok_or(TreeError::MissingEntry(id))
    }

    /// Parent of an entry, `None` for the root
    pub fn parent_of(&self, id: EntryId) -> Result<Option<EntryId>, TreeError> {
        if let Some(folder) = self.folders.get(&id) {
            return Ok(folder.parent);
        }
        if let Some(file) = self.files.get(&id) {
            return Ok(Some(file.parent));
        }
        Err(TreeError::MissingEntry(id))
    }

    pub fn sub_folders(&self, id: EntryId) -> Result<&[EntryId], TreeError> {
        self.folder(id).map(|f| f.sub_folders.as_slice())
    }

    pub fn sub_files(&self, id: EntryId) -> Result<&[EntryId], TreeError> {
        self.folder(id).map(|f| f.sub_files.as_slice())
    }

    fn folder(&self, id: EntryId) -> Result<&FolderEntry, TreeError> {
        self.folders.get(&id).ok_or(TreeError::MissingEntry(id))
    }

    fn folder_mut(&mut self, id: EntryId) -> Result<&mut FolderEntry, TreeError> {
        self.folders.get_mut(&id).ok_or(TreeError::MissingEntry(id))
    }

    /// Find a sub-file by either its real or encoded name, case-insensitively
    pub fn resolve_file(&self, folder: EntryId, name: &str) -> Result<EntryId, TreeError> {
        let f = self.folder(folder)?;
        f.sub_files
            .iter()
            .copied()
            .find(|id| {
                self.files
                    .get(id)
                    .map(|e| names_match(&e.real_name, name) || names_match(&e.encoded_name, name))
                    .unwrap_or(false)
            })
            .ok_or_else(|| TreeError::NotFound(name.to_string()))
    }

    /// Find a sub-folder by either its real or encoded name, case-insensitively
    pub fn resolve_folder(&self, folder: EntryId, name: &str) -> Result<EntryId, TreeError> {
        let f = self.folder(folder)?;
        f.sub_folders
            .iter()
            .copied()
            .find(|id| {
                self.folders
                    .get(id)
                    .map(|e| names_match(&e.real_name, name) || names_match(&e.encoded_name, name))
                    .unwrap_or(false)
            })
            .ok_or_else(|| TreeError::NotFound(name.to_string()))
    }

    /// Either name of any sibling of `kind` under `parent` collides with `name`?
    fn sibling_collision(
        &self,
        parent: &FolderEntry,
        kind: EntryKind,
        name: &str,
        exclude: Option<EntryId>,
    ) -> bool {
        let check = |real: &str, encoded: &str| {
            names_match(real, name) || names_match(encoded, name)
        };
        match kind {
            EntryKind::File => parent.sub_files.iter().any(|id| {
                Some(*id) != exclude
                    && self
                        .files
                        .get(id)
                        .map(|e| check(&e.real_name, &e.encoded_name))
                        .unwrap_or(false)
            }),
            EntryKind::Folder => parent.sub_folders.iter().any(|id| {
                Some(*id) != exclude
                    && self
                        .folders
                        .get(id)
                        .map(|e| check(&e.real_name, &e.encoded_name))
                        .unwrap_or(false)
            }),
        }
    }

    fn check_names(
        &self,
        parent: EntryId,
        kind: EntryKind,
        encoded: &str,
        real: &str,
        exclude: Option<EntryId>,
    ) -> Result<(), TreeError> {
        if encoded.is_empty() || real.is_empty() {
            return Err(TreeError::EmptyName);
        }
        let p = self.folder(parent)?;
        if self.sibling_collision(p, kind, real, exclude) {
            return Err(TreeError::DuplicateName(real.to_string()));
        }
        if self.sibling_collision(p, kind, encoded, exclude) {
            return Err(TreeError::DuplicateName(encoded.to_string()));
        }
        Ok(())
    }

    /// Create a file entry and attach it under `parent`
    ///
    /// The tree is unchanged when this fails.
    pub fn new_file(
        &mut self,
        parent: EntryId,
        encoded: &str,
        real: &str,
    ) -> Result<EntryId, TreeError> {
        self.check_names(parent, EntryKind::File, encoded, real, None)?;
        let id = EntryId::new();
        self.files.insert(
            id,
            FileEntry {
                encoded_name: encoded.to_string(),
                real_name: real.to_string(),
                parent,
            },
        );
        self.folder_mut(parent)?.sub_files.push(id);
        Ok(id)
    }

    /// Create a folder entry and attach it under `parent`
    ///
    /// The tree is unchanged when this fails.
    pub fn new_folder(
        &mut self,
        parent: EntryId,
        encoded: &str,
        real: &str,
    ) -> Result<EntryId, TreeError> {
        self.check_names(parent, EntryKind::Folder, encoded, real, None)?;
        let id = EntryId::new();
        self.folders.insert(
            id,
            FolderEntry {
                encoded_name: encoded.to_string(),
                real_name: real.to_string(),
                parent: Some(parent),
                sub_folders: Vec::new(),
                sub_files: Vec::new(),
            },
        );
        self.folder_mut(parent)?.sub_folders.push(id);
        Ok(id)
    }

    /// All entries of the subtree rooted at `id`, depth-first, `id` first
    pub fn subtree(&self, id: EntryId) -> Result<Vec<EntryId>, TreeError> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Some(folder) = self.folders.get(&current) {
                stack.extend(folder.sub_files.iter().copied());
                stack.extend(folder.sub_folders.iter().copied());
            } else if !self.files.contains_key(&current) {
                return Err(TreeError::MissingEntry(current));
            }
        }
        Ok(out)
    }

    /// Detach an entry from its parent and drop it from the tree
    ///
    /// Polymorphic over kind: the entry is removed from whichever child
    /// collection holds it. Detaching a folder removes its entire subtree as
    /// one unit; no partially detached subtree stays reachable.
    pub fn detach(&mut self, id: EntryId) -> Result<(), TreeError> {
        if id == self.root {
            return Err(TreeError::MissingEntry(id));
        }
        let parent = self
            .parent_of(id)?
            .ok_or(TreeError::MissingEntry(id))?;
        let doomed = self.subtree(id)?;

        let p = self.folder_mut(parent)?;
        p.sub_folders.retain(|c| *c != id);
        p.sub_files.retain(|c| *c != id);

        for entry in doomed {
            self.folders.remove(&entry);
            self.files.remove(&entry);
        }
        Ok(())
    }

    /// Re-parent an entry, as for a move between directories
    ///
    /// Rejects moving a folder under itself or any of its descendants, and
    /// name collisions in the destination. The tree is unchanged on failure.
    pub fn move_entry(&mut self, id: EntryId, new_parent: EntryId) -> Result<(), TreeError> {
        let kind = self.kind_of(id).ok_or(TreeError::MissingEntry(id))?;
        let old_parent = self
            .parent_of(id)?
            .ok_or(TreeError::MissingEntry(id))?;

        // walk up from the destination; hitting `id` means a cycle
        let mut cursor = Some(new_parent);
        while let Some(current) = cursor {
            if current == id {
                return Err(TreeError::Cycle(id));
            }
            cursor = self.parent_of(current)?;
        }

        let encoded = self.encoded_name(id)?.to_string();
        let real = self.real_name(id)?.to_string();
        self.check_names(new_parent, kind, &encoded, &real, Some(id))?;

        let old = self.folder_mut(old_parent)?;
        old.sub_folders.retain(|c| *c != id);
        old.sub_files.retain(|c| *c != id);

        match kind {
            EntryKind::Folder => {
                self.folder_mut(new_parent)?.sub_folders.push(id);
                if let Some(folder) = self.folders.get_mut(&id) {
                    folder.parent = Some(new_parent);
                }
            }
            EntryKind::File => {
                self.folder_mut(new_parent)?.sub_files.push(id);
                if let Some(file) = self.files.get_mut(&id) {
                    file.parent = new_parent;
                }
            }
        }
        Ok(())
    }

    /// Replace both names of an entry, as for a rename event
    pub fn rename(
        &mut self,
        id: EntryId,
        encoded: &str,
        real: &str,
    ) -> Result<(), TreeError> {
        let kind = self.kind_of(id).ok_or(TreeError::MissingEntry(id))?;
        let parent = self
            .parent_of(id)?
            .ok_or(TreeError::MissingEntry(id))?;
        self.check_names(parent, kind, encoded, real, Some(id))?;

        match kind {
            EntryKind::Folder => {
                if let Some(folder) = self.folders.get_mut(&id) {
                    folder.encoded_name = encoded.to_string();
                    folder.real_name = real.to_string();
                }
            }
            EntryKind::File => {
                if let Some(file) = self.files.get_mut(&id) {
                    file.encoded_name = encoded.to_string();
                    file.real_name = real.to_string();
                }
            }
        }
        Ok(())
    }

    /// Path of real-name segments from the root down to `id` (root excluded)
    pub fn real_path_of(&self, id: EntryId) -> Result<PathBuf, TreeError> {
        self.path_of(id, |tree, e| tree.real_name(e).map(str::to_string))
    }

    /// Path of encoded-name segments from the root down to `id` (root excluded)
    pub fn encoded_path_of(&self, id: EntryId) -> Result<PathBuf, TreeError> {
        self.path_of(id, |tree, e| tree.encoded_name(e).map(str::to_string))
    }

    fn path_of(
        &self,
        id: EntryId,
        name_of: impl Fn(&Self, EntryId) -> Result<String, TreeError>,
    ) -> Result<PathBuf, TreeError> {
        let mut segments = Vec::new();
        let mut cursor = id;
        while cursor != self.root {
            segments.push(name_of(self, cursor)?);
            cursor = self
                .parent_of(cursor)?
                .ok_or(TreeError::MissingEntry(cursor))?;
        }
        Ok(segments.iter().rev().collect())
    }

    /// Total number of entries, the root included
    pub fn len(&self) -> usize {
        self.folders.len() + self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }
}
