//! Entry tree arena.
//!
//! Entries live in a flat `Vec` owned by the tree and refer to each other by
//! `EntryId`. Paths are unique and stable; the tree shape is fixed once built,
//! only state and progress fields change afterwards.

use crate::entry::state::EntryState;
use crate::error::{ArchiveError, ErrorKind};
use crate::transport::{RemoteFile, RemoteFolder};
use std::collections::HashMap;
use std::fmt;

/// Index of an entry inside its tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryId(usize);

impl EntryId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Static facts about a file stored in the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ArchiveMember {
    /// Position in the archive's central directory
    pub index: usize,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    pub crc32: u32,
}

#[derive(Debug, Clone)]
pub enum EntryKind {
    File(ArchiveMember),
    Directory { children: Vec<EntryId> },
}

/// `{previous, current, total}` counters reported by a collaborator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TransferProgress {
    pub previous: u64,
    pub current: u64,
    pub total: u64,
}

impl TransferProgress {
    pub fn reset(&mut self) {
        *self = TransferProgress::default();
    }

    /// Record a new report; returns the raw step since the last one.
    pub fn advance(&mut self, current: u64, total: u64) -> u64 {
        self.previous = self.current;
        self.current = current;
        self.total = total;
        self.current.saturating_sub(self.previous)
    }
}

/// Handle of the remote object created for an entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteObject {
    Folder(RemoteFolder),
    File(RemoteFile),
}

/// One file or folder of the archive
#[derive(Debug, Clone)]
pub struct Entry {
    id: EntryId,
    path: String,
    name: String,
    parent: Option<EntryId>,
    kind: EntryKind,

    pub(crate) state: EntryState,
    /// Container the entry is uploaded into; set right before its work item runs
    pub(crate) destination_id: Option<String>,
    pub(crate) remote: Option<RemoteObject>,
    pub(crate) upload_error: Option<ErrorKind>,
    pub(crate) message: Option<String>,
    pub(crate) decompression: TransferProgress,
    pub(crate) upload: TransferProgress,
}

impl Entry {
    fn new(id: EntryId, path: String, name: String, parent: Option<EntryId>, kind: EntryKind) -> Self {
        Self {
            id,
            path,
            name,
            parent,
            kind,
            state: EntryState::Default,
            destination_id: None,
            remote: None,
            upload_error: None,
            message: None,
            decompression: TransferProgress::default(),
            upload: TransferProgress::default(),
        }
    }

    pub fn id(&self) -> EntryId {
        self.id
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<EntryId> {
        self.parent
    }

    pub fn kind(&self) -> &EntryKind {
        &self.kind
    }

    pub fn is_directory(&self) -> bool {
        matches!(self.kind, EntryKind::Directory { .. })
    }

    pub fn member(&self) -> Option<&ArchiveMember> {
        match &self.kind {
            EntryKind::File(member) => Some(member),
            EntryKind::Directory { .. } => None,
        }
    }

    pub fn children(&self) -> &[EntryId] {
        match &self.kind {
            EntryKind::Directory { children } => children,
            EntryKind::File(_) => &[],
        }
    }

    /// Zero for directories
    pub fn compressed_size(&self) -> u64 {
        self.member().map_or(0, |m| m.compressed_size)
    }

    /// Zero for directories
    pub fn uncompressed_size(&self) -> u64 {
        self.member().map_or(0, |m| m.uncompressed_size)
    }

    pub fn state(&self) -> EntryState {
        self.state
    }

    pub fn destination_id(&self) -> Option<&str> {
        self.destination_id.as_deref()
    }

    pub fn folder(&self) -> Option<&RemoteFolder> {
        match &self.remote {
            Some(RemoteObject::Folder(folder)) => Some(folder),
            _ => None,
        }
    }

    pub fn file(&self) -> Option<&RemoteFile> {
        match &self.remote {
            Some(RemoteObject::File(file)) => Some(file),
            _ => None,
        }
    }

    pub fn upload_error(&self) -> Option<ErrorKind> {
        self.upload_error
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn decompression_progress(&self) -> TransferProgress {
        self.decompression
    }

    pub fn upload_progress(&self) -> TransferProgress {
        self.upload
    }

    /// Failed upload caused by missing authorization
    pub fn has_auth_error(&self) -> bool {
        self.state == EntryState::UploadError && self.upload_error == Some(ErrorKind::Auth)
    }
}

/// Arena holding the whole archive hierarchy
#[derive(Debug, Clone)]
pub struct EntryTree {
    entries: Vec<Entry>,
    by_path: HashMap<String, EntryId>,
}

impl EntryTree {
    /// Create a tree holding only the root directory. The root's path is `""`.
    pub fn new(root_name: impl Into<String>) -> Self {
        let root = Entry::new(
            EntryId(0),
            String::new(),
            root_name.into(),
            None,
            EntryKind::Directory {
                children: Vec::new(),
            },
        );
        let mut by_path = HashMap::new();
        by_path.insert(String::new(), EntryId(0));
        Self {
            entries: vec![root],
            by_path,
        }
    }

    pub fn root(&self) -> EntryId {
        EntryId(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// A tree always holds its root
    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn get(&self, id: EntryId) -> &Entry {
        &self.entries[id.0]
    }

    pub(crate) fn get_mut(&mut self, id: EntryId) -> &mut Entry {
        &mut self.entries[id.0]
    }

    pub fn lookup(&self, path: &str) -> Option<EntryId> {
        self.by_path.get(normalize(path).as_str()).copied()
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.entries.iter()
    }

    pub fn children(&self, id: EntryId) -> &[EntryId] {
        self.get(id).children()
    }

    /// Pre-order walk over every entry below `id`, excluding `id` itself
    pub fn descendants(&self, id: EntryId) -> Descendants<'_> {
        let mut stack: Vec<EntryId> = self.children(id).to_vec();
        stack.reverse();
        Descendants { tree: self, stack }
    }

    /// Pre-order walk over the whole tree, root first
    pub fn walk(&self) -> impl Iterator<Item = EntryId> + '_ {
        std::iter::once(self.root()).chain(self.descendants(self.root()))
    }

    /// Add a directory, creating missing ancestors. Adding an existing
    /// directory returns its id.
    pub fn add_directory(&mut self, path: &str) -> Result<EntryId, ArchiveError> {
        let path = normalize(path);
        if let Some(&id) = self.by_path.get(&path) {
            if self.get(id).is_directory() {
                return Ok(id);
            }
            return Err(ArchiveError::DuplicatePath(path));
        }
        let (parent, name) = self.ensure_parent(&path)?;
        Ok(self.insert(parent, path, name, EntryKind::Directory { children: Vec::new() }))
    }

    /// Add a file, creating missing ancestor directories
    pub fn add_file(&mut self, path: &str, member: ArchiveMember) -> Result<EntryId, ArchiveError> {
        let path = normalize(path);
        if path.is_empty() {
            return Err(ArchiveError::InvalidPath(path));
        }
        if self.by_path.contains_key(&path) {
            return Err(ArchiveError::DuplicatePath(path));
        }
        let (parent, name) = self.ensure_parent(&path)?;
        Ok(self.insert(parent, path, name, EntryKind::File(member)))
    }

    fn ensure_parent(&mut self, path: &str) -> Result<(EntryId, String), ArchiveError> {
        match path.rsplit_once('/') {
            Some((parent_path, name)) => {
                let parent = self.add_directory(parent_path)?;
                Ok((parent, name.to_string()))
            }
            None => Ok((self.root(), path.to_string())),
        }
    }

    fn insert(&mut self, parent: EntryId, path: String, name: String, kind: EntryKind) -> EntryId {
        let id = EntryId(self.entries.len());
        self.entries
            .push(Entry::new(id, path.clone(), name, Some(parent), kind));
        self.by_path.insert(path, id);
        if let EntryKind::Directory { children } = &mut self.entries[parent.0].kind {
            children.push(id);
        }
        id
    }
}

/// Iterator returned by [`EntryTree::descendants`]
pub struct Descendants<'a> {
    tree: &'a EntryTree,
    stack: Vec<EntryId>,
}

impl Iterator for Descendants<'_> {
    type Item = EntryId;

    fn next(&mut self) -> Option<EntryId> {
        let id = self.stack.pop()?;
        self.stack
            .extend(self.tree.children(id).iter().rev().copied());
        Some(id)
    }
}

/// Strip leading/trailing separators and collapse empty components
fn normalize(path: &str) -> String {
    path.split('/')
        .filter(|c| !c.is_empty() && *c != ".")
        .collect::<Vec<_>>()
        .join("/")
}
