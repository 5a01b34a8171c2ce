//! Entries: the path-addressed records held by snapshots and staging indexes.

use std::time::{SystemTime, UNIX_EPOCH};

use git2::{IndexEntry, IndexTime, ObjectType, Oid, TreeEntry};
use serde::Serialize;

use crate::error::{Error, Result};

/// Mode used for staged files unless the caller overrides it.
pub const DEFAULT_FILE_MODE: u32 = 0o100644;

/// Mode git uses for tree entries.
pub const TREE_MODE: u32 = 0o040000;

/// Whether an entry holds file content or a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryKind {
    Blob,
    Tree,
}

/// A path resolved against a snapshot or staging index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Entry {
    pub path: String,
    #[serde(serialize_with = "serialize_oid")]
    pub content_ref: Oid,
    pub mode: u32,
    pub dev: u32,
    pub ino: u32,
    pub uid: u32,
    pub gid: u32,
    /// Seconds since the epoch; zero for entries read from a tree.
    pub ctime: i64,
    pub mtime: i64,
    pub kind: EntryKind,
}

fn serialize_oid<S: serde::Serializer>(oid: &Oid, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&oid.to_string())
}

impl Entry {
    /// Build an entry from a tree entry found at `path`.
    pub fn from_tree_entry(path: &str, entry: &TreeEntry<'_>) -> Self {
        let kind = match entry.kind() {
            Some(ObjectType::Tree) => EntryKind::Tree,
            _ => EntryKind::Blob,
        };
        Self {
            path: path.to_string(),
            content_ref: entry.id(),
            mode: entry.filemode() as u32,
            dev: 0,
            ino: 0,
            uid: 0,
            gid: 0,
            ctime: 0,
            mtime: 0,
            kind,
        }
    }

    /// Build an entry from a staged index entry.
    pub fn from_index_entry(entry: &IndexEntry) -> Self {
        Self {
            path: String::from_utf8_lossy(&entry.path).into_owned(),
            content_ref: entry.id,
            mode: entry.mode,
            dev: entry.dev,
            ino: entry.ino,
            uid: entry.uid,
            gid: entry.gid,
            ctime: i64::from(entry.ctime.seconds()),
            mtime: i64::from(entry.mtime.seconds()),
            kind: if entry.mode == TREE_MODE {
                EntryKind::Tree
            } else {
                EntryKind::Blob
            },
        }
    }

    /// Entry for the root of a snapshot.
    pub fn root(tree: Oid) -> Self {
        Self {
            path: String::new(),
            content_ref: tree,
            mode: TREE_MODE,
            dev: 0,
            ino: 0,
            uid: 0,
            gid: 0,
            ctime: 0,
            mtime: 0,
            kind: EntryKind::Tree,
        }
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Tree
    }
}

/// Metadata overrides for a staged file. Unset fields take defaults.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryMetadata {
    pub mode: Option<u32>,
    pub dev: Option<u32>,
    pub ino: Option<u32>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
    pub ctime: Option<SystemTime>,
    pub mtime: Option<SystemTime>,
}

impl EntryMetadata {
    pub fn with_mode(mut self, mode: u32) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn with_mtime(mut self, mtime: SystemTime) -> Self {
        self.mtime = Some(mtime);
        self
    }

    /// Produce the index entry for `path` pointing at `content_ref`.
    pub(crate) fn to_index_entry(self, path: &str, content_ref: Oid, size: usize) -> IndexEntry {
        let now = SystemTime::now();
        IndexEntry {
            ctime: index_time(self.ctime.unwrap_or(now)),
            mtime: index_time(self.mtime.unwrap_or(now)),
            dev: self.dev.unwrap_or(0),
            ino: self.ino.unwrap_or(0),
            mode: self.mode.unwrap_or(DEFAULT_FILE_MODE),
            uid: self.uid.unwrap_or(0),
            gid: self.gid.unwrap_or(0),
            file_size: u32::try_from(size).unwrap_or(u32::MAX),
            id: content_ref,
            flags: 0,
            flags_extended: 0,
            path: path.as_bytes().to_vec(),
        }
    }
}

fn index_time(at: SystemTime) -> IndexTime {
    let since = at.duration_since(UNIX_EPOCH).unwrap_or_default();
    let seconds = i32::try_from(since.as_secs()).unwrap_or(i32::MAX);
    IndexTime::new(seconds, since.subsec_nanos())
}

/// Normalize a file path: strip leading separators and reject empty paths.
pub fn normalize_path(path: &str) -> Result<String> {
    let trimmed = path.trim_start_matches('/');
    if trimmed.is_empty() {
        return Err(Error::InvalidArgument(format!(
            "'{path}' does not name a file"
        )));
    }
    if trimmed.split('/').any(|part| part.is_empty() || part == "." || part == "..") {
        return Err(Error::InvalidArgument(format!(
            "'{path}' is not a normalized relative path"
        )));
    }
    Ok(trimmed.to_string())
}

/// Canonicalize a directory prefix so it always ends with a separator.
///
/// The root (empty or `/`) maps to the empty prefix, which matches every path.
pub fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{trimmed}/")
    }
}

/// Strip separators from a lookup path; the empty result names the root.
pub fn lookup_path(path: &str) -> &str {
    path.trim_matches('/')
}
