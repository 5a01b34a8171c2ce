//! Staging index: the mutable, per-session copy of a snapshot.
//!
//! A [`StagingIndex`] is seeded from exactly one base commit (or starts empty
//! for a store with no history), collects edits in an in-memory libgit2 index,
//! and is frozen into a tree when a commit is built. It never touches the
//! repository's on-disk index or working directory.

use std::path::Path;

use git2::{Index, IndexEntry, Oid, Repository};
use tracing::debug;

use crate::entry::{self, Entry, EntryMetadata};
use crate::error::{Error, Result};

/// Mutable path -> entry mapping derived from one base snapshot.
pub struct StagingIndex<'repo> {
    repo: &'repo Repository,
    index: Index,
    base: Option<Oid>,
}

impl std::fmt::Debug for StagingIndex<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StagingIndex")
            .field("base", &self.base)
            .field("entries", &self.index.len())
            .finish()
    }
}

impl<'repo> StagingIndex<'repo> {
    /// Create an index seeded from `base` (a commit), or empty when `None`.
    pub fn new(repo: &'repo Repository, base: Option<Oid>) -> Result<Self> {
        let mut index = Index::new()?;
        if let Some(oid) = base {
            let tree = repo.find_commit(oid)?.tree()?;
            index.read_tree(&tree)?;
        }
        Ok(Self { repo, index, base })
    }

    /// Commit this index was seeded from.
    pub fn base(&self) -> Option<Oid> {
        self.base
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Store `content` and stage it at `path`, replacing any staged file.
    ///
    /// A staged directory at `path`, or a staged file at one of its ancestors,
    /// is an error rather than being silently replaced.
    pub fn add(&mut self, path: &str, content: &[u8], metadata: EntryMetadata) -> Result<Entry> {
        let path = entry::normalize_path(path)?;
        self.check_file_destination(&path, None)?;
        let content_ref = self.repo.blob(content)?;
        let index_entry = metadata.to_index_entry(&path, content_ref, content.len());
        self.index.add(&index_entry)?;
        debug!(path = %path, blob = %content_ref, "staged entry");
        Ok(Entry::from_index_entry(&index_entry))
    }

    /// Staged entry at `path`, if any.
    pub fn get(&self, path: &str) -> Option<Entry> {
        let path = entry::normalize_path(path).ok()?;
        self.index
            .get_path(Path::new(&path), 0)
            .map(|index_entry| Entry::from_index_entry(&index_entry))
    }

    pub fn exists(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    /// Read the staged content at `path`.
    pub fn read(&self, path: &str) -> Result<Vec<u8>> {
        let staged = self
            .get(path)
            .ok_or_else(|| Error::EntryMissing(path.to_string()))?;
        let blob = self.repo.find_blob(staged.content_ref)?;
        Ok(blob.content().to_vec())
    }

    /// Every staged path, in index order.
    pub fn paths(&self) -> Vec<String> {
        self.index
            .iter()
            .map(|index_entry| String::from_utf8_lossy(&index_entry.path).into_owned())
            .collect()
    }

    /// Unstage `path`. Removing an absent path is a no-op.
    pub fn remove(&mut self, path: &str) -> Result<()> {
        let path = entry::normalize_path(path)?;
        if self.index.get_path(Path::new(&path), 0).is_some() {
            self.index.remove(Path::new(&path), 0)?;
            debug!(path = %path, "unstaged entry");
        }
        Ok(())
    }

    /// Unstage every entry under `prefix`. Returns how many were removed.
    pub fn remove_subtree(&mut self, prefix: &str) -> Result<usize> {
        let prefix = entry::normalize_prefix(prefix);
        let doomed: Vec<String> = self
            .paths()
            .into_iter()
            .filter(|path| path.starts_with(&prefix))
            .collect();
        for path in &doomed {
            self.index.remove(Path::new(path), 0)?;
        }
        debug!(prefix = %prefix, removed = doomed.len(), "unstaged subtree");
        Ok(doomed.len())
    }

    /// A file may land at `path` only if no directory is staged there and no
    /// ancestor of `path` is a staged file (other than `leaving`, which is
    /// about to be removed).
    fn check_file_destination(&self, path: &str, leaving: Option<&str>) -> Result<()> {
        let dir_prefix = format!("{path}/");
        if self
            .index
            .iter()
            .any(|index_entry| index_entry.path.starts_with(dir_prefix.as_bytes()))
        {
            return Err(Error::DirectoryAlreadyExists(path.to_string()));
        }

        let mut ancestor = path;
        while let Some((parent, _)) = ancestor.rsplit_once('/') {
            if Some(parent) != leaving && self.index.get_path(Path::new(parent), 0).is_some() {
                return Err(Error::EntryNotADirectory(parent.to_string()));
            }
            ancestor = parent;
        }
        Ok(())
    }

    /// Re-stage the entry at `old` under `new`. No-op when `old` is absent.
    ///
    /// Fails without touching the index when `new` names a staged directory
    /// or lies under a staged file.
    pub fn move_file(&mut self, old: &str, new: &str) -> Result<()> {
        let old = entry::normalize_path(old)?;
        let new = entry::normalize_path(new)?;
        let Some(source) = self.index.get_path(Path::new(&old), 0) else {
            return Ok(());
        };
        if old == new {
            return Ok(());
        }
        self.check_file_destination(&new, Some(&old))?;
        self.index.remove(Path::new(&old), 0)?;
        if let Err(err) = self.index.add(&relocate(&source, &new)) {
            self.index.add(&source)?;
            return Err(Error::Git(err));
        }
        debug!(from = %old, to = %new, "moved entry");
        Ok(())
    }

    /// Rewrite every path under `old` to live under `new`.
    ///
    /// Fails with [`Error::DirectoryAlreadyExists`] when anything is already
    /// staged at the destination; the index is left unmodified in that case.
    pub fn move_subtree(&mut self, old: &str, new: &str) -> Result<usize> {
        let old_prefix = entry::normalize_prefix(old);
        let new_prefix = entry::normalize_prefix(new);
        if old_prefix.is_empty() || new_prefix.is_empty() {
            return Err(Error::InvalidArgument(
                "the root directory cannot be moved or replaced".to_string(),
            ));
        }
        if new_prefix.starts_with(&old_prefix) {
            return Err(Error::InvalidArgument(format!(
                "cannot move '{old}' into itself ('{new}')"
            )));
        }

        let paths = self.paths();
        let new_file = new_prefix.trim_end_matches('/');
        if paths
            .iter()
            .any(|path| path.starts_with(&new_prefix) || path == new_file)
        {
            return Err(Error::DirectoryAlreadyExists(new_file.to_string()));
        }
        self.check_file_destination(new_file, None)?;

        let sources: Vec<IndexEntry> = self
            .index
            .iter()
            .filter(|index_entry| index_entry.path.starts_with(old_prefix.as_bytes()))
            .collect();
        for source in &sources {
            let old_path = String::from_utf8_lossy(&source.path).into_owned();
            let suffix = &old_path[old_prefix.len()..];
            self.index.add(&relocate(source, &format!("{new_prefix}{suffix}")))?;
            self.index.remove(Path::new(&old_path), 0)?;
        }
        debug!(from = %old_prefix, to = %new_prefix, moved = sources.len(), "moved subtree");
        Ok(sources.len())
    }

    /// Freeze the current mapping into a tree object.
    pub fn write_tree(&mut self) -> Result<Oid> {
        Ok(self.index.write_tree_to(self.repo)?)
    }
}

fn relocate(source: &IndexEntry, path: &str) -> IndexEntry {
    IndexEntry {
        ctime: source.ctime,
        mtime: source.mtime,
        dev: source.dev,
        ino: source.ino,
        mode: source.mode,
        uid: source.uid,
        gid: source.gid,
        file_size: source.file_size,
        id: source.id,
        flags: 0,
        flags_extended: 0,
        path: path.as_bytes().to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn scratch_repo() -> (TempDir, Repository) {
        let temp = TempDir::new().unwrap();
        let repo = Repository::init_bare(temp.path()).unwrap();
        (temp, repo)
    }

    #[test]
    fn add_then_read_round_trips() {
        let (_temp, repo) = scratch_repo();
        let mut staging = StagingIndex::new(&repo, None).unwrap();

        staging.add("/docs/a.txt", b"hello", EntryMetadata::default()).unwrap();

        assert_eq!(staging.read("docs/a.txt").unwrap(), b"hello");
        assert!(staging.exists("/docs/a.txt"));
    }

    #[test]
    fn remove_missing_is_noop() {
        let (_temp, repo) = scratch_repo();
        let mut staging = StagingIndex::new(&repo, None).unwrap();

        staging.remove("nope.txt").unwrap();
        assert!(staging.is_empty());
    }

    #[test]
    fn remove_subtree_does_not_match_partial_names() {
        let (_temp, repo) = scratch_repo();
        let mut staging = StagingIndex::new(&repo, None).unwrap();
        staging.add("foo/a.txt", b"a", EntryMetadata::default()).unwrap();
        staging.add("foobar/b.txt", b"b", EntryMetadata::default()).unwrap();

        let removed = staging.remove_subtree("foo").unwrap();

        assert_eq!(removed, 1);
        assert_eq!(staging.paths(), vec!["foobar/b.txt".to_string()]);
    }

    #[test]
    fn move_subtree_into_itself_is_rejected() {
        let (_temp, repo) = scratch_repo();
        let mut staging = StagingIndex::new(&repo, None).unwrap();
        staging.add("a/x.txt", b"x", EntryMetadata::default()).unwrap();

        let err = staging.move_subtree("a", "a/b").unwrap_err();
        assert!(matches!(err, Error::InvalidArgument(_)));
    }

    #[test]
    fn move_subtree_onto_file_collides() {
        let (_temp, repo) = scratch_repo();
        let mut staging = StagingIndex::new(&repo, None).unwrap();
        staging.add("a/x.txt", b"x", EntryMetadata::default()).unwrap();
        staging.add("b", b"file", EntryMetadata::default()).unwrap();

        let err = staging.move_subtree("a", "b").unwrap_err();
        assert!(matches!(err, Error::DirectoryAlreadyExists(ref p) if p == "b"));
        assert!(staging.exists("a/x.txt"));
    }
}
