//! Entry catalog: path lookups and traversals against historical snapshots.
//!
//! Snapshots are addressed by an [`Oid`] that peels to a tree (a commit or a
//! tree id). Lookups return `Ok(None)` for absent paths; callers that need
//! the path to exist use [`read_file`] or raise [`Error::EntryMissing`]
//! themselves.

use std::path::Path;

use chrono::{DateTime, Utc};
use git2::{Commit, DiffOptions, ErrorCode, ObjectType, Oid, Repository, Sort, Tree};
use serde::Serialize;

use crate::entry::{self, Entry};
use crate::error::{Error, Result};

/// Resolve a snapshot id (commit or tree) to its tree.
pub fn snapshot_tree(repo: &Repository, snapshot: Oid) -> Result<Tree<'_>> {
    let object = repo.find_object(snapshot, None)?;
    Ok(object.peel_to_tree()?)
}

/// Resolve `path` against a snapshot. The empty path names the root tree.
pub fn find_entry(repo: &Repository, snapshot: Oid, path: &str) -> Result<Option<Entry>> {
    let tree = snapshot_tree(repo, snapshot)?;
    let path = entry::lookup_path(path);
    if path.is_empty() {
        return Ok(Some(Entry::root(tree.id())));
    }

    match tree.get_path(Path::new(path)) {
        Ok(tree_entry) => Ok(Some(Entry::from_tree_entry(path, &tree_entry))),
        Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
        Err(err) => Err(Error::Git(err)),
    }
}

/// Names of the immediate children of the directory at `path`.
pub fn list_entries(repo: &Repository, snapshot: Oid, path: &str) -> Result<Vec<String>> {
    let dir = find_entry(repo, snapshot, path)?
        .ok_or_else(|| Error::EntryMissing(path.to_string()))?;
    if !dir.is_dir() {
        return Err(Error::EntryNotADirectory(path.to_string()));
    }

    let tree = repo.find_tree(dir.content_ref)?;
    Ok(tree
        .iter()
        .map(|child| String::from_utf8_lossy(child.name_bytes()).into_owned())
        .collect())
}

/// Read the file content at `path`.
pub fn read_file(repo: &Repository, snapshot: Oid, path: &str) -> Result<Vec<u8>> {
    let file = find_entry(repo, snapshot, path)?
        .ok_or_else(|| Error::EntryMissing(path.to_string()))?;
    if file.is_dir() {
        return Err(Error::InvalidArgument(format!("'{path}' is a directory")));
    }
    let blob = repo.find_blob(file.content_ref)?;
    Ok(blob.content().to_vec())
}

/// Lazy pre-order walk over every file path in a snapshot.
///
/// The walk is `Clone`, so a copy taken before iterating restarts from the
/// beginning.
pub fn list_all_paths(repo: &Repository, snapshot: Oid) -> Result<PathWalk<'_>> {
    let tree = snapshot_tree(repo, snapshot)?;
    Ok(PathWalk {
        repo,
        stack: vec![(String::new(), tree, 0)],
    })
}

/// Every file path in a snapshot, optionally filtered by a glob pattern.
pub fn file_list(repo: &Repository, snapshot: Oid, pattern: Option<&str>) -> Result<Vec<String>> {
    let matcher = match pattern {
        Some(pattern) => Some(glob::Pattern::new(pattern).map_err(|err| {
            Error::InvalidArgument(format!("invalid path pattern '{pattern}': {err}"))
        })?),
        None => None,
    };

    let mut paths = Vec::new();
    for path in list_all_paths(repo, snapshot)? {
        let path = path?;
        let matches = match &matcher {
            Some(glob) => glob.matches(&path),
            None => true,
        };
        if matches {
            paths.push(path);
        }
    }
    Ok(paths)
}

/// Iterator returned by [`list_all_paths`].
#[derive(Clone)]
pub struct PathWalk<'repo> {
    repo: &'repo Repository,
    stack: Vec<(String, Tree<'repo>, usize)>,
}

impl Iterator for PathWalk<'_> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            // TreeEntry borrows the tree on the stack; copy out what we need.
            let step = {
                let (prefix, tree, position) = self.stack.last_mut()?;
                tree.get(*position).map(|child| {
                    *position += 1;
                    let name = String::from_utf8_lossy(child.name_bytes()).into_owned();
                    (format!("{prefix}{name}"), child.id(), child.kind())
                })
            };

            match step {
                None => {
                    self.stack.pop();
                }
                Some((path, id, Some(ObjectType::Tree))) => match self.repo.find_tree(id) {
                    Ok(subtree) => self.stack.push((format!("{path}/"), subtree, 0)),
                    Err(err) => return Some(Err(Error::Git(err))),
                },
                Some((path, _, _)) => return Some(Ok(path)),
            }
        }
    }
}

/// The most recent commit that touched a path.
#[derive(Debug, Clone, Serialize)]
pub struct FileRevision {
    pub commit: String,
    pub author: String,
    pub email: String,
    pub time: DateTime<Utc>,
    pub summary: String,
}

impl FileRevision {
    fn from_commit(commit: &Commit<'_>) -> Self {
        let author = commit.author();
        Self {
            commit: commit.id().to_string(),
            author: author.name().unwrap_or_default().to_string(),
            email: author.email().unwrap_or_default().to_string(),
            time: DateTime::from_timestamp(commit.time().seconds(), 0).unwrap_or_default(),
            summary: commit.summary().unwrap_or_default().to_string(),
        }
    }
}

/// Walk history from `start` newest-first by commit date and report the first
/// commit whose change set touches `path`.
///
/// This is a linear scan over history; nothing is indexed.
pub fn file_history(repo: &Repository, start: Oid, path: &str) -> Result<Option<FileRevision>> {
    let path = entry::lookup_path(path);
    let mut revwalk = repo.revwalk()?;
    revwalk.push(start)?;
    revwalk.set_sorting(Sort::TIME)?;

    for oid in revwalk {
        let commit = repo.find_commit(oid?)?;
        if commit_touches(repo, &commit, path)? {
            return Ok(Some(FileRevision::from_commit(&commit)));
        }
    }
    Ok(None)
}

fn commit_touches(repo: &Repository, commit: &Commit<'_>, path: &str) -> Result<bool> {
    let tree = commit.tree()?;
    let parent_tree = if commit.parent_count() > 0 {
        Some(commit.parent(0)?.tree()?)
    } else {
        None
    };

    let mut options = DiffOptions::new();
    options.disable_pathspec_match(true).pathspec(path);
    let diff = repo.diff_tree_to_tree(parent_tree.as_ref(), Some(&tree), Some(&mut options))?;
    Ok(diff.deltas().count() > 0)
}
