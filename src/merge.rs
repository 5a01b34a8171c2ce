//! Merge coordination against the mainline tip.
//!
//! A candidate commit is three-way merged in memory against the current tip
//! (libgit2 merge trees, rename-aware). Conflicts abort with a
//! [`ConflictReport`] before anything moves. A clean merge either rewrites
//! the candidate as a linear child of the tip or records it on the mainline
//! (fast-forward or merge commit), then soft-resets the mainline pointer.

use std::collections::{BTreeMap, BTreeSet};

use git2::{Commit, Delta, DiffFormat, DiffOptions, ErrorCode, Index, MergeOptions, Oid, Repository, Tree};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::refs;
use crate::workspace::Workspace;

/// Per-path description of why a merge could not proceed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConflictReport {
    pub files: BTreeMap<String, ConflictFile>,
}

impl ConflictReport {
    pub fn paths(&self) -> Vec<&str> {
        self.files.keys().map(String::as_str).collect()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    pub fn get(&self, path: &str) -> Option<&ConflictFile> {
        self.files.get(path)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl std::fmt::Display for ConflictReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.paths().join(", "))
    }
}

/// One conflicting path: how the mainline differs from the candidate.
#[derive(Debug, Clone, Serialize)]
pub struct ConflictFile {
    pub status: ChangeStatus,
    pub lines: Vec<ConflictLine>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeStatus {
    Added,
    Deleted,
    Modified,
}

/// A line of the candidate -> mainline diff.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConflictLine {
    pub origin: LineOrigin,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub old_lineno: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_lineno: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LineOrigin {
    Added,
    Removed,
    Context,
}

/// Merge `candidate` into the mainline and advance the pointer.
///
/// Returns the new mainline tip. With `rewrite_as_linear` the candidate is
/// recreated on top of the tip (same author, committer, and message; merged
/// tree) so published history stays a single chain. Fails with
/// [`Error::GitConflicts`] without moving anything when the merge conflicts.
pub fn merge(ws: &Workspace, candidate: Oid, rewrite_as_linear: bool) -> Result<Oid> {
    let repo = ws.repo();
    let mainline = ws.mainline_ref();

    let Some(tip) = refs::read_ref(repo, &mainline)? else {
        refs::reset_ref(repo, &mainline, candidate, "gitsave: initialize mainline")?;
        info!(mainline = %mainline, tip = %candidate, "mainline created");
        return Ok(candidate);
    };

    if tip == candidate || repo.graph_descendant_of(tip, candidate)? {
        debug!(mainline = %mainline, candidate = %candidate, "candidate already merged");
        return Ok(tip);
    }

    let tip_commit = repo.find_commit(tip)?;
    let candidate_commit = repo.find_commit(candidate)?;
    let descends = repo.graph_descendant_of(candidate, tip)?;

    let (new_tip, how) = if rewrite_as_linear {
        if candidate_commit.parent_ids().eq([tip]) {
            (candidate, "linear")
        } else {
            let tree = merged_tree(repo, &tip_commit, &candidate_commit)?;
            (rebase_onto(repo, &candidate_commit, &tip_commit, &tree)?, "rebase")
        }
    } else if descends && ws.config().fast_forward {
        (candidate, "fast-forward")
    } else {
        let tree = merged_tree(repo, &tip_commit, &candidate_commit)?;
        let message = format!(
            "Merge {} into {}",
            refs::short(candidate),
            ws.config().mainline
        );
        let signature = ws.identity().signature()?;
        let merge_commit = repo.commit(
            None,
            &signature,
            &signature,
            &message,
            &tree,
            &[&tip_commit, &candidate_commit],
        )?;
        (merge_commit, "merge")
    };

    refs::reset_ref(
        repo,
        &mainline,
        new_tip,
        &format!("gitsave: {how} {}", refs::short(candidate)),
    )?;
    info!(mainline = %mainline, from = %tip, to = %new_tip, how, "mainline advanced");
    Ok(new_tip)
}

/// Recreate `candidate` as a child of `onto` carrying `tree`.
fn rebase_onto(
    repo: &Repository,
    candidate: &Commit<'_>,
    onto: &Commit<'_>,
    tree: &Tree<'_>,
) -> Result<Oid> {
    let message = String::from_utf8_lossy(candidate.message_bytes()).into_owned();
    let oid = repo.commit(
        None,
        &candidate.author(),
        &candidate.committer(),
        &message,
        tree,
        &[onto],
    )?;
    debug!(candidate = %candidate.id(), onto = %onto.id(), rewritten = %oid, "rebased candidate");
    Ok(oid)
}

/// Three-way merge of two commits; conflicts become [`Error::GitConflicts`].
fn merged_tree<'repo>(
    repo: &'repo Repository,
    tip: &Commit<'repo>,
    candidate: &Commit<'repo>,
) -> Result<Tree<'repo>> {
    let ancestor = ancestor_tree(repo, tip.id(), candidate.id())?;

    let mut options = MergeOptions::new();
    options.find_renames(true);

    let mut index = repo.merge_trees(&ancestor, &tip.tree()?, &candidate.tree()?, Some(&options))?;
    if index.has_conflicts() {
        let paths = conflicted_paths(&index)?;
        warn!(tip = %tip.id(), candidate = %candidate.id(), conflicts = paths.len(), "merge conflicts");
        let report = conflict_report(repo, candidate, tip, &paths)?;
        return Err(Error::GitConflicts(report));
    }

    let tree_id = index.write_tree_to(repo)?;
    Ok(repo.find_tree(tree_id)?)
}

/// Merge-base tree, or the empty tree when the histories share no commit.
fn ancestor_tree(repo: &Repository, ours: Oid, theirs: Oid) -> Result<Tree<'_>> {
    let tree_id = match repo.merge_base(ours, theirs) {
        Ok(base) => repo.find_commit(base)?.tree_id(),
        Err(err) if err.code() == ErrorCode::NotFound => repo.treebuilder(None)?.write()?,
        Err(err) => return Err(Error::Git(err)),
    };
    Ok(repo.find_tree(tree_id)?)
}

fn conflicted_paths(index: &Index) -> Result<BTreeSet<String>> {
    let mut paths = BTreeSet::new();
    for conflict in index.conflicts()? {
        let conflict = conflict?;
        let path = conflict
            .our
            .as_ref()
            .or(conflict.their.as_ref())
            .or(conflict.ancestor.as_ref())
            .map(|entry| String::from_utf8_lossy(&entry.path).into_owned());
        if let Some(path) = path {
            paths.insert(path);
        }
    }
    Ok(paths)
}

/// Diff the candidate against the tip, restricted to the conflicting paths.
fn conflict_report(
    repo: &Repository,
    candidate: &Commit<'_>,
    tip: &Commit<'_>,
    paths: &BTreeSet<String>,
) -> Result<ConflictReport> {
    let mut options = DiffOptions::new();
    options.disable_pathspec_match(true);
    for path in paths {
        options.pathspec(path);
    }
    let diff = repo.diff_tree_to_tree(
        Some(&candidate.tree()?),
        Some(&tip.tree()?),
        Some(&mut options),
    )?;

    let mut files = BTreeMap::new();
    for delta in diff.deltas() {
        let status = match delta.status() {
            Delta::Added => ChangeStatus::Added,
            Delta::Deleted => ChangeStatus::Deleted,
            _ => ChangeStatus::Modified,
        };
        files.insert(
            delta_path(&delta),
            ConflictFile {
                status,
                lines: Vec::new(),
            },
        );
    }

    diff.print(DiffFormat::Patch, |delta, _hunk, line| {
        let origin = match line.origin() {
            '+' => LineOrigin::Added,
            '-' => LineOrigin::Removed,
            ' ' => LineOrigin::Context,
            _ => return true,
        };
        if let Some(file) = files.get_mut(&delta_path(&delta)) {
            file.lines.push(ConflictLine {
                origin,
                content: String::from_utf8_lossy(line.content())
                    .trim_end_matches('\n')
                    .to_string(),
                old_lineno: line.old_lineno(),
                new_lineno: line.new_lineno(),
            });
        }
        true
    })?;

    // Paths both sides changed identically in content but not mode still conflict
    for path in paths {
        files.entry(path.clone()).or_insert(ConflictFile {
            status: ChangeStatus::Modified,
            lines: Vec::new(),
        });
    }

    Ok(ConflictReport { files })
}

fn delta_path(delta: &git2::DiffDelta<'_>) -> String {
    delta
        .new_file()
        .path()
        .or_else(|| delta.old_file().path())
        .map(|path| path.to_string_lossy().into_owned())
        .unwrap_or_default()
}
