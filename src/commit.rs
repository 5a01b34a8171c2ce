//! Commit construction from a staging index.

use git2::{Commit, Oid};
use tracing::debug;

use crate::error::Result;
use crate::refs;
use crate::staging::StagingIndex;
use crate::workspace::Workspace;

/// Freeze `staging` into a tree and write a commit for it.
///
/// The parent is the commit the index was seeded from; an unseeded index gets
/// the current mainline tip, or no parent at all in an empty store. No
/// reference moves. The index is consumed: request a fresh one for further
/// edits.
pub fn build_commit(ws: &Workspace, mut staging: StagingIndex<'_>, message: &str) -> Result<Oid> {
    let repo = ws.repo();
    let tree = repo.find_tree(staging.write_tree()?)?;

    let parent_id = match staging.base() {
        Some(base) => Some(base),
        None => ws.mainline_tip()?,
    };
    let parents: Vec<Commit<'_>> = match parent_id {
        Some(id) => vec![repo.find_commit(id)?],
        None => Vec::new(),
    };
    let parent_refs: Vec<&Commit<'_>> = parents.iter().collect();

    let signature = ws.identity().signature()?;
    let oid = repo.commit(None, &signature, &signature, message, &tree, &parent_refs)?;
    debug!(
        commit = %oid,
        parent = ?parent_id.map(refs::short),
        entries = staging.len(),
        "built commit"
    );
    Ok(oid)
}
