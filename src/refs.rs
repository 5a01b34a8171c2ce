//! Reference operations using libgit2.
//!
//! The mainline and the lock token are plain references; these helpers keep
//! the "absent" case explicit instead of surfacing `NotFound` errors.

use git2::{ErrorCode, Oid, Repository};

use crate::error::{Error, Result};

/// Resolve a reference to the commit it points at, or `None` if it is absent
/// or unborn.
pub fn read_ref(repo: &Repository, name: &str) -> Result<Option<Oid>> {
    match repo.refname_to_id(name) {
        Ok(oid) => Ok(Some(oid)),
        Err(err) if err.code() == ErrorCode::NotFound => Ok(None),
        Err(err) => Err(Error::Git(err)),
    }
}

/// Soft reset: point `name` at `target`, creating the reference if needed.
///
/// Only the pointer moves; no index or working directory is touched.
pub fn reset_ref(repo: &Repository, name: &str, target: Oid, log_message: &str) -> Result<()> {
    match repo.find_reference(name) {
        Ok(mut reference) => {
            reference.set_target(target, log_message)?;
        }
        Err(err) if err.code() == ErrorCode::NotFound => {
            repo.reference(name, target, true, log_message)?;
        }
        Err(err) => return Err(Error::Git(err)),
    }
    Ok(())
}

/// Point `name` at `target`, or delete it when `target` is `None`.
pub fn restore_ref(
    repo: &Repository,
    name: &str,
    target: Option<Oid>,
    log_message: &str,
) -> Result<()> {
    match target {
        Some(oid) => reset_ref(repo, name, oid, log_message),
        None => delete_ref(repo, name).map(|_| ()),
    }
}

/// Delete a reference. Returns whether it existed.
pub fn delete_ref(repo: &Repository, name: &str) -> Result<bool> {
    match repo.find_reference(name) {
        Ok(mut reference) => {
            reference.delete()?;
            Ok(true)
        }
        Err(err) if err.code() == ErrorCode::NotFound => Ok(false),
        Err(err) => Err(Error::Git(err)),
    }
}

/// Short form of an object id for messages.
pub fn short(oid: Oid) -> String {
    let mut text = oid.to_string();
    text.truncate(7);
    text
}
