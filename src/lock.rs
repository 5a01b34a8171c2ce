//! Cross-process mutual exclusion built on atomic reference creation.
//!
//! A writer holds the critical section while the lock token reference exists.
//! The token is created with an expected old value of the zero id, which
//! libgit2 checks under the ref's lockfile, so at most one process can create
//! it even when several pass the existence check together.
//!
//! The token targets a commit written for its holder: the holder id is in the
//! message and the mainline tip it was taken against (if any) is its parent.
//! Every token target is therefore a commit, and no two holders share one, so
//! a holder only ever deletes its own token.
//!
//! - [`try_acquire`] makes a single attempt and reports contention as `None`
//! - [`acquire`] spins with a fixed interval until the token is created
//! - [`with_lock`] runs a body and removes the token on every exit path

use std::time::Duration;

use git2::{ErrorCode, Oid, Repository};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::refs;
use crate::workspace::Workspace;

/// A held lock token. Dropping the guard deletes the token.
pub struct RefLock<'repo> {
    repo: &'repo Repository,
    name: String,
    holder: String,
    token: Oid,
    released: bool,
}

impl RefLock<'_> {
    /// Name of the token reference.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Unique id of this holder, recorded in the token commit's message.
    pub fn holder(&self) -> &str {
        &self.holder
    }

    /// Commit the token reference points at while this guard holds it.
    pub fn token(&self) -> Oid {
        self.token
    }

    /// Delete the token, reporting failures instead of swallowing them.
    ///
    /// A token that was broken and re-taken by another writer is left alone.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        let deleted = delete_own_token(self.repo, &self.name, self.token)?;
        if !deleted {
            warn!(lock = %self.name, holder = %self.holder, "lock token vanished or was taken over while held");
        }
        debug!(lock = %self.name, holder = %self.holder, "lock released");
        Ok(())
    }
}

impl Drop for RefLock<'_> {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // Unwinding or early return: best effort, errors ignored during drop
        let _ = delete_own_token(self.repo, &self.name, self.token);
    }
}

/// Delete `name` only while it still points at `token`.
///
/// libgit2 re-checks the loaded target under the ref lockfile when deleting,
/// so a concurrent re-acquire surfaces as `Modified` rather than being lost.
fn delete_own_token(repo: &Repository, name: &str, token: Oid) -> Result<bool> {
    let mut reference = match repo.find_reference(name) {
        Ok(reference) => reference,
        Err(err) if err.code() == ErrorCode::NotFound => return Ok(false),
        Err(err) => return Err(Error::Git(err)),
    };
    if reference.target() != Some(token) {
        return Ok(false);
    }
    match reference.delete() {
        Ok(()) => Ok(true),
        Err(err) if matches!(err.code(), ErrorCode::NotFound | ErrorCode::Modified) => Ok(false),
        Err(err) => Err(Error::Git(err)),
    }
}

fn is_lock_contended(err: &git2::Error) -> bool {
    matches!(
        err.code(),
        ErrorCode::Exists | ErrorCode::Locked | ErrorCode::Modified
    )
}

/// Token commit prepared for one holder against one mainline tip.
struct Token {
    holder: String,
    tip: Option<Oid>,
    commit: Oid,
}

impl Token {
    fn prepare(ws: &Workspace, holder: String) -> Result<Self> {
        let repo = ws.repo();
        let tip = ws.mainline_tip()?;
        let tree = match tip {
            Some(tip) => repo.find_commit(tip)?.tree()?,
            None => repo.find_tree(repo.treebuilder(None)?.write()?)?,
        };
        let parents = match tip {
            Some(tip) => vec![repo.find_commit(tip)?],
            None => Vec::new(),
        };
        let parent_refs: Vec<&git2::Commit<'_>> = parents.iter().collect();
        let sig = ws.identity().signature()?;
        let message = format!("gitsave: lock held by {holder}");
        let commit = repo.commit(None, &sig, &sig, &message, &tree, &parent_refs)?;
        Ok(Self {
            holder,
            tip,
            commit,
        })
    }

    /// Whether the mainline moved since this token was written.
    fn is_stale(&self, ws: &Workspace) -> Result<bool> {
        Ok(ws.mainline_tip()? != self.tip)
    }
}

fn create_token<'repo>(ws: &'repo Workspace, token: &Token) -> Result<Option<RefLock<'repo>>> {
    let repo = ws.repo();
    let name = ws.config().lock.ref_name.clone();
    let log_message = format!("gitsave: lock held by {}", token.holder);
    let created = repo.reference_matching(&name, token.commit, false, Oid::zero(), &log_message);

    match created {
        Ok(_) => {
            debug!(lock = %name, holder = %token.holder, "lock acquired");
            Ok(Some(RefLock {
                repo,
                name,
                holder: token.holder.clone(),
                token: token.commit,
                released: false,
            }))
        }
        Err(err) if is_lock_contended(&err) => Ok(None),
        Err(err) => Err(Error::Git(err)),
    }
}

/// Try to create the lock token once.
///
/// Returns `Ok(Some(lock))` if acquired, `Ok(None)` if another writer holds it,
/// or `Err` for any other failure.
pub fn try_acquire(ws: &Workspace) -> Result<Option<RefLock<'_>>> {
    let token = Token::prepare(ws, Uuid::new_v4().to_string())?;
    create_token(ws, &token)
}

/// Spin until the lock token is created.
///
/// Waits `lock.retry_interval_ms` between attempts. Unbounded unless
/// `lock.max_attempts` is configured, in which case exhaustion yields
/// [`Error::LockTimeout`]. The token commit is rewritten only when the
/// mainline moves while waiting.
pub fn acquire(ws: &Workspace) -> Result<RefLock<'_>> {
    let lock_config = &ws.config().lock;
    let retry_interval = Duration::from_millis(lock_config.retry_interval_ms);
    let holder = Uuid::new_v4().to_string();
    let mut token = Token::prepare(ws, holder.clone())?;
    let mut attempts: u32 = 0;

    loop {
        attempts = attempts.saturating_add(1);
        if token.is_stale(ws)? {
            token = Token::prepare(ws, holder.clone())?;
        }
        if let Some(lock) = create_token(ws, &token)? {
            return Ok(lock);
        }

        if let Some(max) = lock_config.max_attempts {
            if attempts >= max {
                return Err(Error::LockTimeout(lock_config.ref_name.clone()));
            }
        }
        debug!(lock = %lock_config.ref_name, attempts, "lock contended, retrying");
        std::thread::sleep(retry_interval);
    }
}

/// Run `body` while holding the lock token.
///
/// The token is deleted before returning, whether `body` succeeded or failed;
/// a panic inside `body` releases it through the guard's `Drop`. An error from
/// `body` takes precedence over an error releasing the token.
pub fn with_lock<T, F>(ws: &Workspace, body: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let lock = acquire(ws)?;
    let outcome = body();
    let released = lock.release();

    match (outcome, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) => Err(err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(release_err)) => {
            warn!(error = %release_err, "failed to release lock after error");
            Err(err)
        }
    }
}

/// Whether any writer currently holds the lock token.
pub fn is_locked(ws: &Workspace) -> Result<bool> {
    match ws.repo().find_reference(&ws.config().lock.ref_name) {
        Ok(_) => Ok(true),
        Err(err) if err.code() == ErrorCode::NotFound => Ok(false),
        Err(err) => Err(Error::Git(err)),
    }
}

/// Forcibly delete a token left behind by a writer that died mid-save.
///
/// Returns whether a token was present.
pub fn break_lock(ws: &Workspace) -> Result<bool> {
    let name = &ws.config().lock.ref_name;
    let existed = refs::delete_ref(ws.repo(), name)?;
    if existed {
        warn!(lock = %name, "lock token broken");
    }
    Ok(existed)
}
