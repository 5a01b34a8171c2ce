//! Save coordination: commit, then advance the mainline under the lock.
//!
//! Local saves merge the commit into the local mainline. Remote saves rebase
//! it onto the mainline and publish; when the remote has moved, the local
//! mainline is rolled back, the remote tip is fetched and merged, and the
//! attempt repeats. Conflicts roll back and surface to the caller.

use git2::Oid;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::commit;
use crate::error::{Error, Result};
use crate::lock;
use crate::merge;
use crate::refs;
use crate::remote::{self, PushOutcome};
use crate::staging::StagingIndex;
use crate::workspace::Workspace;

/// What a save produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveReport {
    /// Commit built from the staging index.
    #[serde(serialize_with = "serialize_oid")]
    pub commit: Oid,
    /// Mainline tip after the save.
    #[serde(serialize_with = "serialize_oid")]
    pub tip: Oid,
    /// Merge (local) or push (remote) attempts made under the lock.
    pub attempts: u32,
}

fn serialize_oid<S: serde::Serializer>(oid: &Oid, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(&oid.to_string())
}

/// Commit `staging` and merge it into the local mainline.
pub fn save_local(ws: &Workspace, staging: StagingIndex<'_>, message: &str) -> Result<SaveReport> {
    let commit = commit::build_commit(ws, staging, message)?;
    let tip = lock::with_lock(ws, || merge::merge(ws, commit, false))?;
    info!(commit = %commit, tip = %tip, "saved locally");
    Ok(SaveReport {
        commit,
        tip,
        attempts: 1,
    })
}

/// Commit `staging` and publish it to the remote mainline.
pub fn save_remote(ws: &Workspace, staging: StagingIndex<'_>, message: &str) -> Result<SaveReport> {
    let commit = commit::build_commit(ws, staging, message)?;
    let (tip, attempts) = lock::with_lock(ws, || publish(ws, commit))?;
    info!(commit = %commit, tip = %tip, attempts, "saved to remote");
    Ok(SaveReport {
        commit,
        tip,
        attempts,
    })
}

/// Push loop run while holding the lock. Returns the published tip and the
/// number of attempts.
fn publish(ws: &Workspace, commit: Oid) -> Result<(Oid, u32)> {
    let max_attempts = ws.config().remote.max_push_attempts;
    let mut attempts: u32 = 0;

    loop {
        attempts = attempts.saturating_add(1);
        let rollback = ws.mainline_tip()?;

        let outcome = match push_attempt(ws, commit) {
            Ok(outcome) => outcome,
            Err(err) => {
                roll_back(ws, rollback)?;
                return Err(err);
            }
        };

        match outcome {
            PushOutcome::Accepted => {
                let tip = ws.mainline_tip()?.ok_or_else(|| {
                    Error::OperationFailed("mainline vanished after push".to_string())
                })?;
                return Ok((tip, attempts));
            }
            PushOutcome::Rejected(reason) => {
                warn!(attempt = attempts, reason = %reason, "push rejected");
                roll_back(ws, rollback)?;

                if max_attempts.is_some_and(|max| attempts >= max) {
                    return Err(Error::PushRetriesExhausted(attempts));
                }

                if let Some(remote_tip) = remote::fetch(ws)? {
                    if let Err(err) = merge::merge(ws, remote_tip, false) {
                        roll_back(ws, rollback)?;
                        return Err(err);
                    }
                }
            }
        }
    }
}

/// Rebase `commit` onto the mainline and push it.
fn push_attempt(ws: &Workspace, commit: Oid) -> Result<PushOutcome> {
    let tip = merge::merge(ws, commit, true)?;
    debug!(commit = %commit, tip = %tip, "pushing mainline");
    remote::push(ws)
}

fn roll_back(ws: &Workspace, rollback: Option<Oid>) -> Result<()> {
    let mainline = ws.mainline_ref();
    refs::restore_ref(ws.repo(), &mainline, rollback, "gitsave: roll back")?;
    debug!(mainline = %mainline, to = ?rollback.map(refs::short), "mainline rolled back");
    Ok(())
}
