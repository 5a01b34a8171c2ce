//! Remote transport for the mainline.
//!
//! Fetch and push go through libgit2 with callbacks built from the
//! `[remote]` configuration. A push the remote refuses because it does not
//! fast-forward is reported as [`PushOutcome::Rejected`] so the caller can
//! fetch, merge, and retry; every other failure propagates as an error.

use std::cell::RefCell;

use git2::{
    CertificateCheckStatus, Cred, CredentialType, ErrorCode, FetchOptions, PushOptions, Remote,
    RemoteCallbacks, Repository,
};
use tracing::{debug, info};

use crate::config::{Credentials, RemoteConfig};
use crate::error::{Error, Result};
use crate::refs;
use crate::workspace::Workspace;

/// Result of a single push attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PushOutcome {
    Accepted,
    Rejected(String),
}

/// Fetch the remote mainline into its remote-tracking reference.
///
/// Returns the fetched tip, or `None` when the remote has no mainline yet.
pub fn fetch(ws: &Workspace) -> Result<Option<git2::Oid>> {
    let repo = ws.repo();
    let config = ws.config();
    let tracking = config.remote_tracking_ref();
    let refspec = format!("+{}:{}", config.mainline_ref(), tracking);

    let mut remote = find_remote(repo, &config.remote)?;
    let mut options = FetchOptions::new();
    options.remote_callbacks(callbacks(repo, &config.remote));
    remote.fetch(&[refspec.as_str()], Some(&mut options), None)?;

    let tip = refs::read_ref(repo, &tracking)?;
    info!(remote = %config.remote.name, tip = ?tip.map(refs::short), "fetched mainline");
    Ok(tip)
}

/// Push the local mainline to the same name on the remote, without force.
pub fn push(ws: &Workspace) -> Result<PushOutcome> {
    let repo = ws.repo();
    let config = ws.config();
    let mainline = config.mainline_ref();
    let refspec = format!("{mainline}:{mainline}");

    let mut remote = find_remote(repo, &config.remote)?;
    let rejection: RefCell<Option<String>> = RefCell::new(None);
    {
        let mut callbacks = callbacks(repo, &config.remote);
        callbacks.push_update_reference(|name, status| {
            if let Some(message) = status {
                debug!(reference = name, status = message, "remote refused update");
                *rejection.borrow_mut() = Some(message.to_string());
            }
            Ok(())
        });

        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);

        if let Err(err) = remote.push(&[refspec.as_str()], Some(&mut options)) {
            if is_non_fast_forward(&err) {
                return Ok(PushOutcome::Rejected(err.message().to_string()));
            }
            return Err(Error::Git(err));
        }
    }

    match rejection.into_inner() {
        Some(message) => Ok(PushOutcome::Rejected(message)),
        None => Ok(PushOutcome::Accepted),
    }
}

/// Whether a push error means the remote moved underneath us.
pub fn is_non_fast_forward(err: &git2::Error) -> bool {
    err.code() == ErrorCode::NotFastForward || is_rejection_message(err.message())
}

fn is_rejection_message(message: &str) -> bool {
    message.contains("non-fast-forward")
        || message.contains("non-fastforwardable")
        || message.contains("fetch first")
        || message.contains("cannot lock ref")
        || message.contains("failed to update ref")
        || message.contains("not present locally")
}

fn find_remote<'repo>(repo: &'repo Repository, config: &RemoteConfig) -> Result<Remote<'repo>> {
    repo.find_remote(&config.name).map_err(|err| {
        if err.code() == ErrorCode::NotFound {
            Error::InvalidConfig(format!("remote '{}' is not configured", config.name))
        } else {
            Error::Git(err)
        }
    })
}

fn callbacks<'cb>(repo: &Repository, config: &RemoteConfig) -> RemoteCallbacks<'cb> {
    let mut callbacks = RemoteCallbacks::new();

    let credentials = config.credentials.clone();
    let git_config = repo.config().ok();
    callbacks.credentials(move |url, username_from_url, allowed| match &credentials {
        Credentials::Userpass { username, password } => {
            Cred::userpass_plaintext(username, password)
        }
        Credentials::Token { token, username } => Cred::userpass_plaintext(username, token),
        Credentials::Default => {
            if allowed.contains(CredentialType::SSH_KEY) {
                if let Some(user) = username_from_url {
                    return Cred::ssh_key_from_agent(user);
                }
            }
            if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
                if let Some(cfg) = git_config.as_ref() {
                    if let Ok(cred) = Cred::credential_helper(cfg, url, username_from_url) {
                        return Ok(cred);
                    }
                }
            }
            Cred::default()
        }
    });

    if !config.verify_tls {
        callbacks.certificate_check(|_cert, _host| Ok(CertificateCheckStatus::CertificateOk));
    }
    callbacks
}
