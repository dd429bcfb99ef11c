//! Network transfer against the bound remote: fetch and push, plus the
//! credential callbacks both share.

use std::cell::RefCell;

use git2::{Cred, CredentialType, FetchOptions, PushOptions, RemoteCallbacks, Repository};
use log::debug;

use crate::error::{Error, Result, SyncFailureKind};
use crate::types::PushStatus;

/// Give up on credentials after this many callback invocations; libgit2
/// keeps asking for as long as the server keeps refusing.
const MAX_CREDENTIAL_ATTEMPTS: usize = 3;

/// Build remote callbacks that authenticate via ssh-agent, the configured
/// credential helper, or default credentials, in that order.
fn callbacks<'a>(repo: &Repository) -> RemoteCallbacks<'a> {
    let cfg = repo.config().ok();
    let mut attempts = 0usize;
    let mut callbacks = RemoteCallbacks::new();
    callbacks.credentials(move |url, username_from_url, allowed| {
        attempts += 1;
        if attempts > MAX_CREDENTIAL_ATTEMPTS {
            return Err(git2::Error::new(
                git2::ErrorCode::Auth,
                git2::ErrorClass::Callback,
                format!("no accepted credentials for {}", url),
            ));
        }
        if allowed.contains(CredentialType::SSH_KEY) {
            if let Some(user) = username_from_url {
                return Cred::ssh_key_from_agent(user);
            }
        }
        if allowed.contains(CredentialType::USER_PASS_PLAINTEXT) {
            if let Some(ref cfg) = cfg {
                if let Ok(cred) = Cred::credential_helper(cfg, url, username_from_url) {
                    return Ok(cred);
                }
            }
        }
        Cred::default()
    });
    callbacks
}

/// Fetch `branch` from `remote` into `refs/remotes/<remote>/<branch>`.
///
/// A branch that does not exist on the remote yet is not an error; the
/// tracking ref simply stays absent.
pub fn fetch(repo: &Repository, remote: &str, branch: &str) -> Result<()> {
    let mut handle = repo
        .find_remote(remote)
        .map_err(|e| Error::git("fetch", e))?;
    let refspec = format!("+refs/heads/{0}:refs/remotes/{1}/{0}", branch, remote);

    let mut options = FetchOptions::new();
    options.remote_callbacks(callbacks(repo));
    debug!("fetching {} from {}", refspec, remote);
    handle
        .fetch(&[refspec.as_str()], Some(&mut options), None)
        .map_err(|e| Error::git("fetch", e))
}

/// Push the local `branch` to the same branch on `remote`.
///
/// Non-fast-forward refusals become [`PushStatus::Diverged`], whether
/// libgit2 detects them before sending (it compares against the advertised
/// remote tip) or the server reports them per ref.
pub fn push(repo: &Repository, remote: &str, branch: &str) -> Result<PushStatus> {
    let mut handle = repo
        .find_remote(remote)
        .map_err(|e| Error::git("push", e))?;
    let refspec = format!("refs/heads/{0}:refs/heads/{0}", branch);

    let rejection: RefCell<Option<String>> = RefCell::new(None);
    {
        let mut callbacks = callbacks(repo);
        callbacks.push_update_reference(|_refname, status| {
            if let Some(msg) = status {
                *rejection.borrow_mut() = Some(msg.to_string());
            }
            Ok(())
        });
        let mut options = PushOptions::new();
        options.remote_callbacks(callbacks);

        debug!("pushing {} to {}", refspec, remote);
        if let Err(e) = handle.push(&[refspec.as_str()], Some(&mut options)) {
            if e.code() == git2::ErrorCode::NotFastForward || is_rejection_message(e.message()) {
                return Ok(PushStatus::Diverged);
            }
            return Err(Error::git("push", e));
        }
    }

    match rejection.into_inner() {
        None => Ok(PushStatus::Accepted),
        Some(msg) if is_rejection_message(&msg) => Ok(PushStatus::Diverged),
        Some(msg) => Err(Error::sync_msg(
            SyncFailureKind::Rejected,
            "push",
            format!("remote refused {}: {}", refspec, msg),
        )),
    }
}

/// Recognize a non-fast-forward refusal from its text.
///
/// Servers report per-ref push failures as free-form status strings with no
/// structured code, so this is the one place that matches on wording. The
/// phrases are those emitted by git's `receive-pack` and by libgit2.
pub fn is_rejection_message(msg: &str) -> bool {
    let msg = msg.to_ascii_lowercase();
    msg.contains("non-fast-forward")
        || msg.contains("non-fastforward")
        || msg.contains("fetch first")
        || msg.contains("not present locally")
}
