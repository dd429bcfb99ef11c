use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::{debug, info, trace, warn};

use crate::backend::VersionControl;
use crate::error::{Error, Result};
use crate::git::GitBackend;
use crate::lock::with_repo_lock;
use crate::paths::{delete_message, normalize_key, resolve_key, set_message};
use crate::types::{Phase, PublishOutcome, PushStatus, Removal, RepoOptions};

/// Attempts a single mutation gets before a diverging remote is reported as
/// [`Error::PublishRejected`]: the first try plus one retry.
pub const MAX_PUBLISH_ATTEMPTS: usize = 2;

/// A key-value view of a working copy that stays synchronized with its
/// remote.
///
/// Every operation pulls first. Mutations commit and push immediately; if the
/// push loses a race with another writer the local commit is thrown away,
/// the remote state is pulled, and the mutation is applied once more on top
/// of it.
pub struct SyncedRepository<B = GitBackend> {
    backend: B,
}

impl SyncedRepository<GitBackend> {
    /// Open the working copy at `path` with the given remote/branch binding.
    pub fn open(path: impl AsRef<Path>, options: RepoOptions) -> Result<Self> {
        GitBackend::open(path, &options).map(Self::new)
    }
}

impl<B: VersionControl> SyncedRepository<B> {
    /// Wrap an already-bound backend.
    pub fn new(backend: B) -> Self {
        SyncedRepository { backend }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Root of the working copy.
    pub fn workdir(&self) -> &Path {
        self.backend.workdir()
    }

    /// Tip of the local branch, for diagnostics.
    pub fn head_commit(&self) -> Result<Option<String>> {
        self.backend.head()
    }

    /// Bring the working copy up to date with the remote.
    pub fn pull(&mut self) -> Result<()> {
        self.locked(|repo| repo.backend.pull())
    }

    /// Read the value stored under `key`, or `None` if it is absent.
    pub fn read(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        let key = normalize_key(key)?;
        self.locked(|repo| {
            repo.backend.pull()?;
            let path = match resolve_key(repo.workdir(), &key)? {
                Some(path) => path,
                None => return Ok(None),
            };
            if path.is_dir() {
                return Err(Error::invalid_key(format!("{} is a directory", key)));
            }
            match std::fs::read(&path) {
                Ok(data) => Ok(Some(data)),
                Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
                Err(e) => Err(Error::io(&path, e)),
            }
        })
    }

    /// Store `value` under `key` and publish it.
    pub fn write(&mut self, key: &str, value: &[u8]) -> Result<()> {
        let key = normalize_key(key)?;
        let message = set_message(&key);
        self.locked(|repo| {
            repo.mutate(&message, |root| {
                let path = resolve_key(root, &key)?.ok_or_else(|| {
                    Error::invalid_key(format!("{} is nested under an existing value", key))
                })?;
                if path.is_dir() {
                    return Err(Error::invalid_key(format!("{} is a directory", key)));
                }
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
                }
                std::fs::write(&path, value).map_err(|e| Error::io(&path, e))?;
                Ok(true)
            })
        })
        .map(|_| ())
    }

    /// Remove `key` and publish the removal.
    ///
    /// Returns [`Removal::NotFound`] without committing anything if the key
    /// does not exist once the working copy has been pulled.
    pub fn delete(&mut self, key: &str) -> Result<Removal> {
        let key = normalize_key(key)?;
        let message = delete_message(&key);
        let removed = self.locked(|repo| {
            repo.mutate(&message, |root| {
                let path = match resolve_key(root, &key)? {
                    Some(path) => path,
                    None => return Ok(false),
                };
                match std::fs::symlink_metadata(&path) {
                    Ok(meta) if meta.is_dir() => {
                        Err(Error::invalid_key(format!("{} is a directory", key)))
                    }
                    Ok(_) => {
                        std::fs::remove_file(&path).map_err(|e| Error::io(&path, e))?;
                        prune_empty_parents(root, &path);
                        Ok(true)
                    }
                    Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
                    Err(e) => Err(Error::io(&path, e)),
                }
            })
        })?;
        if removed {
            Ok(Removal::Removed)
        } else {
            debug!("delete {}: key not found", key);
            Ok(Removal::NotFound)
        }
    }

    /// Same as [`delete`](Self::delete).
    pub fn remove(&mut self, key: &str) -> Result<Removal> {
        self.delete(key)
    }

    fn locked<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let dir = self.backend.control_dir().to_path_buf();
        with_repo_lock(&dir, || f(self))
    }

    /// Run pull → apply → publish, retrying once from a fresh pull if the
    /// push is rejected.
    ///
    /// `apply` mutates the working copy rooted at its argument and returns
    /// whether anything changed; `false` ends the call without a commit.
    /// Any other failure once `apply` has run puts the working copy back to
    /// the tip it was applied on.
    fn mutate<F>(&mut self, message: &str, mut apply: F) -> Result<bool>
    where
        F: FnMut(&Path) -> Result<bool>,
    {
        let mut phase = Phase::Idle;
        let mut attempt = 0;

        while attempt < MAX_PUBLISH_ATTEMPTS {
            attempt += 1;
            if phase == Phase::Idle {
                self.backend.pull()?;
                phase = transition(phase, Phase::Pulled);
            }

            let base = self.backend.head()?;
            let root: PathBuf = self.backend.workdir().to_path_buf();
            match apply(&root) {
                Ok(true) => {}
                Ok(false) => return Ok(false),
                Err(e) => return Err(self.abandon(base, e)),
            }
            phase = transition(phase, Phase::LocallyMutated);

            let outcome = match self.publish(message) {
                Ok(outcome) => outcome,
                Err(e) => return Err(self.abandon(base, e)),
            };
            match outcome {
                PublishOutcome::Published => {
                    transition(phase, Phase::Published);
                    return Ok(true);
                }
                PublishOutcome::RejectedNeedsRetry => {
                    // publish already rolled back and re-pulled
                    phase = transition(phase, Phase::PublishRejected);
                    phase = transition(phase, Phase::RolledBack);
                    phase = transition(phase, Phase::Pulled);
                    warn!(
                        "{:?} lost a race with another writer (attempt {}/{})",
                        message, attempt, MAX_PUBLISH_ATTEMPTS
                    );
                }
            }
        }

        Err(Error::PublishRejected {
            attempts: MAX_PUBLISH_ATTEMPTS,
        })
    }

    /// Restore the working copy to `base` after a failed mutation and hand
    /// back `err`.
    ///
    /// A failed restore is only logged; the next pull discards whatever is
    /// left over.
    fn abandon(&mut self, base: Option<String>, err: Error) -> Error {
        let Some(tip) = base else {
            return err;
        };
        match self.backend.restore(&tip) {
            Ok(()) => debug!("restored {} after failed mutation: {}", tip, err),
            Err(e) => warn!("could not restore {} after failed mutation: {}", tip, e),
        }
        err
    }

    /// Stage everything, commit with `message` and push.
    ///
    /// On a non-fast-forward rejection the new commit is discarded (hard
    /// reset to its parent) and the remote state is pulled before returning
    /// [`PublishOutcome::RejectedNeedsRetry`].
    fn publish(&mut self, message: &str) -> Result<PublishOutcome> {
        self.backend.stage_all()?;
        let commit = self.backend.commit(message)?;
        debug!("committed {} {:?}", commit, message);

        match self.backend.push()? {
            PushStatus::Accepted => {
                info!("published {} {:?}", commit, message);
                Ok(PublishOutcome::Published)
            }
            PushStatus::Diverged => {
                warn!("push of {} rejected: remote has diverged, rolling back", commit);
                self.backend.reset_hard_to_parent()?;
                self.backend.pull()?;
                Ok(PublishOutcome::RejectedNeedsRetry)
            }
        }
    }
}

fn transition(from: Phase, to: Phase) -> Phase {
    trace!("{:?} -> {:?}", from, to);
    to
}

/// Remove directories left empty by a deletion, stopping at `root`.
fn prune_empty_parents(root: &Path, file: &Path) {
    let mut dir = file.parent();
    while let Some(d) = dir {
        if d == root || std::fs::remove_dir(d).is_err() {
            break;
        }
        dir = d.parent();
    }
}
