use std::path::{Path, PathBuf};

use git2::build::CheckoutBuilder;
use git2::{ErrorCode, IndexAddOption, Oid, Repository, ResetType, StatusOptions};
use log::{debug, warn};

use crate::backend::VersionControl;
use crate::error::{Error, Result};
use crate::remote;
use crate::types::{PushStatus, RepoOptions, Signature};

/// [`VersionControl`] over a non-bare git working copy, via libgit2.
pub struct GitBackend {
    repo: Repository,
    workdir: PathBuf,
    gitdir: PathBuf,
    remote: String,
    branch: String,
    fallback: Signature,
}

impl GitBackend {
    /// Bind to the existing working copy at `path`.
    ///
    /// Fails with [`Error::InvalidRepository`] unless `path` is the root of a
    /// non-bare repository whose `HEAD` is the born branch `options.branch`
    /// and which has `options.remote` configured.
    pub fn open(path: impl AsRef<Path>, options: &RepoOptions) -> Result<Self> {
        let path = path.as_ref();
        let invalid = |reason: String| Error::invalid_repository(path, reason);

        let repo = Repository::open(path).map_err(|e| invalid(e.message().to_string()))?;
        let workdir = match repo.workdir() {
            Some(dir) => dir.to_path_buf(),
            None => return Err(invalid("bare repositories have no working copy".into())),
        };
        let gitdir = repo.path().to_path_buf();

        let local_ref = format!("refs/heads/{}", options.branch);
        if !git2::Reference::is_valid_name(&local_ref) {
            return Err(invalid(format!("invalid branch name {:?}", options.branch)));
        }
        if let Err(e) = repo.find_remote(&options.remote) {
            return Err(invalid(format!(
                "remote {:?} is not configured: {}",
                options.remote,
                e.message()
            )));
        }
        if repo.refname_to_id(&local_ref).is_err() {
            return Err(invalid(format!(
                "branch {:?} does not exist or has no commits",
                options.branch
            )));
        }
        let head = repo
            .find_reference("HEAD")
            .map_err(|e| invalid(e.message().to_string()))?;
        if head.symbolic_target() != Some(local_ref.as_str()) {
            return Err(invalid(format!(
                "HEAD must be checked out on {:?}",
                options.branch
            )));
        }
        drop(head);

        debug!(
            "bound {} to {}/{}",
            workdir.display(),
            options.remote,
            options.branch
        );
        Ok(GitBackend {
            repo,
            workdir,
            gitdir,
            remote: options.remote.clone(),
            branch: options.branch.clone(),
            fallback: options.fallback_signature(),
        })
    }

    /// Name of the bound remote.
    pub fn remote(&self) -> &str {
        &self.remote
    }

    /// Name of the bound branch.
    pub fn branch(&self) -> &str {
        &self.branch
    }

    fn local_ref(&self) -> String {
        format!("refs/heads/{}", self.branch)
    }

    fn tracking_ref(&self) -> String {
        format!("refs/remotes/{}/{}", self.remote, self.branch)
    }

    fn local_tip(&self, step: &'static str) -> Result<Oid> {
        self.repo
            .refname_to_id(&self.local_ref())
            .map_err(|e| Error::git(step, e))
    }

    fn signature(&self) -> Result<git2::Signature<'static>> {
        match self.repo.signature() {
            Ok(sig) => Ok(sig),
            Err(_) => git2::Signature::now(&self.fallback.name, &self.fallback.email)
                .map_err(|e| Error::git("commit", e)),
        }
    }

    /// Move the checked-out branch, index and working tree to `oid`.
    fn reset_hard(&self, oid: Oid, step: &'static str) -> Result<()> {
        let target = self
            .repo
            .find_object(oid, None)
            .map_err(|e| Error::git(step, e))?;
        self.repo
            .reset(&target, ResetType::Hard, None)
            .map_err(|e| Error::git(step, e))
    }

    /// Hard reset to `oid`, then delete untracked files, which a hard reset
    /// leaves alone.
    fn reset_clean(&self, oid: Oid, step: &'static str) -> Result<()> {
        self.reset_hard(oid, step)?;
        let mut checkout = CheckoutBuilder::new();
        checkout.force().remove_untracked(true);
        self.repo
            .checkout_head(Some(&mut checkout))
            .map_err(|e| Error::git(step, e))
    }

    /// Throw away uncommitted changes on top of the local tip, if any.
    fn discard_uncommitted(&self, step: &'static str) -> Result<()> {
        let mut opts = StatusOptions::new();
        opts.include_untracked(true).recurse_untracked_dirs(true);
        let dirty = !self
            .repo
            .statuses(Some(&mut opts))
            .map_err(|e| Error::git(step, e))?
            .is_empty();
        if !dirty {
            return Ok(());
        }
        warn!(
            "discarding uncommitted changes in {}",
            self.workdir.display()
        );
        self.reset_clean(self.local_tip(step)?, step)
    }
}

impl VersionControl for GitBackend {
    fn workdir(&self) -> &Path {
        &self.workdir
    }

    fn control_dir(&self) -> &Path {
        &self.gitdir
    }

    fn pull(&mut self) -> Result<()> {
        self.discard_uncommitted("pull")?;
        remote::fetch(&self.repo, &self.remote, &self.branch)?;

        let remote_tip = match self.repo.refname_to_id(&self.tracking_ref()) {
            Ok(oid) => oid,
            Err(e) if e.code() == ErrorCode::NotFound => {
                debug!("{}/{} does not exist yet", self.remote, self.branch);
                return Ok(());
            }
            Err(e) => return Err(Error::git("pull", e)),
        };
        let local_tip = self.local_tip("pull")?;

        if local_tip == remote_tip {
            return Ok(());
        }
        let descendant = |a, b| {
            self.repo
                .graph_descendant_of(a, b)
                .map_err(|e| Error::git("pull", e))
        };
        if descendant(local_tip, remote_tip)? {
            debug!("local {} is ahead of {}", local_tip, remote_tip);
            return Ok(());
        }
        if descendant(remote_tip, local_tip)? {
            debug!("fast-forward {} -> {}", local_tip, remote_tip);
        } else {
            warn!(
                "local {} diverged from {}/{} at {}; discarding unpublished commits",
                local_tip, self.remote, self.branch, remote_tip
            );
        }
        self.reset_hard(remote_tip, "pull")
    }

    fn stage_all(&mut self) -> Result<()> {
        let mut index = self.repo.index().map_err(|e| Error::git("stage", e))?;
        index.read(false).map_err(|e| Error::git("stage", e))?;
        index
            .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
            .map_err(|e| Error::git("stage", e))?;
        // add_all never records removals
        index
            .update_all(["*"].iter(), None)
            .map_err(|e| Error::git("stage", e))?;
        index.write().map_err(|e| Error::git("stage", e))
    }

    fn commit(&mut self, message: &str) -> Result<String> {
        let mut index = self.repo.index().map_err(|e| Error::git("commit", e))?;
        let tree_oid = index.write_tree().map_err(|e| Error::git("commit", e))?;
        let tree = self
            .repo
            .find_tree(tree_oid)
            .map_err(|e| Error::git("commit", e))?;
        let parent = self
            .repo
            .find_commit(self.local_tip("commit")?)
            .map_err(|e| Error::git("commit", e))?;
        let sig = self.signature()?;

        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &[&parent])
            .map_err(|e| Error::git("commit", e))?;
        Ok(oid.to_string())
    }

    fn push(&mut self) -> Result<PushStatus> {
        remote::push(&self.repo, &self.remote, &self.branch)
    }

    fn reset_hard_to_parent(&mut self) -> Result<()> {
        let tip = self
            .repo
            .find_commit(self.local_tip("reset")?)
            .map_err(|e| Error::git("reset", e))?;
        let parent = tip.parent_id(0).map_err(|e| Error::git("reset", e))?;
        debug!("reset {} -> {}", tip.id(), parent);
        self.reset_hard(parent, "reset")
    }

    fn restore(&mut self, tip: &str) -> Result<()> {
        let oid = Oid::from_str(tip).map_err(|e| Error::git("restore", e))?;
        debug!("restore working copy to {}", oid);
        self.reset_clean(oid, "restore")
    }

    fn head(&self) -> Result<Option<String>> {
        match self.repo.refname_to_id(&self.local_ref()) {
            Ok(oid) => Ok(Some(oid.to_string())),
            Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
            Err(e) => Err(Error::git("head", e)),
        }
    }
}
