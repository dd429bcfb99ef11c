#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use git2::{Repository, RepositoryInitOptions};
use gitkv::*;

/// A bare `remote.git` seeded with one commit on `main`, plus helpers to
/// clone working copies from it.
pub struct Fixture {
    pub dir: tempfile::TempDir,
    pub remote: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let remote = dir.path().join("remote.git");
        let bare = Repository::init_bare(&remote).unwrap();
        bare.set_head("refs/heads/main").unwrap();

        let seed_path = dir.path().join("seed");
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let seed = Repository::init_opts(&seed_path, &opts).unwrap();
        let sig = git2::Signature::now("seed", "seed@localhost").unwrap();
        let tree_id = seed.index().unwrap().write_tree().unwrap();
        let tree = seed.find_tree(tree_id).unwrap();
        seed.commit(Some("HEAD"), &sig, &sig, "Initialize main", &tree, &[])
            .unwrap();
        seed.remote("origin", remote.to_str().unwrap()).unwrap();
        seed.find_remote("origin")
            .unwrap()
            .push(&["refs/heads/main:refs/heads/main"], None)
            .unwrap();

        Fixture { dir, remote }
    }

    /// Clone the remote into `<tmp>/<name>` with `main` checked out.
    pub fn clone(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        let repo = git2::build::RepoBuilder::new()
            .branch("main")
            .clone(self.remote.to_str().unwrap(), &path)
            .unwrap();
        let mut cfg = repo.config().unwrap();
        cfg.set_str("user.name", name).unwrap();
        cfg.set_str("user.email", &format!("{}@localhost", name)).unwrap();
        path
    }

    /// Clone and open a store on the new working copy.
    pub fn store(&self, name: &str) -> SyncedRepository {
        let path = self.clone(name);
        SyncedRepository::open(path, RepoOptions::default()).unwrap()
    }

    /// Tip of `main` on the remote.
    pub fn remote_head(&self) -> String {
        let bare = Repository::open_bare(&self.remote).unwrap();
        bare.refname_to_id("refs/heads/main").unwrap().to_string()
    }

    /// Number of commits reachable from the remote's `main`.
    pub fn remote_commit_count(&self) -> usize {
        let bare = Repository::open_bare(&self.remote).unwrap();
        let mut walk = bare.revwalk().unwrap();
        walk.push_ref("refs/heads/main").unwrap();
        walk.count()
    }

    /// Message of the remote's tip commit.
    pub fn remote_head_message(&self) -> String {
        let bare = Repository::open_bare(&self.remote).unwrap();
        let oid = bare.refname_to_id("refs/heads/main").unwrap();
        let commit = bare.find_commit(oid).unwrap();
        commit.message().unwrap().to_string()
    }
}

/// Whether the working copy has anything uncommitted.
pub fn is_clean(path: &Path) -> bool {
    let repo = Repository::open(path).unwrap();
    let mut opts = git2::StatusOptions::new();
    opts.include_untracked(true);
    let clean = repo.statuses(Some(&mut opts)).unwrap().is_empty();
    clean
}

// ---------------------------------------------------------------------------
// Racing — a real git backend that lets another writer in before pushing
// ---------------------------------------------------------------------------

/// Wraps a [`GitBackend`] and runs `before_push` ahead of the first
/// `races` pushes, so a competing writer can publish between our pull and
/// our push.
pub struct Racing<F: FnMut()> {
    pub inner: GitBackend,
    pub before_push: F,
    pub races: usize,
    pub pushes: usize,
}

impl<F: FnMut()> Racing<F> {
    pub fn new(path: &Path, races: usize, before_push: F) -> Self {
        Racing {
            inner: GitBackend::open(path, &RepoOptions::default()).unwrap(),
            before_push,
            races,
            pushes: 0,
        }
    }
}

impl<F: FnMut()> VersionControl for Racing<F> {
    fn workdir(&self) -> &Path {
        self.inner.workdir()
    }

    fn control_dir(&self) -> &Path {
        self.inner.control_dir()
    }

    fn pull(&mut self) -> Result<()> {
        self.inner.pull()
    }

    fn stage_all(&mut self) -> Result<()> {
        self.inner.stage_all()
    }

    fn commit(&mut self, message: &str) -> Result<String> {
        self.inner.commit(message)
    }

    fn push(&mut self) -> Result<PushStatus> {
        self.pushes += 1;
        if self.races > 0 {
            self.races -= 1;
            (self.before_push)();
        }
        self.inner.push()
    }

    fn reset_hard_to_parent(&mut self) -> Result<()> {
        self.inner.reset_hard_to_parent()
    }

    fn restore(&mut self, tip: &str) -> Result<()> {
        self.inner.restore(tip)
    }

    fn head(&self) -> Result<Option<String>> {
        self.inner.head()
    }
}

// ---------------------------------------------------------------------------
// Scripted — an in-memory backend with canned push results
// ---------------------------------------------------------------------------

/// Counts calls and answers pushes from a script. An empty script accepts.
#[derive(Default)]
pub struct Calls {
    pub pulls: usize,
    pub stages: usize,
    pub commits: Vec<String>,
    pub pushes: usize,
    pub resets: usize,
    pub restores: usize,
}

pub struct Scripted {
    pub dir: tempfile::TempDir,
    pub control: tempfile::TempDir,
    /// Results handed out by `push`, front first.
    pub push_results: VecDeque<std::result::Result<PushStatus, SyncFailureKind>>,
    /// Answer once the script runs out.
    pub default_push: PushStatus,
    pub calls: Calls,
    pub tip: usize,
}

impl Scripted {
    pub fn new() -> Self {
        Scripted {
            dir: tempfile::tempdir().unwrap(),
            control: tempfile::tempdir().unwrap(),
            push_results: VecDeque::new(),
            default_push: PushStatus::Accepted,
            calls: Calls::default(),
            tip: 0,
        }
    }

    /// A remote that rejects every push.
    pub fn always_diverging() -> Self {
        Scripted {
            default_push: PushStatus::Diverged,
            ..Self::new()
        }
    }

    pub fn with_pushes(
        results: impl IntoIterator<Item = std::result::Result<PushStatus, SyncFailureKind>>,
    ) -> Self {
        Scripted {
            push_results: results.into_iter().collect(),
            ..Self::new()
        }
    }
}

impl VersionControl for Scripted {
    fn workdir(&self) -> &Path {
        self.dir.path()
    }

    fn control_dir(&self) -> &Path {
        self.control.path()
    }

    fn pull(&mut self) -> Result<()> {
        self.calls.pulls += 1;
        Ok(())
    }

    fn stage_all(&mut self) -> Result<()> {
        self.calls.stages += 1;
        Ok(())
    }

    fn commit(&mut self, message: &str) -> Result<String> {
        self.calls.commits.push(message.to_string());
        self.tip += 1;
        Ok(format!("{:040x}", self.tip))
    }

    fn push(&mut self) -> Result<PushStatus> {
        self.calls.pushes += 1;
        match self.push_results.pop_front() {
            Some(Ok(status)) => Ok(status),
            Some(Err(kind)) => Err(Error::sync_msg(kind, "push", "scripted failure")),
            None => Ok(self.default_push),
        }
    }

    fn reset_hard_to_parent(&mut self) -> Result<()> {
        self.calls.resets += 1;
        self.tip -= 1;
        Ok(())
    }

    fn restore(&mut self, tip: &str) -> Result<()> {
        self.calls.restores += 1;
        self.tip = usize::from_str_radix(tip, 16).unwrap();
        Ok(())
    }

    fn head(&self) -> Result<Option<String>> {
        Ok(Some(format!("{:040x}", self.tip)))
    }
}
