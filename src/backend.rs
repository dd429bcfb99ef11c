use std::path::Path;

use crate::error::Result;
use crate::types::PushStatus;

/// The version-control capabilities the synchronization protocol relies on.
///
/// Implementations are bound to one working copy, one remote and one branch
/// at construction time. [`GitBackend`](crate::git::GitBackend) is the
/// libgit2 implementation; anything that can provide these operations with
/// the same accepted/diverged/error outcomes can stand in for it.
pub trait VersionControl {
    /// Root of the working copy. Keys resolve relative to it.
    fn workdir(&self) -> &Path;

    /// Directory for auxiliary files (the process lock) that must stay out
    /// of the tracked tree.
    fn control_dir(&self) -> &Path;

    /// Fetch the bound branch and integrate it into the local branch.
    ///
    /// Uncommitted changes, such as those left by a mutation that failed
    /// before it could be restored, are discarded first. Local commits are
    /// kept unless the remote has diverged from them.
    fn pull(&mut self) -> Result<()>;

    /// Stage every working-copy change, deletions included.
    fn stage_all(&mut self) -> Result<()>;

    /// Commit the staged tree on top of the local branch tip and return the
    /// new commit id (hex).
    fn commit(&mut self, message: &str) -> Result<String>;

    /// Push the local branch to the remote.
    ///
    /// A non-fast-forward refusal is reported as [`PushStatus::Diverged`],
    /// every other failure as an error.
    fn push(&mut self) -> Result<PushStatus>;

    /// Move the local branch, index and working tree to the first parent of
    /// the current tip, discarding the tip commit and its changes.
    fn reset_hard_to_parent(&mut self) -> Result<()>;

    /// Move the local branch back to `tip` (hex) and discard every
    /// uncommitted change, untracked files included.
    fn restore(&mut self, tip: &str) -> Result<()>;

    /// Current tip of the local branch (hex), if any.
    fn head(&self) -> Result<Option<String>>;
}
