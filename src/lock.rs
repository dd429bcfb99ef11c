use std::fs::OpenOptions;
use std::path::Path;

use fs2::FileExt;

use crate::error::{Error, Result, SyncFailureKind};

/// Acquire an exclusive advisory lock on the working copy, execute `f`, then
/// release by closing the lock file.
///
/// Creates `<dir>/gitkv.lock` and takes a non-blocking `flock`-style lock on
/// it. One process owns a working copy at a time; a second process gets a
/// [`SyncFailureKind::Locked`] failure immediately instead of waiting.
///
/// # Arguments
/// * `dir` - Directory that holds the lock file (the git directory).
/// * `f` - Closure to execute while the lock is held.
///
/// # Errors
/// Returns a `Locked` sync failure if another handle holds the lock, or an
/// I/O error if the lock file cannot be opened.
pub fn with_repo_lock<F, T>(dir: &Path, f: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let lock_path = dir.join("gitkv.lock");
    let file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&lock_path)
        .map_err(|e| Error::io(&lock_path, e))?;

    if let Err(e) = file.try_lock_exclusive() {
        if e.kind() == fs2::lock_contended_error().kind() {
            return Err(Error::sync_msg(
                SyncFailureKind::Locked,
                "lock",
                format!(
                    "another process is using this working copy ({})",
                    lock_path.display()
                ),
            ));
        }
        return Err(Error::io(&lock_path, e));
    }

    // the lock goes with the descriptor when `file` drops
    f()
}
