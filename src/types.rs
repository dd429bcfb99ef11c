use std::time::Duration;

// ---------------------------------------------------------------------------
// Signature
// ---------------------------------------------------------------------------

/// Author/committer identity used for commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
}

impl Default for Signature {
    fn default() -> Self {
        Self {
            name: "gitkv".into(),
            email: "gitkv@localhost".into(),
        }
    }
}

// ---------------------------------------------------------------------------
// RepoOptions
// ---------------------------------------------------------------------------

/// Options for binding a [`SyncedRepository`](crate::SyncedRepository) to a
/// working copy.
#[derive(Debug, Clone)]
pub struct RepoOptions {
    /// Name of the configured remote to synchronize with.
    pub remote: String,
    /// Branch that holds the key-value tree, locally and on the remote.
    pub branch: String,
    /// Fallback author name when the repository config has no `user.name`.
    pub author: Option<String>,
    /// Fallback author email when the repository config has no `user.email`.
    pub email: Option<String>,
}

impl Default for RepoOptions {
    fn default() -> Self {
        Self {
            remote: "origin".into(),
            branch: "main".into(),
            author: None,
            email: None,
        }
    }
}

impl RepoOptions {
    /// The signature to fall back on when git config provides none.
    pub fn fallback_signature(&self) -> Signature {
        let default = Signature::default();
        Signature {
            name: self.author.clone().unwrap_or(default.name),
            email: self.email.clone().unwrap_or(default.email),
        }
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// Result of a single commit-and-push attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The commit is on the remote.
    Published,
    /// The remote advanced underneath us; local state was rolled back and
    /// re-pulled, and the mutation must be recomputed.
    RejectedNeedsRetry,
}

/// Result of a push as seen by the version-control layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushStatus {
    Accepted,
    /// Non-fast-forward: a concurrent writer won the race.
    Diverged,
}

/// Result of deleting a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Removed,
    NotFound,
}

/// Where a mutating call currently is in the pull/mutate/publish cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Pulled,
    LocallyMutated,
    Published,
    PublishRejected,
    RolledBack,
}

// ---------------------------------------------------------------------------
// RetryPolicy
// ---------------------------------------------------------------------------

/// Outer retry budget applied by the frontend to whole mutating operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Values below 1 are treated as 1.
    pub attempts: usize,
    /// Fixed pause between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn attempts(&self) -> usize {
        self.attempts.max(1)
    }
}
