//! A key-value store replicated through a git remote.
//!
//! `gitkv` treats the working copy of a git repository as a key-value map:
//! keys are relative file paths, values are file contents. Every read pulls
//! from the remote first, and every write or delete is committed and pushed
//! straight away. When two writers race, the one whose push is rejected
//! throws its commit away, pulls the winner's state and applies its change
//! again, so the last successful push wins for each key.
//!
//! # Key types
//!
//! - [`SyncedRepository`] — the synchronized key-value view of a working
//!   copy; owns the pull/mutate/publish cycle and its conflict retry.
//! - [`VersionControl`] — the capabilities the cycle needs from a version
//!   control system; [`GitBackend`] implements it with libgit2.
//! - [`Frontend`] — runs one user [`Request`] with an outer
//!   [`RetryPolicy`], as the `gitkv` binary does.
//!
//! # Quick example
//!
//! ```rust,no_run
//! use gitkv::{RepoOptions, SyncedRepository};
//!
//! let mut store = SyncedRepository::open("/tmp/kvrepo", RepoOptions::default()).unwrap();
//!
//! store.write("a.txt", b"hello").unwrap();
//! assert_eq!(store.read("a.txt").unwrap().as_deref(), Some(&b"hello"[..]));
//! store.delete("a.txt").unwrap();
//! ```

pub mod backend;
pub mod error;
pub mod frontend;
pub mod git;
pub mod lock;
pub mod paths;
pub mod remote;
pub mod store;
pub mod types;

// Re-export primary public types at crate root.
pub use backend::VersionControl;
pub use error::{Error, Result, SyncFailureKind};
pub use frontend::{Frontend, Outcome, Request};
pub use git::GitBackend;
pub use store::{SyncedRepository, MAX_PUBLISH_ATTEMPTS};
pub use types::*;
