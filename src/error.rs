use std::fmt;
use std::path::PathBuf;

/// Broad cause of a failed synchronization step.
///
/// Derived from libgit2's structured error codes where possible; see
/// [`SyncFailureKind::classify`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyncFailureKind {
    /// The remote could not be reached (DNS, TCP, TLS, HTTP transport).
    Network,
    /// The remote refused our credentials.
    Auth,
    /// Another process holds a lock on the working copy or its index.
    Locked,
    /// The remote refused the push for a reason other than divergence.
    Rejected,
    /// Anything else.
    Other,
}

impl SyncFailureKind {
    /// Map a libgit2 error onto a failure kind.
    pub fn classify(err: &git2::Error) -> Self {
        match err.code() {
            git2::ErrorCode::Locked => return Self::Locked,
            git2::ErrorCode::Auth | git2::ErrorCode::Certificate => return Self::Auth,
            _ => {}
        }
        match err.class() {
            git2::ErrorClass::Net
            | git2::ErrorClass::Http
            | git2::ErrorClass::Ssh
            | git2::ErrorClass::Ssl => Self::Network,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for SyncFailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Network => "network",
            Self::Auth => "authentication",
            Self::Locked => "lock contention",
            Self::Rejected => "push rejected",
            Self::Other => "git",
        };
        f.write_str(s)
    }
}

/// All errors produced by gitkv.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("invalid repository {}: {reason}", path.display())]
    InvalidRepository { path: PathBuf, reason: String },

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("{0}")]
    Usage(String),

    #[error("{kind} failure during {step}: {source}")]
    SyncFailure {
        kind: SyncFailureKind,
        step: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("push still rejected after {attempts} attempts; remote keeps diverging")]
    PublishRejected { attempts: usize },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

// ---------------------------------------------------------------------------
// Convenience constructors
// ---------------------------------------------------------------------------

impl Error {
    pub fn invalid_repository(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidRepository {
            path: path.into(),
            reason: reason.into(),
        }
    }

    pub fn invalid_key(msg: impl Into<String>) -> Self {
        Self::InvalidKey(msg.into())
    }

    pub fn usage(msg: impl Into<String>) -> Self {
        Self::Usage(msg.into())
    }

    /// Wrap a libgit2 error raised during `step`, classifying its cause.
    pub fn git(step: &'static str, err: git2::Error) -> Self {
        Self::SyncFailure {
            kind: SyncFailureKind::classify(&err),
            step,
            source: Box::new(err),
        }
    }

    pub fn sync_msg(kind: SyncFailureKind, step: &'static str, msg: impl Into<String>) -> Self {
        let msg: String = msg.into();
        Self::SyncFailure {
            kind,
            step,
            source: msg.into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, err: std::io::Error) -> Self {
        Self::Io(std::io::Error::new(
            err.kind(),
            format!("{}: {}", path.into().display(), err),
        ))
    }

    /// The failure kind, if this is a synchronization failure.
    pub fn sync_kind(&self) -> Option<SyncFailureKind> {
        match self {
            Self::SyncFailure { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    /// Whether re-running the whole operation may succeed.
    ///
    /// Bad keys, bad flags and unusable repositories fail the same way
    /// every time.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            Self::InvalidKey(_) | Self::Usage(_) | Self::InvalidRepository { .. }
        )
    }
}
