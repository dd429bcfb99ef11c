use std::io::{self, Write};

use crate::backend::VersionControl;
use crate::error::{Error, Result};
use crate::store::SyncedRepository;
use crate::types::{Removal, RetryPolicy};

/// What a single invocation asks the store to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    Get,
    Set(String),
    Delete,
}

impl Request {
    /// Build a request from the command-line flags.
    ///
    /// # Errors
    /// Returns [`Error::Usage`] when both a value and `--delete` are given.
    pub fn from_flags(value: Option<String>, delete: bool) -> Result<Self> {
        match (value, delete) {
            (Some(_), true) => Err(Error::usage("Cannot use --value and --delete together.")),
            (Some(value), false) => Ok(Request::Set(value)),
            (None, true) => Ok(Request::Delete),
            (None, false) => Ok(Request::Get),
        }
    }
}

/// How an invocation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// `get` printed a value.
    Found,
    /// `get` or `delete` found no such key.
    NotFound,
    /// The mutation was published.
    Applied,
    /// The operation failed after `attempts` tries.
    Failed { attempts: usize },
}

impl Outcome {
    /// Process exit status: 0 for anything that completed, 1 for failures.
    pub fn exit_code(&self) -> u8 {
        match self {
            Outcome::Found | Outcome::NotFound | Outcome::Applied => 0,
            Outcome::Failed { .. } => 1,
        }
    }
}

/// Drives one user request against a [`SyncedRepository`], retrying
/// mutations as a whole under a [`RetryPolicy`] and reporting to `out`.
pub struct Frontend<B: VersionControl, W: Write> {
    repo: SyncedRepository<B>,
    policy: RetryPolicy,
    out: W,
}

impl<B: VersionControl, W: Write> Frontend<B, W> {
    pub fn new(repo: SyncedRepository<B>, policy: RetryPolicy, out: W) -> Self {
        Frontend { repo, policy, out }
    }

    pub fn into_parts(self) -> (SyncedRepository<B>, W) {
        (self.repo, self.out)
    }

    /// Execute `request` for `key`.
    ///
    /// Reads are attempted once. Writes and deletes are attempted up to
    /// `policy.attempts()` times with `policy.delay` between attempts;
    /// errors that cannot improve on retry (bad keys) stop the loop early.
    pub fn run(&mut self, key: &str, request: &Request) -> io::Result<Outcome> {
        match request {
            Request::Get => self.get(key),
            Request::Set(value) => {
                let done = self.retry("set", "setting", key, |repo| {
                    repo.write(key, value.as_bytes())
                })?;
                match done {
                    Ok(()) => {
                        writeln!(self.out, "Key '{}' set.", key)?;
                        Ok(Outcome::Applied)
                    }
                    Err(attempts) => Ok(Outcome::Failed { attempts }),
                }
            }
            Request::Delete => {
                let done = self.retry("delete", "deleting", key, |repo| repo.delete(key))?;
                match done {
                    Ok(Removal::Removed) => {
                        writeln!(self.out, "Key '{}' deleted.", key)?;
                        Ok(Outcome::Applied)
                    }
                    Ok(Removal::NotFound) => {
                        writeln!(self.out, "Key '{}' not found.", key)?;
                        Ok(Outcome::NotFound)
                    }
                    Err(attempts) => Ok(Outcome::Failed { attempts }),
                }
            }
        }
    }

    fn get(&mut self, key: &str) -> io::Result<Outcome> {
        match self.repo.read(key) {
            Ok(Some(data)) => {
                writeln!(self.out, "{}", String::from_utf8_lossy(&data))?;
                Ok(Outcome::Found)
            }
            Ok(None) => {
                writeln!(self.out, "Key '{}' not found.", key)?;
                Ok(Outcome::NotFound)
            }
            Err(e) => {
                writeln!(self.out, "Error reading key '{}': {}", key, e)?;
                Ok(Outcome::Failed { attempts: 1 })
            }
        }
    }

    /// Run `op` until it succeeds or the budget is spent. The inner result is
    /// `Err(attempts_made)` on failure.
    fn retry<T>(
        &mut self,
        verb: &str,
        gerund: &str,
        key: &str,
        mut op: impl FnMut(&mut SyncedRepository<B>) -> Result<T>,
    ) -> io::Result<std::result::Result<T, usize>> {
        let attempts = self.policy.attempts();
        let mut made = 0;

        while made < attempts {
            made += 1;
            match op(&mut self.repo) {
                Ok(v) => return Ok(Ok(v)),
                Err(e) => {
                    log::debug!("{} {:?} failed: {:?}", verb, key, e);
                    writeln!(
                        self.out,
                        "Error {} key (Attempt {}/{}): {}",
                        gerund, made, attempts, e
                    )?;
                    if !e.is_retryable() {
                        break;
                    }
                    if made < attempts {
                        writeln!(self.out, "Retrying in {:?}...", self.policy.delay)?;
                        std::thread::sleep(self.policy.delay);
                    }
                }
            }
        }

        writeln!(
            self.out,
            "Failed to {} key '{}' after {} attempt{}.",
            verb,
            key,
            made,
            if made == 1 { "" } else { "s" }
        )?;
        Ok(Err(made))
    }
}
