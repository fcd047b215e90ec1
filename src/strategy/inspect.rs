use std::path::Path;

use tracing::debug;

use super::{Fact, LockExistence, RepoExistence, RepoStatus, UpdateSpec};
use crate::git::GitClient;
use crate::lock::read_lock;

/// Caller flags that shape the update spec.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Intent {
    pub update: bool,
    pub retry: bool,
    pub no_update: bool,
    pub remove: bool,
    pub uninstall: bool,
}

impl Intent {
    /// Collapse the flags into one spec.
    ///
    /// Precedence: no-update, retry, update, remove, uninstall.
    pub fn spec(self) -> UpdateSpec {
        if self.no_update {
            UpdateSpec::NoUpdate
        } else if self.retry {
            UpdateSpec::Retry
        } else if self.update {
            UpdateSpec::Force
        } else if self.remove {
            UpdateSpec::Remove
        } else if self.uninstall {
            UpdateSpec::Uninstall
        } else {
            UpdateSpec::Unspecified
        }
    }
}

/// Observe the checkout and the lock file.
///
/// Never fails: anything that cannot be read degrades to `None`/`Unknown`.
pub fn inspect<G: GitClient + ?Sized>(git: &G, lock_file: &Path, intent: Intent) -> Fact {
    let head = git.current_hash();
    let lock = read_lock(lock_file);
    debug!(?head, ?lock, lock_file = %lock_file.display(), "inspect");

    let repo = match head {
        Ok(_) => RepoExistence::Exists,
        Err(_) => RepoExistence::None,
    };
    let lock_existence = match &lock {
        Ok(content) if !content.is_empty() => LockExistence::Exists,
        _ => LockExistence::None,
    };
    let status = match (&lock, &head) {
        (Ok(locked), Ok(current)) if locked == current => RepoStatus::Match,
        (Ok(_), Ok(_)) => RepoStatus::Conflict,
        _ => RepoStatus::Unknown,
    };

    Fact::new(repo, lock_existence, status, intent.spec())
}
