use tracing::debug;

use super::{LockKeeper, LockPair};
use crate::error::KeeperError;
use crate::git::GitClient;

/// Lock keeper that also owns the checkout's fate on rollback.
///
/// Rollback writes `current` back into the lock file and hard-resets the
/// working directory to it. Both halves always run; failures are combined.
pub struct GitKeeper<'a, K, G: ?Sized> {
    locker: K,
    git: &'a G,
}

impl<'a, K: LockKeeper, G: GitClient + ?Sized> GitKeeper<'a, K, G> {
    pub fn new(locker: K, git: &'a G) -> Self {
        Self { locker, git }
    }

    pub fn pair(&self) -> &LockPair {
        self.locker.pair()
    }

    pub fn pair_mut(&mut self) -> &mut LockPair {
        self.locker.pair_mut()
    }

    pub fn commit(&self) -> Result<(), KeeperError> {
        debug!(hash = %self.pair().next, "gitlock commit");
        self.locker.commit()
    }

    pub fn rollback(&self) -> Result<(), KeeperError> {
        let current = &self.pair().current;
        debug!(hash = %current, "gitlock rollback");

        let lock = self.locker.rollback().err().map(Box::new);
        let reset = if current.is_empty() {
            None
        } else {
            self.git.reset_hard(current).err()
        };

        match (lock, reset) {
            (None, None) => Ok(()),
            (lock, reset) => Err(KeeperError::Rollback { lock, reset }),
        }
    }

    pub fn clear(&self) -> Result<(), KeeperError> {
        self.locker.clear()
    }
}
