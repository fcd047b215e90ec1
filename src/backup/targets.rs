use std::path::PathBuf;

use tracing::info;

use super::{Backuper, Snapshot};
use crate::error::BackupError;
use crate::lock::write_atomic;

/// Snapshot of the lock file, followed by an overwrite.
///
/// With an explicit commit the live file is replaced by it, so the next
/// inspection pins that commit. Without one, a clean reinstall truncates
/// the file so the checkout is synchronized from scratch.
#[derive(Debug)]
pub struct LockFileBackup {
    path: PathBuf,
    commit: Option<String>,
    clean: bool,
    snapshot: Option<Snapshot>,
}

impl LockFileBackup {
    pub fn new(path: impl Into<PathBuf>, commit: Option<String>, clean: bool) -> Self {
        Self {
            path: path.into(),
            commit,
            clean,
            snapshot: None,
        }
    }

    fn overwrite(&self, content: &str) -> Result<(), BackupError> {
        write_atomic(&self.path, content).map_err(|source| BackupError::Io {
            op: "write",
            path: self.path.clone(),
            source,
        })
    }
}

impl Backuper for LockFileBackup {
    fn create(&mut self) -> Result<(), BackupError> {
        self.snapshot = Some(Snapshot::copy_of(&self.path)?);
        match (&self.commit, self.clean) {
            (Some(commit), _) => {
                info!(lock = %self.path.display(), %commit, "pin lock");
                self.overwrite(commit)
            }
            (None, true) => {
                info!(lock = %self.path.display(), "truncate lock");
                self.overwrite("")
            }
            (None, false) => Ok(()),
        }
    }

    fn restore(&mut self) -> Result<(), BackupError> {
        match self.snapshot.take() {
            Some(s) => s.restore(),
            None => Ok(()),
        }
    }

    fn close(&mut self) -> Result<(), BackupError> {
        match self.snapshot.take() {
            Some(s) => s.close(),
            None => Ok(()),
        }
    }
}

/// Snapshot of the repo directory.
///
/// A clean reinstall moves the repo aside so the next run starts without a
/// checkout. A pinned commit copies it, leaving the checkout in place for
/// the runner to move.
#[derive(Debug)]
pub struct RepoBackup {
    path: PathBuf,
    aside: bool,
    snapshot: Option<Snapshot>,
}

impl RepoBackup {
    /// Move the repo out of the way on create.
    pub fn moving(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            aside: true,
            snapshot: None,
        }
    }

    /// Copy the repo on create, leaving it in place.
    pub fn copying(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            aside: false,
            snapshot: None,
        }
    }
}

impl Backuper for RepoBackup {
    fn create(&mut self) -> Result<(), BackupError> {
        let snapshot = if self.aside {
            info!(repo = %self.path.display(), "move repo aside");
            Snapshot::move_of(&self.path)?
        } else {
            info!(repo = %self.path.display(), "copy repo");
            Snapshot::copy_of(&self.path)?
        };
        self.snapshot = Some(snapshot);
        Ok(())
    }

    fn restore(&mut self) -> Result<(), BackupError> {
        match self.snapshot.take() {
            Some(s) => {
                info!(repo = %self.path.display(), "restore repo");
                s.restore()
            }
            None => Ok(()),
        }
    }

    fn close(&mut self) -> Result<(), BackupError> {
        match self.snapshot.take() {
            Some(s) => s.close(),
            None => Ok(()),
        }
    }
}
