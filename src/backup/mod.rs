//! Snapshots of mutable state taken before an install attempt.
//!
//! A [`Backuper`] is created before anything is mutated, restored when the
//! attempt fails and closed in every case. [`plan`] picks the backups a run
//! needs from its flags.

mod snapshot;
mod targets;

use std::path::Path;

use tracing::warn;

use crate::error::BackupError;

pub use snapshot::Snapshot;
pub use targets::{LockFileBackup, RepoBackup};

pub trait Backuper {
    /// Take the snapshot and apply the backup's own mutation, if any.
    fn create(&mut self) -> Result<(), BackupError>;
    /// Put the snapshot back. Does nothing before `create` or after a
    /// previous restore.
    fn restore(&mut self) -> Result<(), BackupError>;
    /// Discard the snapshot.
    fn close(&mut self) -> Result<(), BackupError>;
}

/// Used when a run needs no safety net.
#[derive(Debug, Default)]
pub struct NoopBackup;

impl Backuper for NoopBackup {
    fn create(&mut self) -> Result<(), BackupError> {
        Ok(())
    }

    fn restore(&mut self) -> Result<(), BackupError> {
        Ok(())
    }

    fn close(&mut self) -> Result<(), BackupError> {
        Ok(())
    }
}

/// Applies a list of backups in registration order.
#[derive(Default)]
pub struct BackupList(Vec<Box<dyn Backuper>>);

impl BackupList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, b: impl Backuper + 'static) {
        self.0.push(Box::new(b));
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Run `op` on every entry, logging failures and returning the first.
    fn each(
        &mut self,
        what: &str,
        op: impl Fn(&mut dyn Backuper) -> Result<(), BackupError>,
    ) -> Result<(), BackupError> {
        let mut first = None;
        for b in &mut self.0 {
            if let Err(e) = op(b.as_mut()) {
                warn!(error = %e, "backup {what}");
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }
}

impl Backuper for BackupList {
    fn create(&mut self) -> Result<(), BackupError> {
        for b in &mut self.0 {
            b.create()?;
        }
        Ok(())
    }

    fn restore(&mut self) -> Result<(), BackupError> {
        self.each("restore", |b| b.restore())
    }

    fn close(&mut self) -> Result<(), BackupError> {
        self.each("close", |b| b.close())
    }
}

/// Backups for a run.
///
/// An explicit `commit` or a `clean` reinstall rewrites the lock file, so
/// the lock is snapshotted first. The repo is snapshotted alongside it so a
/// restore never leaves the lock and the checkout on different commits: a
/// clean reinstall moves it out of the way, a pinned commit copies it.
pub fn plan(lock_file: &Path, repo_dir: &Path, commit: Option<&str>, clean: bool) -> BackupList {
    let mut list = BackupList::new();
    if commit.is_some() || clean {
        list.push(LockFileBackup::new(lock_file, commit.map(str::to_string), clean));
    }
    if clean {
        list.push(RepoBackup::moving(repo_dir));
    } else if commit.is_some() {
        list.push(RepoBackup::copying(repo_dir));
    }
    list
}
