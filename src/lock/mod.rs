//! The lock file and the commit pair it guards.
//!
//! A lock file holds a single commit hash. [`FileKeeper`] loads it into a
//! [`LockPair`] at the start of a run and writes either side back: `next`
//! on commit, `current` on rollback. Empty values are never written.
//!
//! [`GitKeeper`] layers a hard reset of the checkout on top of the rollback.

mod git_keeper;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::KeeperError;

pub use git_keeper::GitKeeper;

/// Commit hashes before and after a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LockPair {
    /// Hash recorded when the run started; empty when there was none.
    pub current: String,
    /// Hash a runner synchronized to; empty until a runner sets it.
    pub next: String,
}

/// Persists a [`LockPair`].
pub trait LockKeeper {
    fn pair(&self) -> &LockPair;
    fn pair_mut(&mut self) -> &mut LockPair;
    /// Write `next`; no-op when it is empty.
    fn commit(&self) -> Result<(), KeeperError>;
    /// Write `current`; no-op when it is empty.
    fn rollback(&self) -> Result<(), KeeperError>;
    /// Empty the lock.
    fn clear(&self) -> Result<(), KeeperError>;
}

/// Read the lock file, trimmed.
pub fn read_lock(path: &Path) -> io::Result<String> {
    let content = fs::read_to_string(path)?;
    Ok(content.trim().to_string())
}

/// Create an empty lock file (and its parent) if it is missing.
pub fn ensure_lock(path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(e) => Err(e),
    }
}

/// Replace the content of `path` via a sibling temp file and a rename.
pub(crate) fn write_atomic(path: &Path, content: &str) -> io::Result<()> {
    let tmp = path.with_extension("new");
    fs::write(&tmp, content)?;
    fs::rename(&tmp, path)
}

/// Lock keeper backed by a plain text file.
#[derive(Debug)]
pub struct FileKeeper {
    pair: LockPair,
    path: PathBuf,
}

impl FileKeeper {
    /// Load `current` from the file; unreadable files start empty.
    pub fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let current = read_lock(&path);
        debug!(path = %path.display(), ?current, "keeper load");
        Self {
            pair: LockPair {
                current: current.unwrap_or_default(),
                next: String::new(),
            },
            path,
        }
    }

    fn write(&self, hash: &str) -> Result<(), KeeperError> {
        write_atomic(&self.path, hash).map_err(|source| KeeperError::Write {
            hash: hash.to_string(),
            path: self.path.clone(),
            source,
        })
    }
}

impl LockKeeper for FileKeeper {
    fn pair(&self) -> &LockPair {
        &self.pair
    }

    fn pair_mut(&mut self) -> &mut LockPair {
        &mut self.pair
    }

    fn commit(&self) -> Result<(), KeeperError> {
        debug!(next = %self.pair.next, "keeper commit");
        if self.pair.next.is_empty() {
            return Ok(());
        }
        self.write(&self.pair.next)
    }

    fn rollback(&self) -> Result<(), KeeperError> {
        debug!(current = %self.pair.current, "keeper rollback");
        if self.pair.current.is_empty() {
            return Ok(());
        }
        self.write(&self.pair.current)
    }

    fn clear(&self) -> Result<(), KeeperError> {
        debug!(path = %self.path.display(), "keeper clear");
        write_atomic(&self.path, "").map_err(|source| KeeperError::Clear {
            path: self.path.clone(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn commit_and_rollback_table() {
        let tmp = tempdir().unwrap();
        // (name, init, next, after commit, after rollback)
        let cases = [
            ("empty", "", "", "", ""),
            ("commitonly", "", "next", "next", "next"),
            ("rollbackonly", "init", "", "init", "init"),
            ("rollback", "init", "next", "next", "init"),
        ];
        for (name, init, next, want_commit, want_rollback) in cases {
            let path = tmp.path().join(name);
            fs::write(&path, init).unwrap();

            let mut k = FileKeeper::load(&path);
            assert_eq!(k.pair().current, init, "{name}");
            k.pair_mut().next = next.to_string();

            k.commit().unwrap();
            assert_eq!(read_lock(&path).unwrap(), want_commit, "{name}");
            k.rollback().unwrap();
            assert_eq!(read_lock(&path).unwrap(), want_rollback, "{name}");
        }
    }

    #[test]
    fn commit_round_trips_through_reload() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("lock");
        let mut k = FileKeeper::load(&path);
        k.pair_mut().next = "abc123".into();
        k.commit().unwrap();
        assert_eq!(FileKeeper::load(&path).pair().current, "abc123");
    }

    #[test]
    fn empty_commit_leaves_content_untouched() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("lock");
        fs::write(&path, "keep\n").unwrap();
        let k = FileKeeper::load(&path);
        k.commit().unwrap();
        k.commit().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "keep\n");
    }

    #[test]
    fn load_trims_and_tolerates_missing_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("lock");
        assert_eq!(FileKeeper::load(&path).pair(), &LockPair::default());
        fs::write(&path, "  abc\n").unwrap();
        assert_eq!(FileKeeper::load(&path).pair().current, "abc");
    }

    #[test]
    fn stale_temp_file_is_replaced() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("lock");
        fs::write(path.with_extension("new"), "stale content that is longer").unwrap();
        let mut k = FileKeeper::load(&path);
        k.pair_mut().next = "abc".into();
        k.commit().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "abc");
        assert!(!path.with_extension("new").exists());
    }

    #[test]
    fn clear_empties_the_file() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("lock");
        fs::write(&path, "abc").unwrap();
        FileKeeper::load(&path).clear().unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }

    #[test]
    fn ensure_lock_creates_once() {
        let tmp = tempdir().unwrap();
        let path = tmp.path().join("nested").join("lock");
        ensure_lock(&path).unwrap();
        fs::write(&path, "abc").unwrap();
        ensure_lock(&path).unwrap();
        assert_eq!(read_lock(&path).unwrap(), "abc");
    }
}
