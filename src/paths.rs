use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Filesystem locations of one installation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paths {
    pub work_dir: PathBuf,
    pub repo_dir: PathBuf,
    pub lock_file: PathBuf,
}

impl Paths {
    /// Resolve `locald` and `lock` against `work_dir`, made absolute.
    pub fn resolve(work_dir: &Path, locald: &str, lock: &str) -> Result<Self> {
        let work_dir = std::path::absolute(work_dir)
            .with_context(|| format!("invalid work dir: {}", work_dir.display()))?;
        Ok(Self {
            repo_dir: work_dir.join(locald),
            lock_file: work_dir.join(lock),
            work_dir,
        })
    }

    /// Create the work dir and the directory that will hold the clone.
    pub fn ensure(&self) -> Result<()> {
        fs::create_dir_all(&self.work_dir)
            .with_context(|| format!("ensure work dir {}", self.work_dir.display()))?;
        if let Some(parent) = self.repo_dir.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("ensure repo parent {}", parent.display()))?;
        }
        Ok(())
    }
}
