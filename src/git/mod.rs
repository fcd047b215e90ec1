//! Git integration layer.
//!
//! Everything above this module talks to git through [`GitClient`], a small
//! capability bound to one working directory. The production implementation
//! ([`Git2Client`]) is based on the `git2` crate; tests use an in-memory fake
//! so the strategy engine and the orchestrator run without real repositories.

mod git2_backend;

#[cfg(test)]
pub(crate) mod fake;

use std::path::Path;

use anyhow::Result;

pub use git2_backend::Git2Client;

/// Git operations scoped to a single working directory.
pub trait GitClient {
    /// The checkout this client operates on.
    fn work_dir(&self) -> &Path;
    /// Clone `url` into the working directory.
    fn clone_repo(&self, url: &str) -> Result<()>;
    /// `git fetch --prune origin`.
    fn fetch(&self) -> Result<()>;
    /// Check out a branch, tag or commit.
    fn checkout(&self, rev: &str) -> Result<()>;
    /// Hard-reset HEAD and the worktree to `rev`.
    fn reset_hard(&self, rev: &str) -> Result<()>;
    /// Move HEAD to the remote tip of `branch`, discarding local divergence.
    fn pull_force(&self, branch: &str) -> Result<()>;
    /// Commit hash of HEAD.
    fn current_hash(&self) -> Result<String>;
}
