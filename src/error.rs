//! Error types shared across the crate.
//!
//! Each domain gets its own enum; command-level code wraps them in
//! `anyhow::Error` with context, the same way the git backend does.

use std::path::PathBuf;

use thiserror::Error;

use crate::exec::Step;
use crate::strategy::{Fact, StrategyType};

/// Failures raised by a strategy runner.
#[derive(Debug, Error)]
pub enum StrategyError {
    /// A lock-dependent strategy was selected but no commit is recorded.
    #[error("NoLock: {strategy} requires a commit in the lock file")]
    NoLock { strategy: StrategyType },

    /// The fact did not map to any strategy.
    #[error("UnknownStrategy: no strategy for {fact}")]
    Unknown { fact: Fact },

    /// A git operation failed.
    #[error("git {op}")]
    Git {
        op: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("remove {}", path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures raised by the git backend itself, as opposed to libgit2.
#[derive(Debug, Error)]
pub enum GitError {
    /// The cancel token fired before or during a transfer.
    #[error("git {op} cancelled")]
    Cancelled { op: &'static str },
}

/// Failures raised while persisting or restoring the lock pair.
#[derive(Debug, Error)]
pub enum KeeperError {
    #[error("write {hash} into {}", path.display())]
    Write {
        hash: String,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("clear {}", path.display())]
    Clear {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Rollback attempts both halves; either or both may have failed.
    #[error("rollback failed:{}{}",
        lock.as_ref().map(|e| format!(" lock: {e:#};")).unwrap_or_default(),
        reset.as_ref().map(|e| format!(" reset: {e:#};")).unwrap_or_default())]
    Rollback {
        lock: Option<Box<KeeperError>>,
        reset: Option<anyhow::Error>,
    },
}

/// Failures raised by the backup subsystem.
#[derive(Debug, Error)]
pub enum BackupError {
    #[error("staged copy of {} does not match its digest", source_path.display())]
    Corrupted { source_path: PathBuf },

    /// The staged copy could not be put back and was left at `kept`.
    #[error("restore {} (staged copy kept at {})", source_path.display(), kept.display())]
    Restore {
        source_path: PathBuf,
        kept: PathBuf,
        #[source]
        cause: Box<BackupError>,
    },

    #[error("{op} {}", path.display())]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failures raised while running a lifecycle script.
#[derive(Debug, Error)]
pub enum ExecError {
    #[error("{step} script: spawn {shell}")]
    Spawn {
        step: Step,
        shell: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{step} script exited with {status}")]
    Failed { step: Step, status: String },

    #[error("{step} script cancelled")]
    Cancelled { step: Step },

    #[error("{step} script: {op}")]
    Io {
        step: Step,
        op: &'static str,
        #[source]
        source: std::io::Error,
    },
}

/// Failures raised while loading the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config not found: {path}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {message}")]
    Invalid { message: String },
}
