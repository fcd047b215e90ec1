//! Crate entry point for **install-via-git (ivg)**.
//!
//! This library provides the internal implementation for the `ivg` CLI.
//! A run inspects the clone and the lock file, picks a strategy, runs it,
//! then runs the install script and commits the lock. Failures roll the
//! lock and the checkout back and restore the backups taken beforehand.
//!
//! This file is primarily intended for developers hacking on `ivg`.

pub mod backup;
pub mod config;
pub mod error;
pub mod exec;
pub mod git;
mod install;
pub mod lock;
pub mod logging;
mod paths;
mod progress;
mod skeleton;
pub mod strategy;
mod target;
mod uninstall;

/// Re-export commonly used types and commands so they can be accessed from `ivg::*`.
pub use config::{Config, OutputFormat, Steps, cmd_parse, load_config};
pub use install::{InstallOutcome, Installer, Plan, RunArgs, cmd_run};
pub use paths::Paths;
pub use skeleton::cmd_skeleton;
pub use strategy::Intent;
pub use target::Target;
pub use uninstall::{Removal, UninstallArgs, Uninstaller, cmd_uninstall};
