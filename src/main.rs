//! # install-via-git (ivg)
//!
//! **ivg** installs a tool from a git repository and keeps it pinned to the
//! commit recorded in a lock file.
//!
//! Features:
//! - `ivg run` clones or updates the repo and runs the install script
//! - `ivg uninstall` runs the uninstall script, optionally dropping the clone
//! - `ivg parse` prints the config with defaults filled in
//! - `ivg skeleton` prints an annotated config to start from
//!
//! This CLI is built with [clap](https://docs.rs/clap).

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use ivg::{
    Intent, OutputFormat, Removal, RunArgs, UninstallArgs, cmd_parse, cmd_run, cmd_skeleton,
    cmd_uninstall, logging,
};
use std::path::PathBuf;
use tracing::debug;

/// Command-line interface definition.
///
/// Parsed using `clap` derive macros.
#[derive(Parser, Debug)]
#[command(
    name = "ivg",
    version,
    about = "install-via-git (ivg) - install tools via git",
    arg_required_else_help = true
)]
struct Cli {
    /// Enable debug logs
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

/// Flags shared by `run` and `uninstall`.
#[derive(Args, Debug)]
struct TargetArgs {
    /// Configuration file, - to read from stdin
    #[arg(short, long, default_value = "ivg.toml")]
    config: String,
    /// Working directory
    #[arg(short, long = "workDir", visible_alias = "work-dir", default_value = ".")]
    work_dir: PathBuf,
    /// Execute up to strategy determination, no side effects
    #[arg(long)]
    dry: bool,
    /// Shell used to run scripts, separated by comma, e.g. arch,-arm64e,/bin/bash
    #[arg(long, value_delimiter = ',')]
    shell: Option<Vec<String>>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Cmd {
    /// Install or update the configured tool
    Run {
        #[command(flatten)]
        target: TargetArgs,
        /// Force update to the branch tip
        #[arg(short, long)]
        update: bool,
        /// Run install even if there is no update
        #[arg(short, long)]
        retry: bool,
        /// Install at the current commit without updating
        #[arg(long)]
        no_update: bool,
        /// Pin the install to this commit
        #[arg(long)]
        commit: Option<String>,
        /// Remove lock file and repo before installation
        #[arg(long)]
        clean: bool,
    },
    /// Run uninstallation
    Uninstall {
        #[command(flatten)]
        target: TargetArgs,
        /// Remove the repo
        #[arg(long, conflicts_with = "purge")]
        remove: bool,
        /// Remove the repo and clear the lock
        #[arg(long)]
        purge: bool,
    },
    /// Print the config with defaults filled in
    Parse {
        /// Configuration file, - to read from stdin
        #[arg(short, long, default_value = "ivg.toml")]
        config: String,
        /// Output format
        #[arg(short, long, value_enum, default_value_t)]
        output: OutputFormat,
    },
    /// Print an annotated config skeleton
    Skeleton,
}

/// CLI entry point.
///
/// Parses arguments with `clap`, installs the log subscriber and executes
/// the selected subcommand.
fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.debug);
    debug!(?cli, "args");

    match cli.cmd {
        Cmd::Run {
            target,
            update,
            retry,
            no_update,
            commit,
            clean,
        } => cmd_run(RunArgs {
            config: target.config,
            work_dir: target.work_dir,
            intent: Intent {
                update,
                retry,
                no_update,
                ..Intent::default()
            },
            dry: target.dry,
            commit: commit.filter(|c| !c.is_empty()),
            clean,
            shell: target.shell,
        }),
        Cmd::Uninstall {
            target,
            remove,
            purge,
        } => cmd_uninstall(UninstallArgs {
            config: target.config,
            work_dir: target.work_dir,
            dry: target.dry,
            removal: match (remove, purge) {
                (_, true) => Removal::Purge,
                (true, false) => Removal::Remove,
                (false, false) => Removal::Keep,
            },
            shell: target.shell,
        }),
        Cmd::Parse { config, output } => cmd_parse(&config, output),
        Cmd::Skeleton => cmd_skeleton(),
    }
}
