use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use crate::config::{Steps, load_config};
use crate::exec::{CancelToken, ScriptExecutor, ShellExecutor, Step};
use crate::git::{Git2Client, GitClient};
use crate::install::Plan;
use crate::lock::{FileKeeper, GitKeeper};
use crate::progress::{finish_err, finish_ok};
use crate::strategy::{Intent, RunnerConfig, StrategyType, inspect, run};
use crate::target::Target;

/// What happens to the clone and the lock after the uninstall script.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Removal {
    /// Leave both in place.
    #[default]
    Keep,
    /// Delete the clone.
    Remove,
    /// Delete the clone and clear the lock.
    Purge,
}

pub struct Uninstaller<'a, G: ?Sized, E: ?Sized> {
    target: &'a Target,
    steps: &'a Steps,
    removal: Removal,
    git: &'a G,
    exec: &'a E,
}

impl<'a, G: GitClient + ?Sized, E: ScriptExecutor + ?Sized> Uninstaller<'a, G, E> {
    pub fn new(target: &'a Target, steps: &'a Steps, removal: Removal, git: &'a G, exec: &'a E) -> Self {
        Self {
            target,
            steps,
            removal,
            git,
            exec,
        }
    }

    pub fn plan(&self) -> Plan {
        let intent = Intent {
            uninstall: true,
            remove: self.removal != Removal::Keep,
            ..Intent::default()
        };
        let fact = inspect(self.git, &self.target.paths.lock_file, intent);
        let strategy = fact.select();
        info!(%fact, %strategy, removal = ?self.removal, "strategy");
        Plan { fact, strategy }
    }

    /// Run the uninstall script, then the selected strategy.
    ///
    /// The script only runs when the clone exists.
    pub fn uninstall(&self) -> Result<StrategyType> {
        let Plan { fact, strategy } = self.plan();
        let repo_dir = &self.target.paths.repo_dir;

        if repo_dir.exists() {
            info!("uninstall");
            self.exec
                .execute(
                    Step::Uninstall,
                    self.steps.get(Step::Uninstall),
                    repo_dir,
                    &self.target.env,
                )
                .context("run uninstall")?;
        }

        let mut keeper = GitKeeper::new(FileKeeper::load(&self.target.paths.lock_file), self.git);
        // Skipped is the normal outcome of a plain uninstall.
        run(
            strategy,
            fact,
            RunnerConfig {
                repo: &self.target.uri,
                branch: &self.target.branch,
                pair: keeper.pair_mut(),
                client: self.git,
            },
        )
        .context("run strategy")?;

        if self.removal == Removal::Purge {
            info!("clear lock");
            keeper.clear().context("clear lock")?;
        }
        Ok(strategy)
    }
}

/// Arguments of `ivg uninstall`.
#[derive(Debug, Clone, Default)]
pub struct UninstallArgs {
    pub config: String,
    pub work_dir: PathBuf,
    pub dry: bool,
    pub removal: Removal,
    pub shell: Option<Vec<String>>,
}

/// CLI command: run the uninstall script and optionally drop the clone.
pub fn cmd_uninstall(args: UninstallArgs) -> Result<()> {
    let cfg = load_config(&args.config)?;
    let target = Target::resolve(&cfg, &args.work_dir)?;
    let cancel = CancelToken::from_signals()?;
    let git = Git2Client::new(&target.paths.repo_dir, cancel.clone());
    let shell = cfg.shell_or(args.shell);
    let exec = ShellExecutor::new(shell, cancel);
    let uninstaller = Uninstaller::new(&target, &cfg.steps, args.removal, &git, &exec);

    if args.dry {
        let plan = uninstaller.plan();
        finish_ok(format!("dry run: {} ({})", plan.strategy, plan.fact));
        return Ok(());
    }

    info!(shell = ?exec.shell(), "start uninstallation");
    match uninstaller.uninstall() {
        Ok(strategy) => {
            finish_ok(format!("{}: uninstalled ({strategy})", target.uri));
            Ok(())
        }
        Err(e) => {
            finish_err(format!("{}: uninstall failed (error: {e:#})", target.uri));
            Err(e)
        }
    }
}
