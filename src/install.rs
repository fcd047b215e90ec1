//! The install path: check, setup, synchronize, install, and unwind on
//! failure.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

use crate::backup::{self, Backuper};
use crate::config::{Config, Steps, load_config};
use crate::error::ExecError;
use crate::exec::{CancelToken, ScriptExecutor, ShellExecutor, Step};
use crate::git::{Git2Client, GitClient};
use crate::lock::{FileKeeper, GitKeeper, LockKeeper, ensure_lock};
use crate::progress::{finish_err, finish_ok};
use crate::strategy::{
    Fact, Intent, Outcome, RunnerConfig, StrategyType, UpdateSpec, inspect, run,
};
use crate::target::Target;

/// How an install ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallOutcome {
    /// The check script said no.
    Declined,
    /// Already up to date; the skip script ran.
    Skipped { strategy: StrategyType },
    /// The install script ran. `lock` is the commit now recorded.
    Installed {
        strategy: StrategyType,
        lock: Option<String>,
    },
}

/// What a run would do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Plan {
    pub fact: Fact,
    pub strategy: StrategyType,
}

/// Drives one install against a git client and a script executor.
pub struct Installer<'a, G: ?Sized, E: ?Sized> {
    target: &'a Target,
    steps: &'a Steps,
    intent: Intent,
    git: &'a G,
    exec: &'a E,
}

impl<'a, G: GitClient + ?Sized, E: ScriptExecutor + ?Sized> Installer<'a, G, E> {
    pub fn new(target: &'a Target, steps: &'a Steps, intent: Intent, git: &'a G, exec: &'a E) -> Self {
        Self {
            target,
            steps,
            intent,
            git,
            exec,
        }
    }

    fn repo_dir(&self) -> &Path {
        &self.target.paths.repo_dir
    }

    fn script(&self, step: Step, dir: &Path) -> Result<(), ExecError> {
        let lines = self.steps.get(step);
        if !lines.is_empty() {
            info!(%step, "run script");
        }
        self.exec.execute(step, lines, dir, &self.target.env)
    }

    fn plan(&self) -> Plan {
        let fact = inspect(self.git, &self.target.paths.lock_file, self.intent);
        let strategy = fact.select();
        info!(
            lock = %self.target.paths.lock_file.display(),
            %fact,
            %strategy,
            "strategy"
        );
        Plan { fact, strategy }
    }

    /// Backups are created, the plan is computed and the backups are
    /// restored again. Apart from the work dir being created, nothing else
    /// is touched.
    pub fn dry_run(&self, backups: &mut dyn Backuper) -> Result<Plan> {
        self.target.paths.ensure()?;
        with_backups(backups, true, || Ok(self.plan()))
    }

    pub fn install(&self, backups: &mut dyn Backuper) -> Result<InstallOutcome> {
        let work_dir = &self.target.paths.work_dir;
        self.target.paths.ensure()?;

        match self.script(Step::Check, work_dir) {
            Ok(()) => {}
            Err(e @ ExecError::Cancelled { .. }) => return Err(e.into()),
            Err(e) => {
                info!(error = %e, "check failed, installation cancelled");
                return Ok(InstallOutcome::Declined);
            }
        }
        self.script(Step::Setup, work_dir).context("run setup")?;

        with_backups(backups, false, || self.attempt())
    }

    fn attempt(&self) -> Result<InstallOutcome> {
        let lock_file = &self.target.paths.lock_file;
        ensure_lock(lock_file).with_context(|| format!("ensure lock {}", lock_file.display()))?;

        let Plan { fact, strategy } = self.plan();
        let mut keeper = GitKeeper::new(FileKeeper::load(lock_file), self.git);
        let synced = run(
            strategy,
            fact,
            RunnerConfig {
                repo: &self.target.uri,
                branch: &self.target.branch,
                pair: keeper.pair_mut(),
                client: self.git,
            },
        );

        let res = match synced {
            Ok(Outcome::Skipped) => {
                info!("skip");
                self.script(Step::Skip, self.repo_dir()).context("run skip")?;
                return Ok(InstallOutcome::Skipped { strategy });
            }
            Ok(Outcome::Synced) => self.script(Step::Install, self.repo_dir()).context("run install"),
            Err(e) => Err(anyhow::Error::new(e).context("run strategy")),
        };

        if let Err(e) = res {
            self.rollback(&keeper, fact.spec);
            return Err(e);
        }
        keeper.commit().context("commit lock")?;

        let pair = keeper.pair();
        let lock = [&pair.next, &pair.current]
            .into_iter()
            .find(|h| !h.is_empty())
            .cloned();
        Ok(InstallOutcome::Installed { strategy, lock })
    }

    fn rollback<K: LockKeeper>(&self, keeper: &GitKeeper<'_, K, G>, spec: UpdateSpec) {
        if spec == UpdateSpec::NoUpdate {
            info!("skip rollback of repo and lock");
        } else {
            error!("rollback");
            if let Err(e) = keeper.rollback() {
                error!(error = %e, "rollback failed");
            }
        }
        if let Err(e) = self.script(Step::Rollback, self.repo_dir()) {
            error!(error = %e, "rollback script failed");
        }
    }
}

/// Run `f` between creating and closing `backups`.
///
/// The backups are restored when `f` fails, or always when `dry`.
fn with_backups<T>(backups: &mut dyn Backuper, dry: bool, f: impl FnOnce() -> Result<T>) -> Result<T> {
    if let Err(e) = backups.create() {
        if let Err(e) = backups.restore() {
            error!(error = %e, "restore backup");
        }
        if let Err(e) = backups.close() {
            warn!(error = %e, "close backup");
        }
        return Err(e).context("create backup");
    }

    let res = f();
    if (dry || res.is_err())
        && let Err(e) = backups.restore()
    {
        error!(error = %e, "restore backup");
    }
    if let Err(e) = backups.close() {
        warn!(error = %e, "close backup");
    }
    res
}

/// Arguments of `ivg run`.
#[derive(Debug, Clone, Default)]
pub struct RunArgs {
    pub config: String,
    pub work_dir: PathBuf,
    pub intent: Intent,
    pub dry: bool,
    pub commit: Option<String>,
    pub clean: bool,
    pub shell: Option<Vec<String>>,
}

/// CLI command: install or update the configured tool.
pub fn cmd_run(args: RunArgs) -> Result<()> {
    let cfg: Config = load_config(&args.config)?;
    let target = Target::resolve(&cfg, &args.work_dir)?;
    let paths = &target.paths;
    let cancel = CancelToken::from_signals()?;
    let git = Git2Client::new(&paths.repo_dir, cancel.clone());
    let shell = cfg.shell_or(args.shell);
    info!(
        uri = %target.uri,
        branch = %target.branch,
        repo = %paths.repo_dir.display(),
        ?shell,
        "target"
    );
    let exec = ShellExecutor::new(shell, cancel);
    let installer = Installer::new(&target, &cfg.steps, args.intent, &git, &exec);
    let mut backups = backup::plan(
        &paths.lock_file,
        &paths.repo_dir,
        args.commit.as_deref(),
        args.clean,
    );

    if args.dry {
        let plan = installer.dry_run(&mut backups)?;
        finish_ok(format!("dry run: {} ({})", plan.strategy, plan.fact));
        return Ok(());
    }

    info!("start installation");
    match installer.install(&mut backups) {
        Ok(InstallOutcome::Declined) => finish_ok(format!("{}: declined by check", target.uri)),
        Ok(InstallOutcome::Skipped { strategy }) => {
            finish_ok(format!("{}: up to date ({strategy})", target.uri))
        }
        Ok(InstallOutcome::Installed { strategy, lock }) => finish_ok(format!(
            "{}: installed {} ({strategy})",
            target.uri,
            lock.as_deref().unwrap_or("-")
        )),
        Err(e) => {
            finish_err(format!("{}: install failed (error: {e:#})", target.uri));
            return Err(e);
        }
    }
    Ok(())
}
