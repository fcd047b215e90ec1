use std::fs;
use std::io;

use tracing::{debug, info};

use super::{Fact, StrategyType};
use crate::error::StrategyError;
use crate::git::GitClient;
use crate::lock::LockPair;

/// What a successful runner did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The checkout is where it should be; install runs next.
    Synced,
    /// Nothing needed doing; the skip script runs instead of install.
    Skipped,
}

/// Everything a runner gets to work with.
///
/// `pair` is the only thing a runner may change; it belongs to the lock
/// keeper, which commits or rolls it back afterwards.
pub struct RunnerConfig<'a, G: ?Sized> {
    pub repo: &'a str,
    pub branch: &'a str,
    pub pair: &'a mut LockPair,
    pub client: &'a G,
}

/// Execute the workflow of `ty`.
///
/// `fact` only feeds the error of an [`StrategyType::Unknown`] run.
pub fn run<G: GitClient + ?Sized>(
    ty: StrategyType,
    fact: Fact,
    c: RunnerConfig<'_, G>,
) -> Result<Outcome, StrategyError> {
    info!(strategy = %ty, repo = c.repo, branch = c.branch, "run strategy");
    match ty {
        StrategyType::InitFromEmpty | StrategyType::InitFromEmptyToLatest => init_to_branch(c),
        StrategyType::InitFromEmptyToLock => init_to_lock(ty, c),
        StrategyType::CreateLock => create_lock(c),
        StrategyType::CreateLatestLock => create_latest_lock(c),
        StrategyType::UpdateToLock => update_to_lock(ty, c),
        StrategyType::UpdateToLatestWithLock => update_to_latest(ty, c),
        StrategyType::Noop => Ok(Outcome::Skipped),
        StrategyType::Retry | StrategyType::NoUpdate => Ok(Outcome::Synced),
        StrategyType::Remove => remove(c),
        StrategyType::Unknown => Err(StrategyError::Unknown { fact }),
    }
}

fn git<T>(op: &'static str, r: anyhow::Result<T>) -> Result<T, StrategyError> {
    r.map_err(|source| StrategyError::Git { op, source })
}

/// Re-point an existing clone at the branch before fetching.
///
/// The branch may not exist locally yet, so failure is expected and the
/// error is dropped. This is the only place a git error is discarded.
fn checkout_best_effort<G: GitClient + ?Sized>(client: &G, branch: &str) {
    if let Err(e) = client.checkout(branch) {
        debug!(branch, err = %format!("{e:#}"), "ignore checkout failure before fetch");
    }
}

fn require_lock(ty: StrategyType, pair: &LockPair) -> Result<(), StrategyError> {
    if pair.current.is_empty() {
        return Err(StrategyError::NoLock { strategy: ty });
    }
    Ok(())
}

fn init_to_branch<G: GitClient + ?Sized>(c: RunnerConfig<'_, G>) -> Result<Outcome, StrategyError> {
    git("clone", c.client.clone_repo(c.repo))?;
    git("pull", c.client.pull_force(c.branch))?;
    git("checkout", c.client.checkout(c.branch))?;
    let next = git("rev-parse", c.client.current_hash())?;
    c.pair.next = next;
    Ok(Outcome::Synced)
}

fn init_to_lock<G: GitClient + ?Sized>(
    ty: StrategyType,
    c: RunnerConfig<'_, G>,
) -> Result<Outcome, StrategyError> {
    require_lock(ty, c.pair)?;
    git("clone", c.client.clone_repo(c.repo))?;
    git("pull", c.client.pull_force(c.branch))?;
    git("checkout", c.client.checkout(&c.pair.current))?;
    Ok(Outcome::Synced)
}

/// checkout(branch, best-effort) → fetch → pull → checkout(branch) → hash.
fn sync_to_branch_tip<G: GitClient + ?Sized>(
    client: &G,
    branch: &str,
) -> Result<String, StrategyError> {
    checkout_best_effort(client, branch);
    git("fetch", client.fetch())?;
    git("pull", client.pull_force(branch))?;
    git("checkout", client.checkout(branch))?;
    git("rev-parse", client.current_hash())
}

fn create_lock<G: GitClient + ?Sized>(c: RunnerConfig<'_, G>) -> Result<Outcome, StrategyError> {
    let next = sync_to_branch_tip(c.client, c.branch)?;
    c.pair.next = next;
    Ok(Outcome::Synced)
}

fn create_latest_lock<G: GitClient + ?Sized>(
    c: RunnerConfig<'_, G>,
) -> Result<Outcome, StrategyError> {
    let current = git("rev-parse", c.client.current_hash())?;
    c.pair.current = current;
    let next = sync_to_branch_tip(c.client, c.branch)?;
    c.pair.next = next;
    Ok(Outcome::Synced)
}

fn update_to_lock<G: GitClient + ?Sized>(
    ty: StrategyType,
    c: RunnerConfig<'_, G>,
) -> Result<Outcome, StrategyError> {
    require_lock(ty, c.pair)?;
    checkout_best_effort(c.client, c.branch);
    git("fetch", c.client.fetch())?;
    git("pull", c.client.pull_force(c.branch))?;
    let head = git("rev-parse", c.client.current_hash())?;
    if head != c.pair.current {
        git("checkout", c.client.checkout(&c.pair.current))?;
    }
    Ok(Outcome::Synced)
}

fn update_to_latest<G: GitClient + ?Sized>(
    ty: StrategyType,
    c: RunnerConfig<'_, G>,
) -> Result<Outcome, StrategyError> {
    require_lock(ty, c.pair)?;
    let next = sync_to_branch_tip(c.client, c.branch)?;
    c.pair.next = next;
    Ok(Outcome::Synced)
}

fn remove<G: GitClient + ?Sized>(c: RunnerConfig<'_, G>) -> Result<Outcome, StrategyError> {
    let path = c.client.work_dir();
    info!(path = %path.display(), "remove repo");
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(Outcome::Synced),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Outcome::Synced),
        Err(source) => Err(StrategyError::Remove {
            path: path.to_path_buf(),
            source,
        }),
    }
}
