//! Strategy selection.
//!
//! A [`Fact`] is the four observations taken before a run; [`select`] maps it
//! to exactly one [`StrategyType`]. The mapping is a pure decision table and
//! is the only place that knows which git workflow fits which state.
//!
//! Runners for each type live in [`runner`], the observations are gathered
//! by [`inspect`].

mod inspect;
mod runner;

use std::fmt;

pub use inspect::{Intent, inspect};
pub use runner::{Outcome, RunnerConfig, run};

/// Whether the working directory holds a checkout with a readable HEAD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepoExistence {
    None,
    Exists,
}

/// Whether the lock file exists with non-empty content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LockExistence {
    None,
    Exists,
}

/// How the checkout relates to the lock file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepoStatus {
    /// Lock or HEAD could not be read.
    Unknown,
    /// Lock and HEAD disagree.
    Conflict,
    /// Lock and HEAD agree.
    Match,
}

/// The caller's intent, reduced to a single value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UpdateSpec {
    Unspecified,
    Force,
    Retry,
    NoUpdate,
    Remove,
    Uninstall,
}

/// Observations driving strategy selection. Computed once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fact {
    pub repo: RepoExistence,
    pub lock: LockExistence,
    pub status: RepoStatus,
    pub spec: UpdateSpec,
}

/// One plan for reconciling the checkout with the lock file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StrategyType {
    /// Clone the repo and create a new lock.
    InitFromEmpty,
    /// Clone the repo and check out the locked commit.
    InitFromEmptyToLock,
    /// Clone the repo and move the lock to the branch tip.
    InitFromEmptyToLatest,
    /// Record the branch tip of an existing checkout.
    CreateLock,
    /// Pull the latest branch tip and record it.
    CreateLatestLock,
    /// Bring the checkout back to the locked commit.
    UpdateToLock,
    /// Pull the latest branch tip and move the lock to it.
    UpdateToLatestWithLock,
    /// Nothing to do; the skip script runs instead of install.
    Noop,
    /// Nothing to do for git, but install runs again.
    Retry,
    /// Leave the repo and the lock alone, but install runs.
    NoUpdate,
    /// Delete the working directory.
    Remove,
    Unknown,
}

/// Map a fact to the strategy that handles it.
///
/// `NoUpdate`, `Remove` and `Uninstall` decide on their own; the other specs
/// go through the full table and anything unmapped is [`StrategyType::Unknown`].
pub fn select(fact: Fact) -> StrategyType {
    use LockExistence as L;
    use RepoExistence as R;
    use RepoStatus as S;
    use UpdateSpec as U;

    match fact.spec {
        U::NoUpdate => return StrategyType::NoUpdate,
        U::Remove => return StrategyType::Remove,
        U::Uninstall => return StrategyType::Noop,
        U::Unspecified | U::Force | U::Retry => {}
    }

    match (fact.repo, fact.lock, fact.status, fact.spec) {
        (R::None, L::None, _, _) => StrategyType::InitFromEmpty,
        (R::None, L::Exists, _, U::Unspecified | U::Retry) => StrategyType::InitFromEmptyToLock,
        (R::None, L::Exists, _, U::Force) => StrategyType::InitFromEmptyToLatest,
        (R::Exists, L::None, _, U::Unspecified | U::Retry) => StrategyType::CreateLock,
        (R::Exists, L::None, _, U::Force) => StrategyType::CreateLatestLock,
        (R::Exists, L::Exists, S::Conflict, U::Unspecified | U::Retry) => {
            StrategyType::UpdateToLock
        }
        (R::Exists, L::Exists, S::Conflict | S::Match | S::Unknown, U::Force) => {
            StrategyType::UpdateToLatestWithLock
        }
        (R::Exists, L::Exists, S::Match, U::Unspecified) => StrategyType::Noop,
        (R::Exists, L::Exists, S::Match, U::Retry) => StrategyType::Retry,
        _ => StrategyType::Unknown,
    }
}

impl Fact {
    pub fn new(repo: RepoExistence, lock: LockExistence, status: RepoStatus, spec: UpdateSpec) -> Self {
        Self {
            repo,
            lock,
            status,
            spec,
        }
    }

    pub fn select(self) -> StrategyType {
        select(self)
    }
}

impl fmt::Display for Fact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "repo={:?} lock={:?} status={:?} spec={:?}",
            self.repo, self.lock, self.status, self.spec
        )
    }
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPOS: [RepoExistence; 2] = [RepoExistence::None, RepoExistence::Exists];
    const LOCKS: [LockExistence; 2] = [LockExistence::None, LockExistence::Exists];
    const STATUSES: [RepoStatus; 3] = [RepoStatus::Unknown, RepoStatus::Conflict, RepoStatus::Match];

    fn all_facts(spec: UpdateSpec) -> impl Iterator<Item = Fact> {
        REPOS.into_iter().flat_map(move |r| {
            LOCKS.into_iter().flat_map(move |l| {
                STATUSES
                    .into_iter()
                    .map(move |s| Fact::new(r, l, s, spec))
            })
        })
    }

    #[test]
    fn intent_only_specs_ignore_observations() {
        for (spec, want) in [
            (UpdateSpec::NoUpdate, StrategyType::NoUpdate),
            (UpdateSpec::Remove, StrategyType::Remove),
            (UpdateSpec::Uninstall, StrategyType::Noop),
        ] {
            for fact in all_facts(spec) {
                assert_eq!(select(fact), want, "{fact}");
            }
        }
    }

    #[test]
    fn empty_checkout_without_lock_always_inits() {
        for spec in [UpdateSpec::Unspecified, UpdateSpec::Retry, UpdateSpec::Force] {
            for status in STATUSES {
                let fact = Fact::new(RepoExistence::None, LockExistence::None, status, spec);
                assert_eq!(select(fact), StrategyType::InitFromEmpty, "{fact}");
            }
        }
    }

    #[test]
    fn decision_table() {
        use LockExistence as L;
        use RepoExistence as R;
        use RepoStatus as S;
        use StrategyType as T;
        use UpdateSpec as U;

        let cases = [
            (R::None, L::Exists, S::Unknown, U::Unspecified, T::InitFromEmptyToLock),
            (R::None, L::Exists, S::Conflict, U::Retry, T::InitFromEmptyToLock),
            (R::None, L::Exists, S::Unknown, U::Force, T::InitFromEmptyToLatest),
            (R::Exists, L::None, S::Unknown, U::Unspecified, T::CreateLock),
            (R::Exists, L::None, S::Unknown, U::Retry, T::CreateLock),
            (R::Exists, L::None, S::Unknown, U::Force, T::CreateLatestLock),
            (R::Exists, L::Exists, S::Conflict, U::Unspecified, T::UpdateToLock),
            (R::Exists, L::Exists, S::Conflict, U::Retry, T::UpdateToLock),
            (R::Exists, L::Exists, S::Conflict, U::Force, T::UpdateToLatestWithLock),
            (R::Exists, L::Exists, S::Match, U::Unspecified, T::Noop),
            (R::Exists, L::Exists, S::Match, U::Retry, T::Retry),
            (R::Exists, L::Exists, S::Match, U::Force, T::UpdateToLatestWithLock),
            (R::Exists, L::Exists, S::Unknown, U::Force, T::UpdateToLatestWithLock),
        ];
        for (r, l, s, u, want) in cases {
            let fact = Fact::new(r, l, s, u);
            assert_eq!(fact.select(), want, "{fact}");
        }
    }

    #[test]
    fn unmapped_combinations_are_unknown() {
        for spec in [UpdateSpec::Unspecified, UpdateSpec::Retry] {
            let fact = Fact::new(
                RepoExistence::Exists,
                LockExistence::Exists,
                RepoStatus::Unknown,
                spec,
            );
            assert_eq!(select(fact), StrategyType::Unknown, "{fact}");
        }
    }
}
