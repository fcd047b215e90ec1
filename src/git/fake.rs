//! Git doubles for tests.
//!
//! [`FakeGit`] is an in-memory [`GitClient`]. It models an upstream with
//! named branches, a local clone with local branch pointers and a HEAD, and
//! records every call so tests can assert on the exact workflow a runner
//! performed. [`Upstream`] is a real repository on disk for tests that need
//! libgit2 or a checkout that lives in the filesystem.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Result, anyhow, bail};
use git2::{Commit, Oid, Repository, RepositoryInitOptions, Signature};
use tempfile::{TempDir, tempdir};

use super::GitClient;

#[derive(Debug, Default)]
struct State {
    /// branch -> tip on the upstream.
    upstream: HashMap<String, String>,
    /// Every commit the upstream ever had.
    known: HashSet<String>,
    cloned: bool,
    /// branch -> tip in the local clone, as of the last fetch/pull.
    local: HashMap<String, String>,
    head: Option<String>,
    calls: Vec<String>,
    failing: HashSet<&'static str>,
}

pub struct FakeGit {
    dir: PathBuf,
    state: RefCell<State>,
}

impl FakeGit {
    /// Upstream with `main` at `c0`, nothing cloned yet.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        let fake = Self {
            dir: dir.into(),
            state: RefCell::new(State::default()),
        };
        fake.push("main", "c0");
        fake
    }

    /// Already cloned and sitting on `main` at `head`.
    pub fn cloned(dir: impl Into<PathBuf>, head: &str) -> Self {
        let fake = Self::new(dir);
        fake.push("main", head);
        {
            let mut s = fake.state.borrow_mut();
            s.cloned = true;
            s.local.insert("main".into(), head.into());
            s.head = Some(head.into());
        }
        fake
    }

    /// Advance an upstream branch to `hash`.
    pub fn push(&self, branch: &str, hash: &str) {
        let mut s = self.state.borrow_mut();
        s.upstream.insert(branch.into(), hash.into());
        s.known.insert(hash.into());
    }

    /// Make every later call of `op` fail.
    pub fn fail_on(&self, op: &'static str) {
        self.state.borrow_mut().failing.insert(op);
    }

    pub fn calls(&self) -> Vec<String> {
        self.state.borrow().calls.clone()
    }

    fn enter(&self, op: &'static str, arg: &str) -> Result<()> {
        let mut s = self.state.borrow_mut();
        let call = if arg.is_empty() {
            op.to_string()
        } else {
            format!("{op} {arg}")
        };
        s.calls.push(call);
        if s.failing.contains(op) {
            bail!("injected {op} failure");
        }
        if op != "clone" && op != "current_hash" && !s.cloned {
            bail!("not a git repository: {}", self.dir.display());
        }
        Ok(())
    }
}

impl GitClient for FakeGit {
    fn work_dir(&self) -> &Path {
        &self.dir
    }

    fn clone_repo(&self, url: &str) -> Result<()> {
        self.enter("clone", url)?;
        let mut s = self.state.borrow_mut();
        if s.cloned {
            bail!("destination path {} already exists", self.dir.display());
        }
        s.cloned = true;
        s.local = s.upstream.clone();
        s.head = s.local.get("main").cloned();
        Ok(())
    }

    fn fetch(&self) -> Result<()> {
        self.enter("fetch", "")
    }

    fn checkout(&self, rev: &str) -> Result<()> {
        self.enter("checkout", rev)?;
        let mut s = self.state.borrow_mut();
        let target = match s.local.get(rev) {
            Some(tip) => tip.clone(),
            None if s.known.contains(rev) => rev.to_string(),
            None => return Err(anyhow!("pathspec {rev} did not match")),
        };
        s.head = Some(target);
        Ok(())
    }

    fn reset_hard(&self, rev: &str) -> Result<()> {
        self.enter("reset_hard", rev)?;
        let mut s = self.state.borrow_mut();
        if !s.known.contains(rev) {
            bail!("unknown revision {rev}");
        }
        s.head = Some(rev.to_string());
        Ok(())
    }

    fn pull_force(&self, branch: &str) -> Result<()> {
        self.enter("pull_force", branch)?;
        let mut s = self.state.borrow_mut();
        let tip = s
            .upstream
            .get(branch)
            .cloned()
            .ok_or_else(|| anyhow!("couldn't find remote ref {branch}"))?;
        s.local.insert(branch.into(), tip.clone());
        s.head = Some(tip);
        Ok(())
    }

    fn current_hash(&self) -> Result<String> {
        self.enter("current_hash", "")?;
        let s = self.state.borrow();
        match (&s.head, s.cloned) {
            (Some(h), true) => Ok(h.clone()),
            _ => Err(anyhow!("not a git repository: {}", self.dir.display())),
        }
    }
}

/// A non-bare "remote" repository on disk with `main` as its first branch.
pub struct Upstream {
    _tmp: TempDir,
    repo: Repository,
}

impl Upstream {
    pub fn new() -> Self {
        let tmp = tempdir().unwrap();
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let repo = Repository::init_opts(tmp.path(), &opts).unwrap();
        Self { _tmp: tmp, repo }
    }

    pub fn url(&self) -> String {
        self.repo.workdir().unwrap().to_str().unwrap().to_string()
    }

    /// Write `name` and commit it on `main`.
    pub fn commit(&self, name: &str, content: &str) -> Oid {
        let workdir = self.repo.workdir().unwrap();
        fs::write(workdir.join(name), content).unwrap();
        let mut index = self.repo.index().unwrap();
        index.add_path(Path::new(name)).unwrap();
        index.write().unwrap();
        let tree = self.repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("ivg", "ivg@example.com").unwrap();
        let parent = self.repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<&Commit> = parent.iter().collect();
        self.repo
            .commit(Some("HEAD"), &sig, &sig, name, &tree, &parents)
            .unwrap()
    }

    pub fn tag(&self, name: &str, oid: Oid) {
        let obj = self.repo.find_object(oid, None).unwrap();
        self.repo.tag_lightweight(name, &obj, false).unwrap();
    }
}
