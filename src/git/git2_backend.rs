use anyhow::{Context, Result, anyhow};
use git2::{
    BranchType, Cred, FetchOptions, FetchPrune, ObjectType, Reference, RemoteCallbacks, Repository,
    ResetType, SubmoduleUpdateOptions,
    build::{CheckoutBuilder, RepoBuilder},
};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::GitClient;
use crate::error::GitError;
use crate::exec::CancelToken;

/// [`GitClient`] backed by libgit2.
///
/// Transfers (clone, fetch, submodule updates) abort once `cancel` fires
/// and fail with [`GitError::Cancelled`].
#[derive(Debug, Clone)]
pub struct Git2Client {
    dir: PathBuf,
    cancel: CancelToken,
}

impl Git2Client {
    pub fn new(dir: impl Into<PathBuf>, cancel: CancelToken) -> Self {
        Self {
            dir: dir.into(),
            cancel,
        }
    }

    fn open(&self) -> Result<Repository> {
        Repository::open(&self.dir).with_context(|| format!("open {}", self.dir.display()))
    }
}

fn ensure_live(cancel: &CancelToken, op: &'static str) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(GitError::Cancelled { op }.into());
    }
    Ok(())
}

impl GitClient for Git2Client {
    fn work_dir(&self) -> &Path {
        &self.dir
    }

    fn clone_repo(&self, url: &str) -> Result<()> {
        debug!(url, dir = %self.dir.display(), "git clone");
        ensure_live(&self.cancel, "clone")?;
        let mut builder = RepoBuilder::new();
        builder.fetch_options(fetch_opts_with_creds(&self.cancel));
        let repo = match builder.clone(url, &self.dir) {
            Ok(repo) => repo,
            Err(e) => {
                ensure_live(&self.cancel, "clone")?;
                return Err(e).with_context(|| format!("git clone {}", url));
            }
        };
        update_submodules(&repo, &self.cancel)
    }

    fn fetch(&self) -> Result<()> {
        debug!(dir = %self.dir.display(), "git fetch");
        fetch_origin(&self.open()?, &self.cancel)
    }

    fn checkout(&self, rev: &str) -> Result<()> {
        debug!(rev, dir = %self.dir.display(), "git checkout");
        checkout_rev(&self.open()?, rev)
    }

    fn reset_hard(&self, rev: &str) -> Result<()> {
        debug!(rev, dir = %self.dir.display(), "git reset --hard");
        let repo = self.open()?;
        let commit = repo
            .revparse_single(rev)
            .with_context(|| format!("rev not found: {}", rev))?
            .peel(ObjectType::Commit)?;
        repo.reset(&commit, ResetType::Hard, Some(CheckoutBuilder::new().force()))
            .with_context(|| format!("git reset --hard {}", rev))?;
        Ok(())
    }

    fn pull_force(&self, branch: &str) -> Result<()> {
        debug!(branch, dir = %self.dir.display(), "git pull --force");
        let repo = self.open()?;
        fetch_origin(&repo, &self.cancel)?;
        attach_to_remote_tip(&repo, branch)?;
        update_submodules(&repo, &self.cancel)
    }

    fn current_hash(&self) -> Result<String> {
        let repo = self.open()?;
        let commit = repo.head().context("read HEAD")?.peel_to_commit()?;
        Ok(commit.id().to_string())
    }
}

/// Build a `FetchOptions` with SSH-agent credentials enabled.
///
/// If no SSH key is found, it falls back to default credentials.
/// Remote-tracking refs deleted upstream are pruned. The progress callbacks
/// abort the transfer once `cancel` fires.
fn fetch_opts_with_creds(cancel: &CancelToken) -> FetchOptions<'static> {
    let mut cb = RemoteCallbacks::new();
    cb.credentials(|_url, username_from_url, _allowed| {
        Cred::ssh_key_from_agent(username_from_url.unwrap_or("git")).or_else(|_| Cred::default())
    });
    let transfer = cancel.clone();
    cb.transfer_progress(move |_| !transfer.is_cancelled());
    let sideband = cancel.clone();
    cb.sideband_progress(move |_| !sideband.is_cancelled());

    let mut fo = FetchOptions::new();
    fo.remote_callbacks(cb);
    fo.prune(FetchPrune::On);
    fo
}

/// Initialize and update all submodules for the given repository.
fn update_submodules(repo: &Repository, cancel: &CancelToken) -> Result<()> {
    let mut subs = repo.submodules().unwrap_or_default();
    for sm in subs.iter_mut() {
        ensure_live(cancel, "submodule update")?;
        sm.init(true)?;
        let mut opt = SubmoduleUpdateOptions::new();
        opt.fetch(fetch_opts_with_creds(cancel));
        if let Err(e) = sm.update(true, Some(&mut opt)) {
            ensure_live(cancel, "submodule update")?;
            return Err(e.into());
        }
    }
    Ok(())
}

/// Perform `git fetch origin` for branches and tags.
fn fetch_origin(repo: &Repository, cancel: &CancelToken) -> Result<()> {
    ensure_live(cancel, "fetch")?;
    let mut fo = fetch_opts_with_creds(cancel);

    let mut remote = repo.find_remote("origin")?;
    let res = remote.fetch(
        &[
            "+refs/heads/*:refs/remotes/origin/*",
            "+refs/tags/*:refs/tags/*",
        ],
        Some(&mut fo),
        None,
    );
    if let Err(e) = res {
        ensure_live(cancel, "fetch")?;
        return Err(e).context("git fetch origin");
    }
    Ok(())
}

/// Point HEAD at the freshly fetched tip of `name` and hard-reset to it.
///
/// A remote branch gets a local branch force-moved to the tip (attached
/// HEAD); a tag is checked out detached. Local divergence is discarded.
fn attach_to_remote_tip(repo: &Repository, name: &str) -> Result<()> {
    if let Ok(remote_ref) = repo.find_reference(&format!("refs/remotes/origin/{}", name)) {
        let tip = remote_ref.peel_to_commit()?;
        // The branch cannot be force-moved while HEAD is on it.
        repo.set_head_detached(tip.id())?;
        let mut b = repo.branch(name, &tip, true)?;
        b.set_upstream(Some(&format!("origin/{}", name)))?;
        repo.set_head(&format!("refs/heads/{}", name))?;
        repo.reset(tip.as_object(), ResetType::Hard, Some(CheckoutBuilder::new().force()))?;
        return Ok(());
    }

    if let Ok(tag_obj) = repo.revparse_single(&format!("refs/tags/{}", name)) {
        let commit = tag_obj
            .peel(ObjectType::Commit)?
            .into_commit()
            .map_err(|_| anyhow!("tag didn't peel to a commit"))?;
        repo.set_head_detached(commit.id())?;
        repo.reset(commit.as_object(), ResetType::Hard, Some(CheckoutBuilder::new().force()))?;
        return Ok(());
    }

    Err(anyhow!("no branch or tag named {} on origin", name))
}

/// Attach HEAD to the given branch reference and update the working tree.
fn checkout_attach_to_reference(repo: &Repository, reference: &Reference) -> Result<()> {
    let name = reference
        .name()
        .ok_or_else(|| anyhow!("invalid reference name"))?;
    repo.set_head(name)?;
    repo.checkout_head(Some(CheckoutBuilder::new().force()))?;
    Ok(())
}

/// Checkout a specific revision (branch, tag, or commit).
///
/// Resolution order:
/// 1. Local branch (`refs/heads/<rev>`) → attach HEAD to the branch
/// 2. Remote branch (`refs/remotes/origin/<rev>`) → create/attach a local tracking branch
/// 3. Tag (`refs/tags/<rev>`) → peel to the commit and detach HEAD
/// 4. Commit SHA or revspec → peel to the commit and detach HEAD
///
/// # Errors
/// Returns an error if the revision cannot be resolved or if checkout fails.
fn checkout_rev(repo: &Repository, rev: &str) -> Result<()> {
    if let Ok(reference) = repo.find_reference(&format!("refs/heads/{}", rev)) {
        checkout_attach_to_reference(repo, &reference)?;
        return Ok(());
    }

    if let Ok(remote_ref) = repo.find_reference(&format!("refs/remotes/origin/{}", rev)) {
        let target_commit = remote_ref.peel_to_commit()?;

        let reference = match repo.find_branch(rev, BranchType::Local) {
            Ok(b) => b.into_reference(),
            Err(_) => {
                let mut b = repo.branch(rev, &target_commit, true)?;
                b.set_upstream(Some(&format!("origin/{}", rev)))?;
                b.into_reference()
            }
        };

        checkout_attach_to_reference(repo, &reference)?;
        return Ok(());
    }

    let obj = repo
        .revparse_single(&format!("refs/tags/{}", rev))
        .or_else(|_| repo.revparse_single(rev))
        .with_context(|| format!("rev not found: {}", rev))?;
    let commit = obj
        .peel(ObjectType::Commit)?
        .into_commit()
        .map_err(|_| anyhow!("rev didn't peel to a commit"))?;
    repo.checkout_tree(commit.as_object(), Some(CheckoutBuilder::new().force()))?;
    repo.set_head_detached(commit.id())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::fake::Upstream;
    use std::fs;
    use tempfile::{TempDir, tempdir};

    fn cloned(upstream: &Upstream) -> (TempDir, Git2Client) {
        let tmp = tempdir().unwrap();
        let client = Git2Client::new(tmp.path().join("repo"), CancelToken::new());
        client.clone_repo(&upstream.url()).unwrap();
        (tmp, client)
    }

    #[test]
    fn current_hash_fails_without_checkout() {
        let tmp = tempdir().unwrap();
        let client = Git2Client::new(tmp.path().join("missing"), CancelToken::new());
        assert!(client.current_hash().is_err());
    }

    #[test]
    fn clone_then_pull_reads_branch_tip() {
        let upstream = Upstream::new();
        upstream.commit("a.txt", "a");
        let tip = upstream.commit("b.txt", "b");

        let (_tmp, client) = cloned(&upstream);
        client.pull_force("main").unwrap();
        client.checkout("main").unwrap();
        assert_eq!(client.current_hash().unwrap(), tip.to_string());
        assert!(client.work_dir().join("b.txt").is_file());
    }

    #[test]
    fn pull_force_picks_up_new_upstream_commits() {
        let upstream = Upstream::new();
        upstream.commit("a.txt", "a");
        let (_tmp, client) = cloned(&upstream);

        let next = upstream.commit("a.txt", "a2");
        client.fetch().unwrap();
        client.pull_force("main").unwrap();
        assert_eq!(client.current_hash().unwrap(), next.to_string());
        let content = fs::read_to_string(client.work_dir().join("a.txt")).unwrap();
        assert_eq!(content, "a2");
    }

    #[test]
    fn pull_force_discards_local_changes() {
        let upstream = Upstream::new();
        let tip = upstream.commit("a.txt", "a");
        let (_tmp, client) = cloned(&upstream);

        fs::write(client.work_dir().join("a.txt"), "local edit").unwrap();
        client.pull_force("main").unwrap();
        assert_eq!(client.current_hash().unwrap(), tip.to_string());
        let content = fs::read_to_string(client.work_dir().join("a.txt")).unwrap();
        assert_eq!(content, "a");
    }

    #[test]
    fn checkout_commit_then_reset_hard() {
        let upstream = Upstream::new();
        let first = upstream.commit("a.txt", "a");
        let second = upstream.commit("a.txt", "a2");
        let (_tmp, client) = cloned(&upstream);
        client.pull_force("main").unwrap();

        client.checkout(&first.to_string()).unwrap();
        assert_eq!(client.current_hash().unwrap(), first.to_string());
        assert_eq!(
            fs::read_to_string(client.work_dir().join("a.txt")).unwrap(),
            "a"
        );

        client.reset_hard(&second.to_string()).unwrap();
        assert_eq!(client.current_hash().unwrap(), second.to_string());
        assert_eq!(
            fs::read_to_string(client.work_dir().join("a.txt")).unwrap(),
            "a2"
        );
    }

    #[test]
    fn pull_force_accepts_tags() {
        let upstream = Upstream::new();
        let tagged = upstream.commit("a.txt", "a");
        upstream.tag("v1", tagged);
        upstream.commit("a.txt", "a2");

        let (_tmp, client) = cloned(&upstream);
        client.pull_force("v1").unwrap();
        assert_eq!(client.current_hash().unwrap(), tagged.to_string());
        client.checkout("v1").unwrap();
        assert_eq!(client.current_hash().unwrap(), tagged.to_string());
    }

    #[test]
    fn pull_force_rejects_unknown_branch() {
        let upstream = Upstream::new();
        upstream.commit("a.txt", "a");
        let (_tmp, client) = cloned(&upstream);
        assert!(client.pull_force("nope").is_err());
    }

    #[test]
    fn cancelled_clone_fails_without_touching_disk() {
        let upstream = Upstream::new();
        upstream.commit("a.txt", "a");
        let tmp = tempdir().unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();
        let client = Git2Client::new(tmp.path().join("repo"), cancel);

        let err = client.clone_repo(&upstream.url()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<GitError>(),
            Some(GitError::Cancelled { op: "clone" })
        ));
        assert!(!client.work_dir().exists());
    }

    #[test]
    fn cancellation_stops_fetch_and_pull() {
        let upstream = Upstream::new();
        let tip = upstream.commit("a.txt", "a");
        let tmp = tempdir().unwrap();
        let cancel = CancelToken::new();
        let client = Git2Client::new(tmp.path().join("repo"), cancel.clone());
        client.clone_repo(&upstream.url()).unwrap();

        upstream.commit("a.txt", "a2");
        cancel.cancel();
        for err in [client.fetch().unwrap_err(), client.pull_force("main").unwrap_err()] {
            assert!(matches!(
                err.downcast_ref::<GitError>(),
                Some(GitError::Cancelled { op: "fetch" })
            ));
        }
        assert_eq!(client.current_hash().unwrap(), tip.to_string());
    }
}
