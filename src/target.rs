use anyhow::Result;
use std::path::Path;
use tracing::debug;

use crate::config::Config;
use crate::exec::Env;
use crate::paths::Paths;

/// A config bound to a work dir: expanded git coordinates, locations and
/// the environment every script receives.
#[derive(Debug, Clone)]
pub struct Target {
    pub uri: String,
    pub branch: String,
    pub paths: Paths,
    pub env: Env,
}

impl Target {
    /// Builtins (`IVG_*`) are visible while the `[env]` table is expanded
    /// and win over it afterwards. `uri` and `branch` are expanded against
    /// the result.
    pub fn resolve(cfg: &Config, work_dir: &Path) -> Result<Self> {
        let paths = Paths::resolve(work_dir, &cfg.locald, &cfg.lock)?;

        let mut env = Env::new();
        let set_paths = |env: &mut Env| {
            env.set("IVG_LOCALD", paths.repo_dir.to_string_lossy());
            env.set("IVG_LOCK", paths.lock_file.to_string_lossy());
            env.set("IVG_WORKD", paths.work_dir.to_string_lossy());
        };
        set_paths(&mut env);
        for (k, v) in &cfg.env {
            let v = env.expand(v);
            env.set(k, v);
        }
        set_paths(&mut env);

        let uri = env.expand(&cfg.uri);
        let branch = env.expand(&cfg.branch);
        env.set("IVG_URI", uri.as_str());
        env.set("IVG_BRANCH", branch.as_str());
        debug!(?env, %uri, %branch, "target");

        Ok(Self {
            uri,
            branch,
            paths,
            env,
        })
    }
}
