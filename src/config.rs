use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{self, Read, Write};
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::exec::Step;

/// Installation config, usually `ivg.toml`.
///
/// Example TOML:
/// ```toml
/// uri = "https://github.com/junegunn/fzf.git"
/// branch = "master"
///
/// [steps]
/// install = ["./install --bin"]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    pub uri: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Clone destination, relative to the work dir.
    #[serde(default = "default_locald")]
    pub locald: String,
    /// Lock file, relative to the work dir.
    #[serde(default = "default_lock")]
    pub lock: String,
    /// Shell that runs the scripts, e.g. `["arch", "-arm64e", "/bin/bash"]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shell: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    #[serde(default)]
    pub steps: Steps,
}

/// Lifecycle scripts. Every list may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Steps {
    pub check: Vec<String>,
    pub setup: Vec<String>,
    pub install: Vec<String>,
    pub rollback: Vec<String>,
    pub skip: Vec<String>,
    pub uninstall: Vec<String>,
}

impl Steps {
    pub fn get(&self, step: Step) -> &[String] {
        match step {
            Step::Check => &self.check,
            Step::Setup => &self.setup,
            Step::Install => &self.install,
            Step::Rollback => &self.rollback,
            Step::Skip => &self.skip,
            Step::Uninstall => &self.uninstall,
        }
    }
}

fn default_branch() -> String {
    "main".into()
}

fn default_locald() -> String {
    "repo".into()
}

fn default_lock() -> String {
    "lock".into()
}

pub fn default_shell() -> Vec<String> {
    vec!["bash".into()]
}

impl Config {
    /// Shell to use: the override if given, then the config, then `bash`.
    pub fn shell_or(&self, flag: Option<Vec<String>>) -> Vec<String> {
        flag.filter(|s| !s.is_empty())
            .or_else(|| self.shell.clone().filter(|s| !s.is_empty()))
            .unwrap_or_else(default_shell)
    }
}

/// Parse config text; `origin` only labels errors.
pub fn parse_config(origin: &str, text: &str) -> Result<Config, ConfigError> {
    let cfg: Config = toml::from_str(text).map_err(|source| ConfigError::Parse {
        path: origin.to_string(),
        source,
    })?;
    if cfg.uri.trim().is_empty() {
        return Err(ConfigError::Invalid {
            message: "empty uri".into(),
        });
    }
    Ok(cfg)
}

/// Load and parse the config at `path`; `-` reads stdin.
pub fn load_config(path: &str) -> Result<Config, ConfigError> {
    info!(config = path, "load config");
    let read_err = |source| ConfigError::Read {
        path: path.to_string(),
        source,
    };
    let text = if path == "-" {
        let mut s = String::new();
        io::stdin().read_to_string(&mut s).map_err(read_err)?;
        s
    } else {
        fs::read_to_string(path).map_err(read_err)?
    };
    let cfg = parse_config(path, &text)?;
    debug!(?cfg, "config");
    Ok(cfg)
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Toml,
    Json,
}

/// Render a config with every default filled in.
pub fn render_config(cfg: &Config, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Toml => toml::to_string_pretty(cfg).context("serialize config as toml"),
        OutputFormat::Json => {
            serde_json::to_string_pretty(cfg).context("serialize config as json")
        }
    }
}

/// CLI command: print the normalized config.
pub fn cmd_parse(path: &str, format: OutputFormat) -> Result<()> {
    let cfg = load_config(path)?;
    let mut out = render_config(&cfg, format)?;
    if !out.ends_with('\n') {
        out.push('\n');
    }
    io::stdout().write_all(out.as_bytes())?;
    Ok(())
}
