//! Lifecycle script execution.
//!
//! Every lifecycle step (check, setup, install, ...) is a list of shell lines
//! from the config. [`ScriptExecutor`] runs one such list as a single unit;
//! [`ShellExecutor`] is the real implementation, spawning the configured
//! shell on a temporary script file.

mod cancel;
mod env;

#[cfg(test)]
pub(crate) mod fake;

use std::fmt;
use std::io::{BufRead, BufReader, Read, Write};
use std::path::Path;
use std::process::{Command, Stdio};
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

use crate::error::ExecError;

pub use cancel::CancelToken;
pub use env::Env;

/// How often a running script checks for cancellation.
const POLL: Duration = Duration::from_millis(100);

/// Lifecycle steps, in the order an install may run them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    Check,
    Setup,
    Install,
    Skip,
    Rollback,
    Uninstall,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Step::Check => "check",
            Step::Setup => "setup",
            Step::Install => "install",
            Step::Skip => "skip",
            Step::Rollback => "rollback",
            Step::Uninstall => "uninstall",
        })
    }
}

/// Runs the lines of one lifecycle step.
pub trait ScriptExecutor {
    /// Run `lines` in `dir` with `env` added to the process environment.
    ///
    /// An empty list succeeds without doing anything. The first failing
    /// line aborts the rest.
    fn execute(&self, step: Step, lines: &[String], dir: &Path, env: &Env) -> Result<(), ExecError>;
}

/// Executes scripts with a shell, e.g. `bash` or `arch -arm64e /bin/bash`.
#[derive(Debug, Clone)]
pub struct ShellExecutor {
    shell: Vec<String>,
    cancel: CancelToken,
}

impl ShellExecutor {
    /// `shell` is the program followed by its leading arguments; the script
    /// path is appended. An empty list falls back to `bash`.
    pub fn new(shell: Vec<String>, cancel: CancelToken) -> Self {
        let shell = if shell.is_empty() {
            vec!["bash".to_string()]
        } else {
            shell
        };
        Self { shell, cancel }
    }

    pub fn shell(&self) -> &[String] {
        &self.shell
    }
}

impl ScriptExecutor for ShellExecutor {
    fn execute(&self, step: Step, lines: &[String], dir: &Path, env: &Env) -> Result<(), ExecError> {
        if lines.is_empty() {
            debug!(%step, "no script");
            return Ok(());
        }
        if self.cancel.is_cancelled() {
            return Err(ExecError::Cancelled { step });
        }
        let io_err =
            |op: &'static str| move |source: std::io::Error| ExecError::Io { step, op, source };

        let content = format!("set -ex\n{}\n", lines.join("\n"));
        debug!(%step, script = %content, "exec script");
        let mut script = tempfile::Builder::new()
            .prefix("ivg-")
            .suffix(".sh")
            .tempfile()
            .map_err(io_err("create script file"))?;
        script
            .write_all(content.as_bytes())
            .and_then(|_| script.flush())
            .map_err(io_err("write script file"))?;

        info!(%step, dir = %dir.display(), shell = ?self.shell, "exec start");
        let mut cmd = Command::new(&self.shell[0]);
        cmd.args(&self.shell[1..])
            .arg(script.path())
            .current_dir(dir)
            .envs(env.iter())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| ExecError::Spawn {
            step,
            shell: self.shell.join(" "),
            source,
        })?;

        // Drain both pipes concurrently so a chatty script cannot block on a
        // full buffer.
        let stdout = child.stdout.take().map(|r| forward_lines(step, "stdout", r));
        let stderr = child.stderr.take().map(|r| forward_lines(step, "stderr", r));

        let status = loop {
            if let Some(status) = child.wait_timeout(POLL).map_err(io_err("wait"))? {
                break Some(status);
            }
            if self.cancel.is_cancelled() {
                warn!(%step, "cancelled, killing script");
                let _ = child.kill();
                let _ = child.wait();
                break None;
            }
        };

        // Grandchildren of a killed script may still hold the pipes open, so
        // the readers are only awaited after a normal exit.
        if status.is_some() {
            for handle in [stdout, stderr].into_iter().flatten() {
                let _ = handle.join();
            }
        }

        match status {
            None => Err(ExecError::Cancelled { step }),
            Some(status) if status.success() => {
                info!(%step, "exec end");
                Ok(())
            }
            Some(status) => Err(ExecError::Failed {
                step,
                status: status.to_string(),
            }),
        }
    }
}

/// Log every line of `reader` on a background thread.
fn forward_lines<R: Read + Send + 'static>(
    step: Step,
    stream: &'static str,
    reader: R,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    info!(%step, stream, "{}", line.trim_end());
                }
            }
        }
    })
}
