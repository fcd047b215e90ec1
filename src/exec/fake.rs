//! [`ScriptExecutor`] that records steps instead of spawning a shell.

use std::cell::RefCell;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use super::{Env, ScriptExecutor, Step};
use crate::error::ExecError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub step: Step,
    pub lines: Vec<String>,
    pub dir: PathBuf,
}

#[derive(Default)]
pub struct RecordingExecutor {
    calls: RefCell<Vec<Call>>,
    failing: RefCell<HashSet<Step>>,
    cancelled: RefCell<HashSet<Step>>,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `step` exit non-zero.
    pub fn fail_on(&self, step: Step) {
        self.failing.borrow_mut().insert(step);
    }

    /// Make `step` behave as if interrupted.
    pub fn cancel_on(&self, step: Step) {
        self.cancelled.borrow_mut().insert(step);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    /// Steps that actually ran, i.e. had a non-empty script.
    pub fn steps(&self) -> Vec<Step> {
        self.calls.borrow().iter().map(|c| c.step).collect()
    }
}

impl ScriptExecutor for RecordingExecutor {
    fn execute(&self, step: Step, lines: &[String], dir: &Path, _env: &Env) -> Result<(), ExecError> {
        if lines.is_empty() {
            return Ok(());
        }
        self.calls.borrow_mut().push(Call {
            step,
            lines: lines.to_vec(),
            dir: dir.to_path_buf(),
        });
        if self.cancelled.borrow().contains(&step) {
            return Err(ExecError::Cancelled { step });
        }
        if self.failing.borrow().contains(&step) {
            return Err(ExecError::Failed {
                step,
                status: "exit status: 1".into(),
            });
        }
        Ok(())
    }
}
