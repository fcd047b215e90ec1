use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::{Context, Result};

/// Shared flag flipped by SIGINT/SIGTERM.
///
/// Scripts poll it while they run and kill their child once it is set. Git
/// transfers check it from their progress callbacks and abort. Either way
/// an interrupted run unwinds through rollback and backup restore instead
/// of dying mid-checkout.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token wired to SIGINT and SIGTERM.
    pub fn from_signals() -> Result<Self> {
        let token = Self::new();
        for sig in [signal_hook::consts::SIGINT, signal_hook::consts::SIGTERM] {
            signal_hook::flag::register(sig, token.0.clone())
                .with_context(|| format!("register signal {}", sig))?;
        }
        Ok(token)
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
