use anyhow::Result;
use std::io::{self, Write};

const SKELETON: &str = include_str!("../assets/skeleton.toml");

/// Print an annotated config skeleton.
///
/// The skeleton is embedded from `assets/skeleton.toml` at compile time and
/// written to `stdout` unchanged, so it can be redirected straight into a
/// new `ivg.toml`.
///
/// # Errors
/// Returns an error if writing to `stdout` fails.
pub fn cmd_skeleton() -> Result<()> {
    io::stdout().write_all(SKELETON.as_bytes())?;
    Ok(())
}
