use anyhow::{Context, Result};
use std::path::PathBuf;
use std::time::Duration;

use crate::runtime::Runtime;

/// Default limit for a single clone or pull.
pub const DEFAULT_TIMEOUT_SECS: u64 = 600;

/// Settings shared by the package commands.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncConfig {
    /// Directory holding `package.json`; the working directory.
    pub project_dir: PathBuf,
    /// Per clone/pull limit. `None` waits forever.
    pub timeout: Option<Duration>,
    /// Answer every confirmation with yes.
    pub assume_yes: bool,
}

impl SyncConfig {
    /// `timeout_secs` of `0` disables the limit.
    pub fn load<R: Runtime>(runtime: &R, timeout_secs: u64, assume_yes: bool) -> Result<Self> {
        let project_dir = runtime
            .current_dir()
            .context("Failed to determine the project directory")?;
        Ok(Self {
            project_dir,
            timeout: timeout_from_secs(timeout_secs),
            assume_yes,
        })
    }
}

fn timeout_from_secs(secs: u64) -> Option<Duration> {
    (secs > 0).then(|| Duration::from_secs(secs))
}
