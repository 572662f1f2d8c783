//! Version control collaborator used by the package store.

use async_trait::async_trait;
use log::debug;
use std::path::Path;
use std::time::Duration;

use crate::process::{CommandRunner, Invocation, ProcessError};

#[derive(Debug, thiserror::Error)]
pub enum GitError {
    #[error("git {command} failed with {status}: {stderr}")]
    Exit {
        command: &'static str,
        status: String,
        stderr: String,
    },

    #[error(transparent)]
    Process(#[from] ProcessError),
}

impl GitError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, GitError::Process(ProcessError::Timeout { .. }))
    }
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Materialize a fresh working copy of `location` at `target`.
    async fn clone_repo(&self, location: &str, target: &Path) -> Result<(), GitError>;

    /// Refresh the working copy at `dir` from its configured remote.
    async fn pull(&self, dir: &Path) -> Result<(), GitError>;
}

/// `git` command line client.
pub struct GitCli<C: CommandRunner> {
    runner: C,
    program: String,
    timeout: Option<Duration>,
}

impl<C: CommandRunner> GitCli<C> {
    pub fn new(runner: C, timeout: Option<Duration>) -> Self {
        Self {
            runner,
            program: "git".to_string(),
            timeout,
        }
    }

    fn invocation(&self) -> Invocation {
        // Never block on a credential prompt.
        Invocation::new(&self.program)
            .env("GIT_TERMINAL_PROMPT", "0")
            .timeout(self.timeout)
    }

    async fn run(&self, command: &'static str, invocation: Invocation) -> Result<(), GitError> {
        let output = self.runner.run(&invocation).await?;
        if output.success {
            return Ok(());
        }
        debug!("git {} stdout: {}", command, output.stdout.trim());
        Err(GitError::Exit {
            command,
            status: output.status_text(),
            stderr: output.stderr.trim().to_string(),
        })
    }
}

#[async_trait]
impl<C: CommandRunner> Vcs for GitCli<C> {
    async fn clone_repo(&self, location: &str, target: &Path) -> Result<(), GitError> {
        let invocation = self
            .invocation()
            .arg("clone")
            .arg("--")
            .arg(location)
            .arg(target.as_os_str());
        self.run("clone", invocation).await
    }

    async fn pull(&self, dir: &Path) -> Result<(), GitError> {
        let mut invocation = self.invocation().arg("pull").current_dir(dir);
        // Stop repository discovery at `dir` so a copy without `.git` never
        // pulls the enclosing project.
        if let Some(parent) = dir.parent() {
            invocation = invocation.env(
                "GIT_CEILING_DIRECTORIES",
                parent.to_string_lossy().into_owned(),
            );
        }
        self.run("pull", invocation).await
    }
}
