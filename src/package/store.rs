//! Local package store: the `packages/` directory of a project.
//!
//! Each entry `<root>/<name>` is a working copy owned by the store. Cloning
//! over an existing entry removes it first; nothing is merged or backed up.

use anyhow::Context;
use log::{debug, info};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::git::{GitError, Vcs};
use super::spec::{InvalidSpecError, validate_name};
use crate::runtime::Runtime;

/// Directory, relative to the project, that holds cloned packages.
pub const PACKAGES_DIR: &str = "packages";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to clone {location} into {}", .path.display())]
    CloneFailed {
        location: String,
        path: PathBuf,
        #[source]
        source: GitError,
    },

    #[error("failed to pull {}", .path.display())]
    PullFailed {
        path: PathBuf,
        #[source]
        source: GitError,
    },

    #[error("{operation} of {} timed out", .path.display())]
    Timeout {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: GitError,
    },

    #[error("package directory {} does not exist", .0.display())]
    Missing(PathBuf),

    #[error(transparent)]
    InvalidName(#[from] InvalidSpecError),

    #[error(transparent)]
    Io(#[from] anyhow::Error),
}

impl StoreError {
    /// Timeout configured for clone and pull, for messages.
    pub fn timeout(&self) -> Option<Duration> {
        match self {
            StoreError::Timeout {
                source: GitError::Process(crate::process::ProcessError::Timeout { timeout, .. }),
                ..
            } => Some(*timeout),
            _ => None,
        }
    }
}

pub struct PackageStore<'a, R: Runtime, V: Vcs> {
    runtime: &'a R,
    vcs: &'a V,
    root: PathBuf,
}

impl<'a, R: Runtime, V: Vcs> PackageStore<'a, R, V> {
    /// Open the store at `root`, creating the directory if needed.
    #[tracing::instrument(skip(runtime, vcs))]
    pub fn open(runtime: &'a R, vcs: &'a V, root: PathBuf) -> Result<Self, StoreError> {
        if !runtime.is_dir(&root) {
            debug!("Creating package directory {:?}", root);
            runtime
                .create_dir_all(&root)
                .with_context(|| format!("Failed to create package directory {:?}", root))?;
        }
        Ok(Self { runtime, vcs, root })
    }

    /// Open the store for a project: `<project_dir>/packages`.
    pub fn for_project(runtime: &'a R, vcs: &'a V, project_dir: &Path) -> Result<Self, StoreError> {
        Self::open(runtime, vcs, project_dir.join(PACKAGES_DIR))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns: `<root>/<name>`. `name` must be a single directory name.
    pub fn path(&self, name: &str) -> Result<PathBuf, StoreError> {
        validate_name(name)?;
        Ok(self.root.join(name))
    }

    /// Presence check only; says nothing about the working copy's health.
    /// Always false for a name that cannot live in the store.
    pub fn exists(&self, name: &str) -> bool {
        self.path(name)
            .map(|path| self.runtime.is_dir(&path))
            .unwrap_or(false)
    }

    /// Replace `<root>/<name>` with a fresh clone of `location`.
    ///
    /// On failure the target is left as git left it and must be treated as
    /// corrupt; the next clone removes it.
    #[tracing::instrument(skip(self))]
    pub async fn clone(&self, location: &str, name: &str) -> Result<(), StoreError> {
        let path = self.path(name)?;

        if self.runtime.exists(&path) {
            info!("Removing existing package directory {:?}", path);
            self.runtime
                .remove_dir_all(&path)
                .with_context(|| format!("Failed to remove {:?}", path))?;
        }

        debug!("Cloning {} into {:?}", location, path);
        self.vcs
            .clone_repo(location, &path)
            .await
            .map_err(|source| {
                if source.is_timeout() {
                    StoreError::Timeout {
                        operation: "clone",
                        path: path.clone(),
                        source,
                    }
                } else {
                    StoreError::CloneFailed {
                        location: location.to_string(),
                        path: path.clone(),
                        source,
                    }
                }
            })
    }

    /// Refresh an existing entry in place. Never creates it.
    #[tracing::instrument(skip(self))]
    pub async fn pull(&self, name: &str) -> Result<(), StoreError> {
        let path = self.path(name)?;
        if !self.runtime.is_dir(&path) {
            return Err(StoreError::Missing(path));
        }

        debug!("Pulling {:?}", path);
        self.vcs.pull(&path).await.map_err(|source| {
            if source.is_timeout() {
                StoreError::Timeout {
                    operation: "pull",
                    path: path.clone(),
                    source,
                }
            } else {
                StoreError::PullFailed {
                    path: path.clone(),
                    source,
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::git::MockVcs;
    use crate::process::ProcessError;
    use crate::runtime::{MockRuntime, RealRuntime};
    use mockall::predicate::eq;
    use tempfile::tempdir;

    fn exit_error(command: &'static str) -> GitError {
        GitError::Exit {
            command,
            status: "exit code 128".to_string(),
            stderr: "fatal: could not read from remote repository".to_string(),
        }
    }

    fn timeout_error() -> GitError {
        GitError::Process(ProcessError::Timeout {
            program: "git".to_string(),
            timeout: Duration::from_secs(2),
        })
    }

    /// A vcs whose clone creates the target with a marker file, like git would.
    fn cloning_vcs() -> MockVcs {
        let mut vcs = MockVcs::new();
        vcs.expect_clone_repo().returning(|location, target| {
            std::fs::create_dir_all(target).unwrap();
            std::fs::write(target.join("ORIGIN"), location).unwrap();
            Ok(())
        });
        vcs
    }

    #[test]
    fn test_open_creates_root_once() {
        let mut runtime = MockRuntime::new();
        let vcs = MockVcs::new();
        let root = PathBuf::from("/project/packages");

        runtime
            .expect_is_dir()
            .with(eq(root.clone()))
            .times(1)
            .returning(|_| false);
        runtime
            .expect_create_dir_all()
            .with(eq(root.clone()))
            .times(1)
            .returning(|_| Ok(()));

        let store = PackageStore::open(&runtime, &vcs, root.clone()).unwrap();
        assert_eq!(store.root(), root.as_path());
        assert_eq!(store.path("digits").unwrap(), root.join("digits"));
    }

    #[test]
    fn test_open_existing_root_is_untouched() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let vcs = MockVcs::new();

        let first = PackageStore::for_project(&runtime, &vcs, dir.path()).unwrap();
        std::fs::write(first.root().join("keep.txt"), "x").unwrap();
        let second = PackageStore::for_project(&runtime, &vcs, dir.path()).unwrap();

        assert!(second.root().join("keep.txt").exists());
    }

    #[tokio::test]
    async fn test_clone_into_empty_slot() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let vcs = cloning_vcs();
        let store = PackageStore::for_project(&runtime, &vcs, dir.path()).unwrap();

        assert!(!store.exists("digits"));
        store.clone("https://host/owner/digits.git", "digits").await.unwrap();
        assert!(store.exists("digits"));
        assert_eq!(
            std::fs::read_to_string(store.path("digits").unwrap().join("ORIGIN")).unwrap(),
            "https://host/owner/digits.git"
        );
    }

    #[tokio::test]
    async fn test_clone_replaces_existing_directory() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let vcs = cloning_vcs();
        let store = PackageStore::for_project(&runtime, &vcs, dir.path()).unwrap();

        store.clone("https://host/owner/digits.git", "digits").await.unwrap();
        let sentinel = store.path("digits").unwrap().join("local-edit.txt");
        std::fs::write(&sentinel, "modified").unwrap();

        store.clone("https://host/other/digits.git", "digits").await.unwrap();

        assert!(!sentinel.exists());
        assert_eq!(
            std::fs::read_to_string(store.path("digits").unwrap().join("ORIGIN")).unwrap(),
            "https://host/other/digits.git"
        );
    }

    #[tokio::test]
    async fn test_clone_failure_leaves_partial_directory() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let mut vcs = MockVcs::new();
        vcs.expect_clone_repo().returning(|_, target| {
            std::fs::create_dir_all(target.join(".git")).unwrap();
            Err(exit_error("clone"))
        });
        let store = PackageStore::for_project(&runtime, &vcs, dir.path()).unwrap();

        let err = store.clone("https://host/owner/digits.git", "digits").await.unwrap_err();

        assert!(matches!(err, StoreError::CloneFailed { .. }));
        assert!(store.exists("digits"));
    }

    #[tokio::test]
    async fn test_clone_timeout() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let mut vcs = MockVcs::new();
        vcs.expect_clone_repo().returning(|_, _| Err(timeout_error()));
        let store = PackageStore::for_project(&runtime, &vcs, dir.path()).unwrap();

        let err = store.clone("https://host/owner/slow.git", "slow").await.unwrap_err();

        assert!(matches!(err, StoreError::Timeout { operation: "clone", .. }));
        assert_eq!(err.timeout(), Some(Duration::from_secs(2)));
    }

    #[tokio::test]
    async fn test_pull_existing() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let mut vcs = MockVcs::new();
        let expected = dir.path().join(PACKAGES_DIR).join("digits");
        vcs.expect_pull()
            .with(eq(expected))
            .times(1)
            .returning(|_| Ok(()));
        let store = PackageStore::for_project(&runtime, &vcs, dir.path()).unwrap();
        std::fs::create_dir_all(store.path("digits").unwrap()).unwrap();

        store.pull("digits").await.unwrap();
    }

    #[tokio::test]
    async fn test_pull_absent_does_not_create() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let vcs = MockVcs::new();
        let store = PackageStore::for_project(&runtime, &vcs, dir.path()).unwrap();

        let err = store.pull("digits").await.unwrap_err();

        assert!(matches!(err, StoreError::Missing(_)));
        assert!(!store.exists("digits"));
    }

    #[tokio::test]
    async fn test_pull_failures() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let mut vcs = MockVcs::new();
        let mut calls = 0;
        vcs.expect_pull().times(2).returning(move |_| {
            calls += 1;
            if calls == 1 {
                Err(exit_error("pull"))
            } else {
                Err(timeout_error())
            }
        });
        let store = PackageStore::for_project(&runtime, &vcs, dir.path()).unwrap();
        std::fs::create_dir_all(store.path("digits").unwrap()).unwrap();

        let first = store.pull("digits").await.unwrap_err();
        assert!(matches!(first, StoreError::PullFailed { .. }));

        let second = store.pull("digits").await.unwrap_err();
        assert!(matches!(second, StoreError::Timeout { operation: "pull", .. }));
    }

    #[tokio::test]
    async fn test_names_outside_the_store_are_rejected() {
        let dir = tempdir().unwrap();
        let runtime = RealRuntime;
        let vcs = MockVcs::new();
        let store = PackageStore::for_project(&runtime, &vcs, dir.path()).unwrap();
        std::fs::create_dir_all(dir.path().join("escaped")).unwrap();

        for name in ["../escaped", "a/b", "/abs", ".."] {
            assert!(matches!(
                store.path(name),
                Err(StoreError::InvalidName(_))
            ));
            assert!(!store.exists(name));

            let err = store.clone("https://host/owner/x.git", name).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidName(_)), "{}", name);

            let err = store.pull(name).await.unwrap_err();
            assert!(matches!(err, StoreError::InvalidName(_)), "{}", name);
        }
        assert!(dir.path().join("escaped").is_dir());
    }
}
