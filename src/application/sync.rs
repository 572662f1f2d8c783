//! Dependency synchronization - reconciles `packages/` with the manifest.
//!
//! This use case coordinates:
//! - Adding a single package (clone, then record it in the manifest)
//! - Ensuring every declared package is present and up to date
//!
//! Per package the flow is `Unknown -> {Absent, Present} -> Syncing ->
//! {Synced, Failed}`. Nothing is retried within one run.

use log::{debug, info, warn};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::package::{
    InvalidSpecError, Manifest, ManifestError, PackageSpec, PackageStore, StoreError, Vcs,
    validate_name,
};
use crate::progress::Progress;
use crate::runtime::Runtime;

#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error(transparent)]
    InvalidSpec(#[from] InvalidSpecError),

    #[error("could not install {name}")]
    CloneFailed {
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("could not update {name}")]
    PullFailed {
        name: String,
        #[source]
        source: StoreError,
    },

    #[error("kept the existing copy of {0}; nothing was changed")]
    Declined(String),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Manifest(#[from] ManifestError),

    #[error(transparent)]
    Prompt(anyhow::Error),

    #[error("{} of {total} packages failed to sync: {}", .failures.len(), failed_names(.failures))]
    PartialFailure {
        total: usize,
        failures: Vec<(String, SyncError)>,
    },
}

fn failed_names(failures: &[(String, SyncError)]) -> String {
    failures
        .iter()
        .map(|(name, _)| name.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// How one manifest entry was reconciled.
#[derive(Debug)]
pub enum SyncOutcome {
    Cloned,
    Pulled,
    Failed(SyncError),
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::Cloned => write!(f, "installed"),
            SyncOutcome::Pulled => write!(f, "updated"),
            SyncOutcome::Failed(e) => write!(f, "failed: {}", e),
        }
    }
}

/// Result of [`Synchronizer::ensure_all`], one entry per manifest entry in
/// manifest order.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub entries: Vec<(String, SyncOutcome)>,
}

impl SyncReport {
    pub fn is_success(&self) -> bool {
        self.failures().next().is_none()
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &SyncError)> {
        self.entries.iter().filter_map(|(name, outcome)| match outcome {
            SyncOutcome::Failed(e) => Some((name.as_str(), e)),
            _ => None,
        })
    }

    pub fn outcome(&self, name: &str) -> Option<&SyncOutcome> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, outcome)| outcome)
    }

    /// `Err(PartialFailure)` when any entry failed.
    pub fn into_result(self) -> Result<SyncReport, SyncError> {
        if self.is_success() {
            return Ok(self);
        }

        let total = self.entries.len();
        let failures = self
            .entries
            .into_iter()
            .filter_map(|(name, outcome)| match outcome {
                SyncOutcome::Failed(e) => Some((name, e)),
                _ => None,
            })
            .collect();
        Err(SyncError::PartialFailure { total, failures })
    }
}

pub struct Synchronizer<'a, R: Runtime, V: Vcs, P: Progress> {
    runtime: &'a R,
    store: PackageStore<'a, R, V>,
    progress: &'a P,
    project_dir: PathBuf,
    assume_yes: bool,
}

impl<'a, R: Runtime, V: Vcs, P: Progress> Synchronizer<'a, R, V, P> {
    /// Create a synchronizer for the project at `project_dir`. Opens (and if
    /// needed creates) its `packages/` directory.
    pub fn new(
        runtime: &'a R,
        vcs: &'a V,
        progress: &'a P,
        project_dir: &Path,
    ) -> Result<Self, SyncError> {
        let store = PackageStore::for_project(runtime, vcs, project_dir).map_err(SyncError::Store)?;
        Ok(Self {
            runtime,
            store,
            progress,
            project_dir: project_dir.to_path_buf(),
            assume_yes: false,
        })
    }

    /// Answer yes to the replace confirmation.
    pub fn assume_yes(mut self, yes: bool) -> Self {
        self.assume_yes = yes;
        self
    }

    pub fn store(&self) -> &PackageStore<'a, R, V> {
        &self.store
    }

    /// Clone `spec_str` into the store and record it in the manifest.
    ///
    /// An existing directory of the same name is replaced after confirmation.
    /// The manifest is saved only after the clone succeeded.
    #[tracing::instrument(skip(self, manifest))]
    pub async fn add_package(
        &self,
        manifest: &mut Manifest,
        spec_str: &str,
    ) -> Result<PackageSpec, SyncError> {
        let spec = spec_str.parse::<PackageSpec>()?;
        debug!("Adding {:?}", spec);
        if !spec.is_latest() {
            warn!(
                "{} is recorded with tag {}, but the default branch is cloned",
                spec.name, spec.tag
            );
        }

        if self.store.exists(&spec.name) && !self.confirm_replace(&spec)? {
            return Err(SyncError::Declined(spec.name));
        }

        self.progress.start(&format!("Cloning {}...", spec.location));
        if let Err(source) = self.store.clone(&spec.location, &spec.name).await {
            self.progress.stop(false);
            return Err(SyncError::CloneFailed {
                name: spec.name,
                source,
            });
        }

        self.progress
            .update(&format!("Adding {} to package.json...", spec.name));
        manifest.set_dependency(&spec.name, &spec.to_string());
        if let Err(e) = manifest.save(self.runtime, &self.project_dir) {
            self.progress.stop(false);
            return Err(e.into());
        }

        self.progress.update(&format!("Added {}", spec));
        self.progress.stop(true);
        info!("Added {} as {}", spec, spec.name);
        Ok(spec)
    }

    /// Pull every declared package that is present, clone every one that is
    /// not. Failures are recorded per package and never stop the batch. The
    /// manifest is not modified.
    #[tracing::instrument(skip(self, manifest))]
    pub async fn ensure_all(&self, manifest: &Manifest) -> SyncReport {
        let mut report = SyncReport::default();

        for (name, spec_str) in manifest.dependencies() {
            let outcome = self.ensure_one(name, spec_str).await;
            if let SyncOutcome::Failed(e) = &outcome {
                warn!("{}: {}", name, e);
            }
            report.entries.push((name.clone(), outcome));
        }

        report
    }

    async fn ensure_one(&self, name: &str, spec_str: &str) -> SyncOutcome {
        if let Err(e) = validate_name(name) {
            self.progress.start(&format!("Checking {}...", name));
            self.progress.stop(false);
            return SyncOutcome::Failed(e.into());
        }
        let spec = match spec_str.parse::<PackageSpec>() {
            Ok(spec) => spec,
            Err(e) => {
                self.progress.start(&format!("Checking {}...", name));
                self.progress.stop(false);
                return SyncOutcome::Failed(e.into());
            }
        };
        if spec.name != name {
            debug!(
                "Manifest key {} differs from package name {}; using the key",
                name, spec.name
            );
        }

        if self.store.exists(name) {
            self.progress.start(&format!("Updating {}...", name));
            match self.store.pull(name).await {
                Ok(()) => {
                    self.progress.stop(true);
                    SyncOutcome::Pulled
                }
                Err(source) => {
                    self.progress.stop(false);
                    note_timeout(name, &source);
                    SyncOutcome::Failed(SyncError::PullFailed {
                        name: name.to_string(),
                        source,
                    })
                }
            }
        } else {
            self.progress
                .start(&format!("Cloning {}...", spec.location));
            match self.store.clone(&spec.location, name).await {
                Ok(()) => {
                    self.progress.stop(true);
                    SyncOutcome::Cloned
                }
                Err(source) => {
                    self.progress.stop(false);
                    note_timeout(name, &source);
                    SyncOutcome::Failed(SyncError::CloneFailed {
                        name: name.to_string(),
                        source,
                    })
                }
            }
        }
    }

    fn confirm_replace(&self, spec: &PackageSpec) -> Result<bool, SyncError> {
        if self.assume_yes {
            return Ok(true);
        }
        let path = self.store.path(&spec.name).map_err(SyncError::Store)?;
        let prompt = format!(
            "{} already exists and will be deleted and cloned again from {}. Continue?",
            path.display(),
            spec.location
        );
        self.runtime.confirm(&prompt).map_err(SyncError::Prompt)
    }
}

fn note_timeout(name: &str, err: &StoreError) {
    if let Some(limit) = err.timeout() {
        warn!(
            "{} gave up after {}s; raise --timeout or CLOCKWORK_TIMEOUT for slow remotes",
            name,
            limit.as_secs()
        );
    }
}
