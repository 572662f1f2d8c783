//! Package management module
//!
//! This module provides the pieces the dependency synchronizer is built from:
//! identifier parsing, the project manifest, the on-disk package store and
//! the version control client behind it.

pub mod git;
mod manifest;
mod spec;
mod store;

pub use git::{GitCli, GitError, Vcs};
pub use manifest::{MANIFEST_FILE, Manifest, ManifestError};
pub use spec::{InvalidSpecError, LATEST_TAG, PackageSpec, validate_name};
pub use store::{PACKAGES_DIR, PackageStore, StoreError};
