//! Package specification parsing.
//!
//! A package is identified by `location[@tag]`, where `location` is anything
//! `git clone` accepts (HTTPS URL, SSH remote, local path).

use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;

/// Tag used when the identifier does not name one.
pub const LATEST_TAG: &str = "latest";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid package '{input}': {reason}")]
pub struct InvalidSpecError {
    pub input: String,
    pub reason: &'static str,
}

impl InvalidSpecError {
    fn new(input: &str, reason: &'static str) -> Self {
        Self {
            input: input.to_string(),
            reason,
        }
    }
}

/// A parsed package identifier.
/// Format: "location" or "location@tag"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageSpec {
    pub location: String,
    pub tag: String,
    /// Directory name under `packages/` and key in the manifest.
    pub name: String,
}

impl PackageSpec {
    pub fn is_latest(&self) -> bool {
        self.tag == LATEST_TAG
    }
}

impl fmt::Display for PackageSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.location, self.tag)
    }
}

impl FromStr for PackageSpec {
    type Err = InvalidSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let input = s.trim();
        if input.is_empty() {
            return Err(InvalidSpecError::new(s, "package identifier is empty"));
        }

        let (location, tag) = split_tag(input)?;
        if location.is_empty() {
            return Err(InvalidSpecError::new(s, "repository location is empty"));
        }

        let name = derive_name(location)
            .ok_or_else(|| InvalidSpecError::new(s, "cannot derive a package name from the location"))?;

        Ok(PackageSpec {
            location: location.to_string(),
            tag: tag.unwrap_or(LATEST_TAG).to_string(),
            name,
        })
    }
}

/// Split on the last `@` only when what follows looks like a tag.
///
/// `git@github.com:owner/repo.git` has no tag: the text after its only `@`
/// contains `:` and `/`, so it belongs to the location.
fn split_tag(input: &str) -> Result<(&str, Option<&str>), InvalidSpecError> {
    let Some(at_pos) = input.rfind('@') else {
        return Ok((input, None));
    };

    let (location, tag) = input.split_at(at_pos);
    let tag = &tag[1..];
    if tag.is_empty() {
        return Err(InvalidSpecError::new(
            input,
            "tag after @ cannot be empty, expected 'location@tag'",
        ));
    }
    if tag.contains('/') || tag.contains(':') {
        return Ok((input, None));
    }
    Ok((location, Some(tag)))
}

/// Final path component of `location`, without a trailing `.git`.
fn derive_name(location: &str) -> Option<String> {
    let trimmed = location.trim_end_matches(['/', '\\']);
    let last = trimmed
        .rsplit(['/', '\\', ':'])
        .next()
        .unwrap_or(trimmed);
    let name = last.strip_suffix(".git").unwrap_or(last);

    is_valid_name(name).then(|| name.to_string())
}

/// A package name must be a single plain directory name.
fn is_valid_name(name: &str) -> bool {
    if name.is_empty() || name.contains(['/', '\\', ':']) {
        return false;
    }
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

/// Check a manifest key before it is used as a directory under `packages/`.
pub fn validate_name(name: &str) -> Result<(), InvalidSpecError> {
    if is_valid_name(name) {
        Ok(())
    } else {
        Err(InvalidSpecError::new(
            name,
            "package name must be a single directory name",
        ))
    }
}
