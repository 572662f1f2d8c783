//! Init action - creates the project manifest.

use anyhow::{Context, Result};
use log::info;
use std::path::Path;

use crate::package::Manifest;
use crate::runtime::Runtime;

/// What `init` ended up doing.
#[derive(Debug, PartialEq)]
pub enum InitOutcome {
    Created { name: String },
    Kept,
}

/// Ask for a project name and write a fresh `package.json` into
/// `project_dir`. An existing manifest is only replaced after confirmation
/// (or with `assume_yes`).
#[tracing::instrument(skip(runtime))]
pub fn init_project<R: Runtime>(
    runtime: &R,
    project_dir: &Path,
    assume_yes: bool,
) -> Result<InitOutcome> {
    let path = Manifest::path(project_dir);
    if runtime.exists(&path) && !assume_yes {
        let prompt = format!("{} already exists. Overwrite it?", path.display());
        if !runtime.confirm(&prompt)? {
            info!("Keeping existing {:?}", path);
            return Ok(InitOutcome::Kept);
        }
    }

    let default_name = default_project_name(project_dir);
    let name = runtime
        .input("Project name:", &default_name)
        .context("Failed to read project name")?;
    let name = name.trim();
    let name = if name.is_empty() { default_name.as_str() } else { name };

    Manifest::new(name).save(runtime, project_dir)?;
    info!("Created {:?}", path);
    Ok(InitOutcome::Created {
        name: name.to_string(),
    })
}

fn default_project_name(project_dir: &Path) -> String {
    project_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "watchface".to_string())
}
