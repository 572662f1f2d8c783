use anyhow::{Context, Result};
use log::{debug, info};

use crate::{
    application::{InitOutcome, SyncOutcome, SyncReport, Synchronizer, init_project},
    build::{BuildEnv, BuildError, BuildOptions, BuildPipeline},
    package::{Manifest, Vcs},
    process::TokioRunner,
    progress::{Progress, Spinner},
    runtime::Runtime,
};

pub mod config;
mod services;

use config::SyncConfig;
use services::{build_git, build_http_client};

/// Install every dependency of the project. With a package, add it first.
#[tracing::instrument(skip(runtime, config))]
pub async fn install<R: Runtime>(
    runtime: &R,
    package: Option<&str>,
    config: &SyncConfig,
) -> Result<()> {
    let git = build_git(config);
    install_with(runtime, &git, &Spinner::new(), package, config).await
}

pub async fn install_with<R: Runtime, V: Vcs, P: Progress>(
    runtime: &R,
    vcs: &V,
    progress: &P,
    package: Option<&str>,
    config: &SyncConfig,
) -> Result<()> {
    let mut manifest = Manifest::load(runtime, &config.project_dir)?;
    let sync = Synchronizer::new(runtime, vcs, progress, &config.project_dir)?
        .assume_yes(config.assume_yes);

    if let Some(package) = package {
        sync.add_package(&mut manifest, package).await?;
    }

    debug!(
        "Syncing {} dependencies into {:?}",
        manifest.dependencies().len(),
        sync.store().root()
    );
    let report = sync.ensure_all(&manifest).await;
    println!("{}", summarize(&report));
    report.into_result()?;
    Ok(())
}

/// Clone a package and record it in `package.json`.
#[tracing::instrument(skip(runtime, config))]
pub async fn add<R: Runtime>(runtime: &R, package: &str, config: &SyncConfig) -> Result<()> {
    let git = build_git(config);
    add_with(runtime, &git, &Spinner::new(), package, config).await
}

pub async fn add_with<R: Runtime, V: Vcs, P: Progress>(
    runtime: &R,
    vcs: &V,
    progress: &P,
    package: &str,
    config: &SyncConfig,
) -> Result<()> {
    let mut manifest = Manifest::load(runtime, &config.project_dir)?;
    let sync = Synchronizer::new(runtime, vcs, progress, &config.project_dir)?
        .assume_yes(config.assume_yes);

    let spec = sync.add_package(&mut manifest, package).await?;
    println!("Added {} ({})", spec.name, spec);
    Ok(())
}

/// Create `package.json` in the project directory.
#[tracing::instrument(skip(runtime, config))]
pub fn init<R: Runtime>(runtime: &R, config: &SyncConfig) -> Result<()> {
    match init_project(runtime, &config.project_dir, config.assume_yes)? {
        InitOutcome::Created { name } => {
            println!("Initialized package.json for {}", name);
        }
        InitOutcome::Kept => {
            println!("Kept the existing package.json");
        }
    }
    Ok(())
}

/// Build the watch face in the project directory.
#[tracing::instrument(skip(runtime, config))]
pub async fn build<R: Runtime>(
    runtime: &R,
    options: BuildOptions,
    config: &SyncConfig,
) -> Result<()> {
    let env = BuildEnv::resolve(runtime, &config.project_dir)?;
    info!("Building {} in {:?}", env.watchface_id, env.project_dir);

    let http_client = build_http_client().context("Failed to create HTTP client")?;
    let spinner = Spinner::new();
    let options = BuildOptions {
        assume_yes: options.assume_yes || config.assume_yes,
        ..options
    };
    BuildPipeline::new(runtime, &TokioRunner, &http_client, &spinner, env, options)
        .run()
        .await?;
    Ok(())
}

/// Process exit code for a failed command: a build failure's own code,
/// otherwise `1`.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    err.chain()
        .find_map(|e| e.downcast_ref::<BuildError>())
        .map(BuildError::exit_code)
        .unwrap_or(1)
}

fn summarize(report: &SyncReport) -> String {
    if report.entries.is_empty() {
        return "No dependencies in package.json.".to_string();
    }

    let (mut cloned, mut pulled, mut failed) = (0, 0, 0);
    for (_, outcome) in &report.entries {
        match outcome {
            SyncOutcome::Cloned => cloned += 1,
            SyncOutcome::Pulled => pulled += 1,
            SyncOutcome::Failed(_) => failed += 1,
        }
    }

    let mut summary = format!(
        "{} package(s): {} installed, {} updated",
        report.entries.len(),
        cloned,
        pulled
    );
    if failed > 0 {
        summary.push_str(&format!(", {} failed", failed));
    }
    summary
}
