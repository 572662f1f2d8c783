//! Watch face build pipeline.
//!
//! Steps, in order: resolve the environment, preprocess, validate, gradle,
//! then either the memory footprint check (release) or install on a device
//! (debug). Every failure maps to a [`BuildError`] with its own exit code.

mod device;
mod env;
mod error;
mod tools;

pub use device::{Adb, Device, parse_device_list, pick_device};
pub use env::{BuildEnv, parse_application_id};
pub use error::BuildError;
pub use tools::{Tool, ensure_tool};

use log::{info, warn};
use std::path::Path;

use crate::http::HttpClient;
use crate::process::{CommandRunner, Invocation};
use crate::progress::Progress;
use crate::runtime::Runtime;

const PREPROCESS_INPUT: &str = "watchface/watchface-pp.xml";
const WATCHFACE_XML: &str = "watchface/src/main/res/raw/watchface.xml";
const DEBUG_APK: &str = "watchface/build/outputs/apk/debug/watchface-debug.apk";
const RELEASE_BUNDLE: &str = "watchface/build/outputs/bundle/release/watchface-release.aab";

#[derive(Debug, Clone, Copy, Default)]
pub struct BuildOptions {
    /// `bundleRelease` plus the memory footprint check instead of a debug install.
    pub release: bool,
    /// Offer non Wear OS devices too.
    pub all_devices: bool,
    /// Run the preprocessor in debug mode.
    pub debug: bool,
    pub assume_yes: bool,
}

pub struct BuildPipeline<'a, R: Runtime, C: CommandRunner, P: Progress> {
    runtime: &'a R,
    runner: &'a C,
    http_client: &'a HttpClient,
    progress: &'a P,
    env: BuildEnv,
    options: BuildOptions,
}

impl<'a, R: Runtime, C: CommandRunner, P: Progress> BuildPipeline<'a, R, C, P> {
    pub fn new(
        runtime: &'a R,
        runner: &'a C,
        http_client: &'a HttpClient,
        progress: &'a P,
        env: BuildEnv,
        options: BuildOptions,
    ) -> Self {
        Self {
            runtime,
            runner,
            http_client,
            progress,
            env,
            options,
        }
    }

    /// Preprocess, validate, then build with gradle. A release build ends
    /// with the memory footprint check and is not installed on a device;
    /// only debug builds go through adb.
    #[tracing::instrument(skip(self), fields(watchface = %self.env.watchface_id))]
    pub async fn run(&self) -> Result<(), BuildError> {
        self.preprocess().await?;
        self.validate().await?;
        self.gradle().await?;

        if self.options.release {
            self.check_memory_footprint().await?;
        } else {
            self.install().await?;
        }
        Ok(())
    }

    async fn tool(&self, tool: Tool) -> Result<Option<std::path::PathBuf>, BuildError> {
        ensure_tool(
            self.runtime,
            self.http_client,
            self.progress,
            &self.env.tools_dir,
            &tool,
            self.options.assume_yes,
        )
        .await
    }

    fn invocation(&self, program: &Path) -> Invocation {
        Invocation::new(program).current_dir(&self.env.project_dir)
    }

    async fn preprocess(&self) -> Result<(), BuildError> {
        let Some(script) = self.tool(Tool::preprocessor()).await? else {
            return Ok(());
        };

        let mut invocation = self
            .invocation(Path::new("python"))
            .arg(script.as_os_str())
            .args([PREPROCESS_INPUT, WATCHFACE_XML, "-y"])
            .inherit_output();
        if self.options.debug {
            invocation = invocation.arg("-d");
        }

        self.progress.start("Preprocessing...");
        let result = self
            .runner
            .run(&invocation)
            .await
            .map_err(anyhow::Error::from)
            .and_then(|output| {
                if output.success {
                    Ok(())
                } else {
                    Err(anyhow::anyhow!("preprocessor exited with {}", output.status_text()))
                }
            });
        self.progress.stop(result.is_ok());
        result.map_err(BuildError::Preprocess)
    }

    async fn validate(&self) -> Result<(), BuildError> {
        let Some(validator) = self.tool(Tool::validator()).await? else {
            info!("Skipping validation: validator not available");
            return Ok(());
        };

        let invocation = self
            .invocation(&self.env.java())
            .arg("-jar")
            .arg(validator.as_os_str())
            .args(["2", WATCHFACE_XML]);

        self.progress.start("Validating...");
        let output = match self.runner.run(&invocation).await {
            Ok(output) => output,
            Err(e) => {
                self.progress.stop(false);
                return Err(BuildError::ValidatorFailed(e.into()));
            }
        };

        let report = format!("{}{}", output.stdout, output.stderr);
        if !output.success {
            self.progress.stop(false);
            return Err(BuildError::Validation(format!(
                "validator exited with {}: {}",
                output.status_text(),
                report.trim()
            )));
        }
        if !report.contains("PASSED") {
            self.progress.stop(false);
            return Err(BuildError::Validation(report.trim().to_string()));
        }
        self.progress.stop(true);
        Ok(())
    }

    async fn gradle(&self) -> Result<(), BuildError> {
        let task = if self.options.release {
            "bundleRelease"
        } else {
            "assembleDebug"
        };
        let gradlew = self.env.gradlew();
        if !self.runtime.exists(&gradlew) {
            return Err(BuildError::Gradle {
                task,
                source: anyhow::anyhow!("{:?} not found", gradlew),
            });
        }

        info!("Building with gradlew {}...", task);
        let invocation = self.invocation(&gradlew).arg(task).inherit_output();
        let output = self
            .runner
            .run(&invocation)
            .await
            .map_err(|e| BuildError::Gradle {
                task,
                source: e.into(),
            })?;
        if !output.success {
            return Err(BuildError::Gradle {
                task,
                source: anyhow::anyhow!("gradlew exited with {}", output.status_text()),
            });
        }
        Ok(())
    }

    /// Reports problems but never fails the build, except for a failed
    /// tool download.
    async fn check_memory_footprint(&self) -> Result<(), BuildError> {
        let Some(tool) = self.tool(Tool::memory_footprint()).await? else {
            return Ok(());
        };

        let invocation = self
            .invocation(&self.env.java())
            .arg("-jar")
            .arg(tool.as_os_str())
            .args([
                "--watch-face",
                RELEASE_BUNDLE,
                "--schema-version",
                "2",
                "--ambient-limit-mb",
                "10",
                "--active-limit-mb",
                "100",
                "--apply-v1-offload-limitations",
                "--estimate-optimization",
                "--report",
                "--verbose",
            ])
            .inherit_output();

        self.progress.start("Checking memory footprint...");
        let passed = matches!(self.runner.run(&invocation).await, Ok(output) if output.success);
        self.progress.stop(passed);
        if !passed {
            warn!("Memory footprint check failed.");
        }
        Ok(())
    }

    async fn install(&self) -> Result<(), BuildError> {
        info!("Installing...");
        let adb = Adb::new(self.runner, self.env.adb());
        let devices = adb.list().await.map_err(BuildError::Install)?;
        let device = pick_device(self.runtime, &devices, self.options.all_devices)?;

        self.progress
            .start(&format!("Installing on {} ({})...", device.name(), device.id));
        let result = async {
            adb.install(&device.id, &self.env.project_path(DEBUG_APK))
                .await?;
            adb.set_watchface(&device.id, &self.env.watchface_id).await
        }
        .await;
        self.progress.stop(result.is_ok());
        result.map_err(BuildError::Install)?;

        info!("Installation complete.");
        Ok(())
    }
}
