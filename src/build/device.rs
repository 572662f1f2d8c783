//! Device discovery and installation over `adb`.

use anyhow::{Context, Result, bail};
use log::{debug, warn};
use std::path::{Path, PathBuf};

use super::BuildError;
use crate::process::{CommandRunner, Invocation};
use crate::runtime::{Runtime, SelectChoice};

#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub id: String,
    pub model: String,
    pub wear_os: bool,
    pub os_version: String,
    pub api_level: String,
}

impl Device {
    /// Device without any known properties.
    pub fn unknown(id: &str) -> Self {
        Self {
            id: id.to_string(),
            model: String::new(),
            wear_os: false,
            os_version: String::new(),
            api_level: String::new(),
        }
    }

    pub fn name(&self) -> &str {
        if self.model.is_empty() {
            &self.id
        } else {
            &self.model
        }
    }
}

/// Device ids from `adb devices` output. Offline devices are skipped.
pub fn parse_device_list(output: &str) -> Vec<String> {
    output
        .lines()
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.contains("offline"))
        .filter_map(|line| line.split_whitespace().next())
        .map(str::to_string)
        .collect()
}

pub struct Adb<'a, C: CommandRunner> {
    runner: &'a C,
    program: PathBuf,
}

impl<'a, C: CommandRunner> Adb<'a, C> {
    pub fn new(runner: &'a C, program: PathBuf) -> Self {
        Self { runner, program }
    }

    async fn capture(&self, args: &[&str]) -> Result<String> {
        let invocation = Invocation::new(&self.program).args(args);
        let output = self.runner.run(&invocation).await?;
        if !output.success {
            bail!(
                "{} failed with {}: {}",
                invocation.display(),
                output.status_text(),
                output.stderr.trim()
            );
        }
        Ok(output.stdout)
    }

    async fn passthrough(&self, args: &[&str]) -> Result<()> {
        let invocation = Invocation::new(&self.program).args(args).inherit_output();
        let output = self.runner.run(&invocation).await?;
        if !output.success {
            bail!("{} failed with {}", invocation.display(), output.status_text());
        }
        Ok(())
    }

    #[tracing::instrument(skip(self))]
    pub async fn devices(&self) -> Result<Vec<String>> {
        let output = self
            .capture(&["devices"])
            .await
            .context("Failed to list devices")?;
        Ok(parse_device_list(&output))
    }

    async fn getprop(&self, id: &str, property: &str) -> Result<String> {
        let value = self
            .capture(&["-s", id, "shell", "getprop", property])
            .await?;
        Ok(value.trim().to_string())
    }

    /// Queries model, characteristics and OS version of `id`.
    #[tracing::instrument(skip(self))]
    pub async fn device_info(&self, id: &str) -> Result<Device> {
        let model = self.getprop(id, "ro.product.model").await?;
        let characteristics = self.getprop(id, "ro.build.characteristics").await?;
        let os_version = self.getprop(id, "ro.build.version.release").await?;
        let api_level = self.getprop(id, "ro.build.version.sdk").await?;
        debug!("{}: {} [{}]", id, model, characteristics);

        Ok(Device {
            id: id.to_string(),
            model,
            wear_os: characteristics.contains("watch"),
            os_version,
            api_level,
        })
    }

    /// Every online device with its properties. A device whose properties
    /// cannot be read is kept as not Wear OS.
    pub async fn list(&self) -> Result<Vec<Device>> {
        let mut devices = Vec::new();
        for id in self.devices().await? {
            match self.device_info(&id).await {
                Ok(device) => devices.push(device),
                Err(e) => {
                    warn!("Error checking device properties of {}: {:#}", id, e);
                    devices.push(Device::unknown(&id));
                }
            }
        }
        Ok(devices)
    }

    #[tracing::instrument(skip(self))]
    pub async fn install(&self, id: &str, apk: &Path) -> Result<()> {
        let apk = apk.to_string_lossy();
        self.passthrough(&["-s", id, "install", &apk]).await
    }

    /// Makes the installed watch face the active one.
    #[tracing::instrument(skip(self))]
    pub async fn set_watchface(&self, id: &str, watchface_id: &str) -> Result<()> {
        self.passthrough(&[
            "-s",
            id,
            "shell",
            "am",
            "broadcast",
            "-a",
            "com.google.android.wearable.app.DEBUG_SURFACE",
            "--es",
            "operation",
            "set-watchface",
            "--es",
            "watchFaceId",
            watchface_id,
        ])
        .await
    }
}

/// Chooses the install target.
///
/// A single device is used as is. With several devices, at least one must be
/// Wear OS unless `all` is set, and the user picks one; non Wear OS devices
/// can only be picked with `all`.
pub fn pick_device<'d, R: Runtime>(
    runtime: &R,
    devices: &'d [Device],
    all: bool,
) -> Result<&'d Device, BuildError> {
    match devices {
        [] => Err(BuildError::NoDevice),
        [only] => Ok(only),
        _ if !all && !devices.iter().any(|d| d.wear_os) => Err(BuildError::NoWearOsDevice),
        _ => {
            let choices: Vec<SelectChoice> = devices
                .iter()
                .enumerate()
                .map(|(i, device)| {
                    let mut label = format!("Device {}: {} ({})", i + 1, device.name(), device.id);
                    if device.wear_os {
                        label.push_str(&format!(
                            " - Wear OS {} (API {})",
                            device.os_version, device.api_level
                        ));
                    } else {
                        label.push_str(" (incompatible)");
                    }
                    SelectChoice::new(label, device.wear_os || all)
                })
                .collect();
            let index = runtime
                .select("Multiple devices found. Select a device to run on:", &choices)
                .map_err(BuildError::Install)?;
            devices
                .get(index)
                .ok_or_else(|| BuildError::Install(anyhow::anyhow!("no device #{}", index + 1)))
        }
    }
}
