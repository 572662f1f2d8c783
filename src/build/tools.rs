//! Third-party build tools kept in the shared `wff-build-tools` directory.

use log::{info, warn};
use std::path::{Path, PathBuf};

use super::BuildError;
use crate::download::download_file;
use crate::http::HttpClient;
use crate::progress::Progress;
use crate::runtime::Runtime;

#[derive(Debug, Clone, PartialEq)]
pub struct Tool {
    /// Short name for messages.
    pub label: &'static str,
    pub file_name: &'static str,
    pub url: String,
    /// What is skipped when the user declines the download.
    pub skipped: &'static str,
}

impl Tool {
    pub fn preprocessor() -> Self {
        Self {
            label: "preprocessor script",
            file_name: "preprocess.py",
            url: "https://raw.githubusercontent.com/gondwanasoft/xml-preprocessor/main/preprocess.py"
                .to_string(),
            skipped: "preprocessing",
        }
    }

    pub fn validator() -> Self {
        Self {
            label: "validator",
            file_name: "dwf-format-2-validator-1.0.jar",
            url: "https://github.com/google/watchface/releases/download/latest/dwf-format-2-validator-1.0.jar"
                .to_string(),
            skipped: "watch face validation",
        }
    }

    pub fn memory_footprint() -> Self {
        Self {
            label: "memory footprint tool",
            file_name: "memory-footprint.jar",
            url: "https://github.com/google/watchface/releases/download/latest/memory-footprint.jar"
                .to_string(),
            skipped: "memory footprint check",
        }
    }

    pub fn path_in(&self, tools_dir: &Path) -> PathBuf {
        tools_dir.join(self.file_name)
    }
}

/// Returns the tool's path, downloading it first when it is missing and the
/// user agrees. `None` means the user declined.
#[tracing::instrument(skip(runtime, http_client, progress))]
pub async fn ensure_tool<R: Runtime, P: Progress>(
    runtime: &R,
    http_client: &HttpClient,
    progress: &P,
    tools_dir: &Path,
    tool: &Tool,
    assume_yes: bool,
) -> Result<Option<PathBuf>, BuildError> {
    let path = tool.path_in(tools_dir);
    if runtime.exists(&path) {
        return Ok(Some(path));
    }

    let prompt = format!("The {} was not found. Download it from {}?", tool.label, tool.url);
    let accepted = assume_yes
        || runtime
            .confirm(&prompt)
            .map_err(|source| BuildError::Download {
                tool: tool.label,
                source,
            })?;
    if !accepted {
        warn!("{} not downloaded; skipping {}", tool.label, tool.skipped);
        return Ok(None);
    }

    progress.start(&format!("Downloading {}...", tool.label));
    match download_file(runtime, &tool.url, &path, http_client).await {
        Ok(()) => {
            progress.stop(true);
            info!("Saved {} to {:?}", tool.label, path);
            Ok(Some(path))
        }
        Err(source) => {
            progress.stop(false);
            Err(BuildError::Download {
                tool: tool.label,
                source,
            })
        }
    }
}
