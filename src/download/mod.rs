use crate::http::HttpClient;
use crate::runtime::Runtime;
use anyhow::{Context, Result};
use log::info;
use std::path::{Path, PathBuf};

/// Downloads `url` to `dest`. The body is streamed to `<dest>.tmp` and
/// renamed into place once complete, so `dest` is never left half written.
#[tracing::instrument(skip(runtime, http_client))]
pub async fn download_file<R: Runtime>(
    runtime: &R,
    url: &str,
    dest: &Path,
    http_client: &HttpClient,
) -> Result<()> {
    info!("Downloading {}...", url);

    let staged = staging_path(dest);
    if let Some(parent) = dest.parent()
        && !parent.as_os_str().is_empty()
        && !runtime.is_dir(parent)
    {
        runtime
            .create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let result = http_client
        .download_file(url, || {
            runtime
                .create_file(&staged)
                .with_context(|| format!("Failed to create temporary file at {:?}", staged))
        })
        .await;

    if let Err(e) = result {
        if runtime.exists(&staged) {
            let _ = runtime.remove_file(&staged);
        }
        return Err(e.context(format!("Failed to download {}", url)));
    }

    runtime
        .rename(&staged, dest)
        .with_context(|| format!("Failed to move download into {:?}", dest))?;

    info!("Download complete.");
    Ok(())
}

fn staging_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_os_string();
    name.push(".tmp");
    PathBuf::from(name)
}
