//! Export orchestrator: mirror a remote repository onto the local disk.
//!
//! 1. Create the export root (unless dry run).
//! 2. Enumerate every asset through the search API.
//! 3. Map each asset path through the format's [`Exporter`].
//! 4. Download all assets through the [`Pipeline`].
//!
//! Enumeration failures abort the run before any download starts. Download
//! failures are per-asset and end up in the returned [`TransferReport`].
//!
//! [`Exporter`]: crate::formats::Exporter

use std::path::{Path, PathBuf};
use std::sync::Arc;

use reqwest::{Response, StatusCode};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, instrument};

use crate::assets::{enumerate_assets, SearchClient};
use crate::config::RunConfig;
use crate::errors::{RunError, TransferError, TransportError};
use crate::formats::FormatRegistry;
use crate::pipeline::{DownloadTask, Pipeline, ProgressObserver, TransferReport};
use crate::transport::{diagnostic_body, Transport};

/// Run a full export. The returned report may still contain per-asset
/// failures; see [`TransferReport::into_result`].
#[instrument(skip_all, fields(repository = %config.repo_name, repo_type = %config.repo_type))]
pub async fn export_repository(
    config: &RunConfig,
    registry: &FormatRegistry,
    progress: Arc<dyn ProgressObserver>,
) -> Result<TransferReport, RunError> {
    config.validate()?;

    let root = config.export_root();
    if config.dry_run {
        debug!(root = %root.display(), "dry run, not creating export directory");
    } else {
        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|source| RunError::ExportDir {
                path: root.clone(),
                source,
            })?;
    }

    let transport = Transport::new(config.credentials.clone())?;
    let search = SearchClient::new(transport.clone(), &config.base_url, &config.repo_name);
    let assets = enumerate_assets(&search).await?;

    if assets.is_empty() {
        info!("nothing to transfer");
        return Ok(TransferReport::empty(config.dry_run));
    }

    let exporter = registry.exporter_for(&config.repo_type);
    let tasks: Vec<DownloadTask> = assets
        .into_iter()
        .map(|asset| DownloadTask {
            local_path: exporter.local_path(&asset.path),
            url: asset.download_url,
        })
        .collect();
    info!(
        assets = tasks.len(),
        root = %root.display(),
        "exporting assets"
    );

    let root = Arc::new(root);
    let report = Pipeline::new(config.workers, config.dry_run)
        .run(tasks, progress, move |task: DownloadTask| {
            let transport = transport.clone();
            let root = Arc::clone(&root);
            async move { download(&transport, &root, task).await }
        })
        .await;

    Ok(report)
}

/// Fetch one asset and stream it below `root`. Nothing is written unless
/// the server answers 200; a body that fails midway leaves no file behind.
async fn download(
    transport: &Transport,
    root: &Path,
    task: DownloadTask,
) -> Result<(), TransferError> {
    let destination = destination_under(root, &task.local_path)?;

    let resp = transport.get(&task.url).await?;
    let status = resp.status();
    if status != StatusCode::OK {
        return Err(TransferError::UnexpectedStatus {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("").to_string(),
            body: diagnostic_body(resp).await,
        });
    }

    if let Some(parent) = destination.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|source| TransferError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
    }

    match write_body(resp, &destination).await {
        Ok(bytes) => {
            debug!(path = %destination.display(), bytes, "downloaded");
            Ok(())
        }
        Err(e) => {
            let _ = tokio::fs::remove_file(&destination).await;
            Err(e)
        }
    }
}

/// Copy the response body to `destination` chunk by chunk.
async fn write_body(mut resp: Response, destination: &Path) -> Result<u64, TransferError> {
    let io_err = |source: std::io::Error| TransferError::Io {
        path: destination.to_path_buf(),
        source,
    };
    let url = resp.url().to_string();

    let mut file = tokio::fs::File::create(destination).await.map_err(io_err)?;
    let mut written = 0u64;
    while let Some(chunk) = resp.chunk().await.map_err(|source| TransportError::Body {
        url: url.clone(),
        source,
    })? {
        file.write_all(&chunk).await.map_err(io_err)?;
        written += chunk.len() as u64;
    }
    file.flush().await.map_err(io_err)?;
    Ok(written)
}

/// Resolve a remote asset path below the export root. Paths that would
/// climb out of the root, or name no file at all, are rejected.
fn destination_under(root: &Path, local_path: &str) -> Result<PathBuf, TransferError> {
    let invalid = |detail: &str| TransferError::InvalidLayout {
        format: "export".into(),
        path: local_path.to_string(),
        detail: detail.to_string(),
    };

    let mut destination = root.to_path_buf();
    let mut segments = 0usize;
    for segment in local_path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => return Err(invalid("path escapes the export directory")),
            s => {
                destination.push(s);
                segments += 1;
            }
        }
    }
    if segments == 0 {
        return Err(invalid("empty asset path"));
    }
    Ok(destination)
}
