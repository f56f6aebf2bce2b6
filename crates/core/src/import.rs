//! Import orchestrator: upload a local directory tree into a remote
//! repository.
//!
//! The uploader for the configured repository type is resolved first; an
//! unknown type ends the run before the filesystem or network is touched.
//! The import root is then walked in name order and every eligible regular
//! file becomes one upload task.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::config::RunConfig;
use crate::errors::RunError;
use crate::formats::{FormatRegistry, UploadContext, Uploader};
use crate::pipeline::{Pipeline, ProgressObserver, TransferReport, UploadTask};
use crate::transport::Transport;

/// Run a full import. The returned report may still contain per-file
/// failures; see [`TransferReport::into_result`].
#[instrument(skip_all, fields(repository = %config.repo_name, repo_type = %config.repo_type))]
pub async fn import_repository(
    config: &RunConfig,
    registry: &FormatRegistry,
    progress: Arc<dyn ProgressObserver>,
) -> Result<TransferReport, RunError> {
    config.validate()?;
    let uploader = registry.uploader_for(&config.repo_type)?;
    let root = config.require_import_dir()?;

    let files = collect_files(root, &uploader)?;
    if files.is_empty() {
        info!(root = %root.display(), "nothing to transfer");
        return Ok(TransferReport::empty(config.dry_run));
    }
    info!(files = files.len(), root = %root.display(), "importing files");

    import_files(config, uploader, files, progress).await
}

/// Upload an explicit list of files. Each file is still checked against the
/// import root and fails on its own if it lies outside it.
pub async fn import_files(
    config: &RunConfig,
    uploader: Uploader,
    files: Vec<PathBuf>,
    progress: Arc<dyn ProgressObserver>,
) -> Result<TransferReport, RunError> {
    let root = config.require_import_dir()?;
    let ctx = Arc::new(UploadContext {
        transport: Transport::new(config.credentials.clone())?,
        base_url: config.base_url.clone(),
        repo_name: config.repo_name.clone(),
        import_root: root.to_path_buf(),
    });

    let tasks: Vec<UploadTask> = files.into_iter().map(|path| UploadTask { path }).collect();
    let report = Pipeline::new(config.workers, config.dry_run)
        .run(tasks, progress, move |task: UploadTask| {
            let ctx = Arc::clone(&ctx);
            async move { uploader.upload(&ctx, &task.path).await }
        })
        .await;

    Ok(report)
}

/// Every regular file below `root` that `uploader` accepts, in name order.
/// Symbolic links are not followed.
pub fn collect_files(root: &Path, uploader: &Uploader) -> Result<Vec<PathBuf>, RunError> {
    let mut files = Vec::new();
    walk(root, uploader, &mut files)?;
    debug!(
        root = %root.display(),
        eligible = files.len(),
        repo_type = %uploader.repo_type(),
        "walked import directory"
    );
    Ok(files)
}

fn walk(dir: &Path, uploader: &Uploader, files: &mut Vec<PathBuf>) -> Result<(), RunError> {
    let walk_err = |source: std::io::Error| RunError::Walk {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = std::fs::read_dir(dir)
        .map_err(walk_err)?
        .collect::<Result<Vec<_>, _>>()
        .map_err(walk_err)?;
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        let file_type = entry.file_type().map_err(|source| RunError::Walk {
            path: path.clone(),
            source,
        })?;

        if file_type.is_dir() {
            walk(&path, uploader, files)?;
        } else if file_type.is_file() && uploader.is_eligible(&path) {
            files.push(path);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ConfigError;
    use crate::formats::RepoType;
    use crate::pipeline::NoProgress;

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, b"x").unwrap();
    }

    fn relative(root: &Path, files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn test_collect_filters_by_eligibility_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        touch(root, "org/b/lib/1.0/lib-1.0.pom");
        touch(root, "org/b/lib/1.0/lib-1.0.jar");
        touch(root, "org/b/lib/1.0/lib-1.0.jar.sha1");
        touch(root, "org/a/app/2.0/app-2.0.jar");
        touch(root, "README.md");

        let files = collect_files(root, &Uploader::for_type(RepoType::Maven)).unwrap();
        assert_eq!(
            relative(root, &files),
            vec![
                "org/a/app/2.0/app-2.0.jar",
                "org/b/lib/1.0/lib-1.0.jar",
                "org/b/lib/1.0/lib-1.0.pom",
            ]
        );

        let files = collect_files(root, &Uploader::for_type(RepoType::Raw)).unwrap();
        assert_eq!(files.len(), 5);
        assert_eq!(relative(root, &files)[0], "README.md");
    }

    #[test]
    fn test_collect_empty_tree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("empty/nested")).unwrap();
        let files = collect_files(dir.path(), &Uploader::for_type(RepoType::Raw)).unwrap();
        assert!(files.is_empty());
    }

    #[test]
    fn test_collect_missing_root_is_walk_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = collect_files(&dir.path().join("missing"), &Uploader::for_type(RepoType::Raw))
            .unwrap_err();
        assert!(matches!(err, RunError::Walk { .. }));
    }

    #[tokio::test]
    async fn test_import_unsupported_type_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.tgz");
        let cfg = RunConfig::new("http://127.0.0.1:1", "r", "docker").with_import_dir(dir.path());

        let err = import_repository(&cfg, &FormatRegistry::standard(), Arc::new(NoProgress))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RunError::Config(ConfigError::UnsupportedRepoType { .. })
        ));
    }

    #[tokio::test]
    async fn test_import_requires_import_dir() {
        let cfg = RunConfig::new("http://127.0.0.1:1", "r", "raw");
        let err = import_repository(&cfg, &FormatRegistry::standard(), Arc::new(NoProgress))
            .await
            .unwrap_err();
        assert!(matches!(err, RunError::Config(ConfigError::MissingValue(_))));
    }

    #[tokio::test]
    async fn test_import_nothing_eligible() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "notes.txt");
        let cfg =
            RunConfig::new("http://127.0.0.1:1", "npm-hosted", "npm").with_import_dir(dir.path());

        let report = import_repository(&cfg, &FormatRegistry::standard(), Arc::new(NoProgress))
            .await
            .unwrap();
        assert_eq!(report.total, 0);
        assert!(report.is_success());
    }

    #[tokio::test]
    async fn test_import_dry_run_counts_without_network() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a/one.bin");
        touch(dir.path(), "b/two.bin");
        // Nothing listens on port 1; a real request would fail.
        let cfg = RunConfig::new("http://127.0.0.1:1", "files", "raw")
            .with_import_dir(dir.path())
            .with_dry_run(true);

        let report = import_repository(&cfg, &FormatRegistry::standard(), Arc::new(NoProgress))
            .await
            .unwrap();
        assert!(report.dry_run);
        assert_eq!(report.total, 2);
        assert_eq!(report.succeeded, 2);
    }
}
