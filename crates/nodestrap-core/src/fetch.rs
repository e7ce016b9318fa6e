//! The fetch pipeline: download, verify, extract, relocate.
//!
//! Each call owns a fresh scratch workspace that is removed on every
//! exit path. The archive and its reference file are downloaded
//! concurrently; verification strictly happens after both complete.
//! Every failure is terminal for the whole run; there are no retries.

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use crate::archive;
use crate::dist::DistSpec;
use crate::error::{ProvisionError, Result};
use crate::http::HttpClient;
use crate::report::Reporter;
use crate::verify;

pub struct Fetcher {
    http: Arc<HttpClient>,
    workspace_root: Option<PathBuf>,
}

impl Fetcher {
    pub fn new(http: Arc<HttpClient>) -> Self {
        Self {
            http,
            workspace_root: None,
        }
    }

    /// Create scratch workspaces under `root` instead of the system
    /// temp directory.
    pub fn with_workspace_root(http: Arc<HttpClient>, root: impl Into<PathBuf>) -> Self {
        Self {
            http,
            workspace_root: Some(root.into()),
        }
    }

    /// Run the full pipeline for one distribution.
    ///
    /// Precondition: the install target must not already be enterable as
    /// a directory. That check happens before the workspace is created,
    /// so a violated precondition leaves nothing behind.
    pub async fn fetch(&self, spec: &DistSpec, reporter: &Reporter) -> Result<()> {
        if tokio::fs::read_dir(&spec.install_dir).await.is_ok() {
            return Err(ProvisionError::Precondition {
                path: spec.install_dir.display().to_string(),
            });
        }

        // Removed on drop, which covers every exit path below
        let workspace = self.workspace()?;

        let artifact_path = workspace.path().join(spec.artifact_file_name());
        let reference_path = workspace.path().join(spec.reference_file_name());

        reporter.progress(&format!("[{}] Downloading {}", spec.name, spec.artifact_url));
        reporter.progress(&format!("[{}] Downloading {}", spec.name, spec.reference_url));

        let artifact_dl = {
            let http = Arc::clone(&self.http);
            let url = spec.artifact_url.clone();
            let dest = artifact_path.clone();
            tokio::spawn(async move { http.download(&url, &dest).await })
        };
        let reference_dl = {
            let http = Arc::clone(&self.http);
            let url = spec.reference_url.clone();
            let dest = reference_path.clone();
            tokio::spawn(async move { http.download(&url, &dest).await })
        };

        // The artifact decides first; a failed artifact download does
        // not wait for the reference.
        if let Err(e) = artifact_dl.await? {
            reference_dl.abort();
            return Err(e);
        }
        reference_dl.await??;

        reporter.progress(&format!(
            "[{}] Verifying {}",
            spec.name,
            spec.artifact_file_name()
        ));
        verify::verify(&artifact_path, &reference_path, spec.verify_mode).await?;

        reporter.progress(&format!(
            "[{}] Extracting {}",
            spec.name,
            spec.artifact_file_name()
        ));
        let extract_dest = workspace.path().to_path_buf();
        tokio::task::spawn_blocking(move || archive::extract_tar_gz(&artifact_path, &extract_dest))
            .await??;

        let extracted_root = workspace.path().join(&spec.archive_root);
        if !extracted_root.is_dir() {
            return Err(ProvisionError::Extract(format!(
                "archive root {} not found after extraction",
                spec.archive_root
            )));
        }

        if let Some(parent) = spec.install_dir.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        reporter.progress(&format!(
            "[{}] Installing to {}",
            spec.name,
            spec.install_dir.display()
        ));
        move_tree(&extracted_root, &spec.install_dir).await?;

        Ok(())
    }

    fn workspace(&self) -> Result<TempDir> {
        let dir = match &self.workspace_root {
            Some(root) => tempfile::tempdir_in(root)?,
            None => tempfile::tempdir()?,
        };
        log::debug!("Created scratch workspace {}", dir.path().display());
        Ok(dir)
    }
}

/// Move a directory tree. The workspace usually sits on a different
/// filesystem than the install target, so a failed rename falls back to
/// a recursive copy; the source is cleaned up with the workspace.
async fn move_tree(src: &std::path::Path, dest: &std::path::Path) -> Result<()> {
    if tokio::fs::rename(src, dest).await.is_ok() {
        return Ok(());
    }

    let src = src.to_path_buf();
    let dest = dest.to_path_buf();
    tokio::task::spawn_blocking(move || copy_tree(&src, &dest)).await??;
    Ok(())
}

fn copy_tree(src: &std::path::Path, dest: &std::path::Path) -> Result<()> {
    std::fs::create_dir_all(dest)?;

    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let from = entry.path();
        let to = dest.join(entry.file_name());
        let meta = std::fs::symlink_metadata(&from)?;

        if meta.is_dir() {
            copy_tree(&from, &to)?;
        } else if meta.is_symlink() {
            // Node trees link bin/npm into lib/node_modules
            let target = std::fs::read_link(&from)?;
            #[cfg(unix)]
            std::os::unix::fs::symlink(target, &to)?;
        } else {
            std::fs::copy(&from, &to)?;
        }
    }

    Ok(())
}
