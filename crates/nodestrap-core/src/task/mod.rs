//! The two install tasks and their shared filesystem helpers.

pub mod node;
pub mod yarn;

pub use node::NodeTask;
pub use yarn::YarnTask;

use std::path::Path;
use tokio::process::Command;

use crate::error::{ProvisionError, Result};
use crate::report::Reporter;

/// Create a symlink at `link` pointing to `target`, replacing any stale
/// link already present.
#[cfg(unix)]
pub(crate) async fn link_executable(link: &Path, target: &Path) -> Result<()> {
    if let Some(parent) = link.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    if tokio::fs::symlink_metadata(link).await.is_ok() {
        tokio::fs::remove_file(link).await?;
    }

    tokio::fs::symlink(target, link).await?;

    Ok(())
}

/// Remove every listed file or directory that exists. Paths that are
/// already absent are skipped silently.
pub(crate) async fn purge_paths(root: &Path, relative: &[&str], reporter: &Reporter) -> Result<()> {
    for rel in relative {
        let path = root.join(rel);
        let Ok(meta) = tokio::fs::symlink_metadata(&path).await else {
            continue;
        };

        reporter.progress(&format!("Removing {}", path.display()));
        if meta.is_dir() {
            tokio::fs::remove_dir_all(&path).await?;
        } else {
            tokio::fs::remove_file(&path).await?;
        }
    }

    Ok(())
}

/// Run `<executable> --version` and return the trimmed stdout. Used as
/// the post-install check for both tools.
pub(crate) async fn version_query(executable: &Path, tool: &str) -> Result<String> {
    let output = Command::new(executable)
        .arg("--version")
        .output()
        .await
        .map_err(|e| ProvisionError::PostInstall {
            tool: tool.to_string(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(ProvisionError::PostInstall {
            tool: tool.to_string(),
            reason: format!("version query exited with {}", output.status),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}
