//! Gzip-compressed tar extraction.
//!
//! Distribution archives carry a single versioned root directory
//! (`node-v5.1.0-linux-x64/`, `yarn-v1.22.19/`). Extraction keeps that
//! root intact; the fetch pipeline relocates it afterwards.

use flate2::read::GzDecoder;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{ProvisionError, Result};

/// Extract a `.tar.gz` archive into `dest_dir`, preserving the archive's
/// own top-level directory.
pub fn extract_tar_gz(archive_path: &Path, dest_dir: &Path) -> Result<()> {
    let file = File::open(archive_path)?;
    let reader = BufReader::new(file);
    let decoder = GzDecoder::new(reader);
    extract_tar_reader(decoder, dest_dir)
}

fn extract_tar_reader<R: Read>(reader: R, dest_dir: &Path) -> Result<()> {
    std::fs::create_dir_all(dest_dir)?;

    let mut archive = tar::Archive::new(reader);
    archive.set_preserve_permissions(true);

    // Canonicalize dest_dir for the path traversal check
    let dest_dir_canonical = dest_dir.canonicalize().map_err(|e| {
        ProvisionError::Extract(format!("Failed to canonicalize destination: {e}"))
    })?;

    for entry in archive
        .entries()
        .map_err(|e| ProvisionError::Extract(format!("Failed to read tar: {e}")))?
    {
        let mut entry =
            entry.map_err(|e| ProvisionError::Extract(format!("Failed to read tar entry: {e}")))?;

        let path = entry
            .path()
            .map_err(|e| ProvisionError::Extract(format!("Invalid path in tar: {e}")))?
            .into_owned();

        let path_str = path.to_string_lossy();
        if path_str.contains("..") {
            return Err(ProvisionError::Extract(format!(
                "Path traversal detected in archive: {path_str}"
            )));
        }

        let outpath = dest_dir.join(&path);

        if entry.header().entry_type().is_dir() {
            std::fs::create_dir_all(&outpath)?;
            continue;
        }

        if let Some(parent) = outpath.parent() {
            std::fs::create_dir_all(parent)?;

            // Verify the entry stays inside the destination
            let parent_canonical = parent.canonicalize().map_err(|e| {
                ProvisionError::Extract(format!("Failed to canonicalize {}: {e}", parent.display()))
            })?;
            if !parent_canonical.starts_with(&dest_dir_canonical) {
                return Err(ProvisionError::Extract(format!(
                    "Path traversal detected: {path_str} escapes destination directory"
                )));
            }
        }

        entry
            .unpack(&outpath)
            .map_err(|e| ProvisionError::Extract(format!("Failed to extract {path_str}: {e}")))?;
    }

    Ok(())
}
