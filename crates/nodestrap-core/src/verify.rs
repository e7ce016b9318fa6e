//! Integrity verification for downloaded artifacts.
//!
//! Two schemes, selected explicitly by the distribution spec: a SHA-256
//! checksum manifest (Node.js ships `SHASUMS256.txt`) or a detached GPG
//! signature (Yarn ships `.asc` files). This module never touches the
//! network; signature checks shell out to `gpg` against keys imported
//! earlier in the run.

use sha2::{Digest, Sha256};
use std::path::Path;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::dist::VerifyMode;
use crate::error::{ProvisionError, Result};

/// Verify an artifact against its reference file.
pub async fn verify(artifact: &Path, reference: &Path, mode: VerifyMode) -> Result<()> {
    match mode {
        VerifyMode::Sha256Manifest => verify_manifest(artifact, reference).await,
        VerifyMode::GpgSignature => verify_signature(artifact, reference).await,
    }
}

/// Check the artifact's SHA-256 digest against a "hash  filename"
/// manifest. The line is matched on the artifact's file name.
async fn verify_manifest(artifact: &Path, manifest: &Path) -> Result<()> {
    let file_name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| integrity(artifact, "artifact has no file name"))?;

    let manifest_text = tokio::fs::read_to_string(manifest).await?;

    let expected = manifest_entry(&manifest_text, &file_name)
        .ok_or_else(|| integrity(artifact, &format!("no manifest entry for {file_name}")))?;

    let actual = compute_sha256(artifact).await?;

    if !actual.eq_ignore_ascii_case(&expected) {
        return Err(integrity(
            artifact,
            &format!("checksum mismatch: expected {expected}, got {actual}"),
        ));
    }

    Ok(())
}

/// Find the manifest line whose file name column matches `file_name`.
/// Node manifests prefix some names with `./`.
fn manifest_entry(manifest: &str, file_name: &str) -> Option<String> {
    for line in manifest.lines() {
        let mut parts = line.split_whitespace();
        let (Some(hash), Some(name)) = (parts.next(), parts.next()) else {
            continue;
        };
        let name = name.strip_prefix("./").unwrap_or(name);
        if name == file_name {
            return Some(hash.to_string());
        }
    }
    None
}

/// Verify a detached GPG signature over the artifact. The signing key
/// must have been imported earlier via [`import_key`].
async fn verify_signature(artifact: &Path, signature: &Path) -> Result<()> {
    let output = Command::new("gpg")
        .arg("--batch")
        .arg("--verify")
        .arg(signature)
        .arg(artifact)
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(integrity(
            artifact,
            &format!("signature verification failed: {}", stderr.trim()),
        ));
    }

    Ok(())
}

/// Import an armored public key into the gpg keyring.
///
/// The key is imported fresh on every run; there is no trust-store reuse
/// check. Reproducibility is preferred over speed here.
pub async fn import_key(key: &[u8]) -> Result<()> {
    use std::process::Stdio;
    use tokio::io::AsyncWriteExt;

    let mut child = Command::new("gpg")
        .arg("--batch")
        .arg("--import")
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        stdin.write_all(key).await?;
    }

    let output = child.wait_with_output().await?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ProvisionError::Install(format!(
            "gpg key import failed: {}",
            stderr.trim()
        )));
    }

    Ok(())
}

/// Compute the SHA-256 digest of a file as lowercase hex.
pub async fn compute_sha256(path: &Path) -> Result<String> {
    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];

    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

fn integrity(artifact: &Path, reason: &str) -> ProvisionError {
    ProvisionError::Integrity {
        artifact: artifact.display().to_string(),
        reason: reason.to_string(),
    }
}
