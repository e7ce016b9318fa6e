//! Distribution specs: where an archive lives, how it is verified, and
//! where it lands.

use std::path::PathBuf;

use crate::config::{Config, NodeVariant};

/// How a downloaded artifact is checked against its reference file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyMode {
    /// Reference is a `SHASUMS256.txt`-style manifest of "hash  filename" lines
    Sha256Manifest,
    /// Reference is a detached GPG signature over the artifact
    GpgSignature,
}

/// Everything the fetch pipeline needs to know about one distribution.
/// Constructed once per tool per run, immutable afterwards.
#[derive(Debug, Clone)]
pub struct DistSpec {
    /// Short label used in diagnostics ("node", "yarn")
    pub name: String,
    pub version: String,
    /// URL of the primary archive
    pub artifact_url: String,
    /// URL of the checksum manifest or detached signature
    pub reference_url: String,
    /// Final directory the extracted tree is moved to
    pub install_dir: PathBuf,
    /// Name of the top-level directory inside the archive
    pub archive_root: String,
    pub verify_mode: VerifyMode,
}

impl DistSpec {
    /// Spec for the Node.js distribution, binary or source depending on
    /// the configured variant.
    pub fn node(config: &Config) -> Self {
        let version = &config.node_version;
        let archive_root = match &config.node_variant {
            NodeVariant::Binary(variant) => format!("node-v{version}-{variant}"),
            NodeVariant::FromSource => format!("node-v{version}"),
        };

        Self {
            name: "node".to_string(),
            version: version.clone(),
            artifact_url: format!(
                "{}/v{}/{}.tar.gz",
                config.node_mirror, version, archive_root
            ),
            reference_url: format!("{}/v{}/SHASUMS256.txt", config.node_mirror, version),
            install_dir: config.node_folder.clone(),
            archive_root,
            verify_mode: VerifyMode::Sha256Manifest,
        }
    }

    /// Spec for the Yarn distribution. Yarn releases ship a detached
    /// `.asc` signature instead of a checksum manifest.
    pub fn yarn(config: &Config) -> Self {
        let version = &config.yarn_version;
        let archive_root = format!("yarn-v{version}");
        let artifact_url = format!("{}/v{}/{}.tar.gz", config.yarn_mirror, version, archive_root);

        Self {
            name: "yarn".to_string(),
            version: version.clone(),
            reference_url: format!("{artifact_url}.asc"),
            artifact_url,
            install_dir: config.yarn_folder.clone(),
            archive_root,
            verify_mode: VerifyMode::GpgSignature,
        }
    }

    /// File name the artifact is stored under in the scratch workspace,
    /// derived from the URL's trailing path segment.
    pub fn artifact_file_name(&self) -> String {
        trailing_segment(&self.artifact_url)
    }

    /// File name the reference file is stored under in the workspace.
    pub fn reference_file_name(&self) -> String {
        trailing_segment(&self.reference_url)
    }
}

fn trailing_segment(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_string()
}
