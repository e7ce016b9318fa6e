//! Yarn install task.
//!
//! Yarn releases are signed, so the fetch phase first imports the
//! maintainers' public key. The key is imported fresh on every run.

use std::sync::Arc;

use tokio::io::AsyncWriteExt;

use crate::config::Config;
use crate::dist::DistSpec;
use crate::error::Result;
use crate::fetch::Fetcher;
use crate::http::HttpClient;
use crate::report::Reporter;
use crate::verify;

use super::{link_executable, purge_paths, version_query};

/// Yarn maintainers' public signing key
pub const YARN_PUBKEY_URL: &str = "https://dl.yarnpkg.com/debian/pubkey.gpg";

const YARN_EXTRAS: &[&str] = &["README.md", "LICENSE", "end_to_end_tests"];

pub struct YarnTask {
    config: Config,
    spec: DistSpec,
    http: Arc<HttpClient>,
    fetcher: Fetcher,
}

impl YarnTask {
    pub fn new(config: Config, http: Arc<HttpClient>) -> Self {
        let spec = DistSpec::yarn(&config);
        Self {
            config,
            spec,
            fetcher: Fetcher::new(Arc::clone(&http)),
            http,
        }
    }

    /// Import the signing key, then download, verify and unpack the
    /// Yarn distribution.
    pub async fn fetch(&self, reporter: &Reporter) -> Result<()> {
        reporter.progress(&format!("[yarn] Importing signing key from {YARN_PUBKEY_URL}"));
        let key = self.http.download_bytes(YARN_PUBKEY_URL).await?;
        verify::import_key(&key).await?;

        self.fetcher.fetch(&self.spec, reporter).await
    }

    /// Link yarn onto the system path, extend the login PATH with its
    /// global bin directory, and trim installation artifacts.
    pub async fn install(&self, reporter: &Reporter) -> Result<()> {
        let yarn_link = self.config.bin_dir.join("yarn");
        let yarn_target = self.config.yarn_folder.join("bin/yarn");
        reporter.progress(&format!(
            "Linking {} -> {}",
            yarn_link.display(),
            yarn_target.display()
        ));
        link_executable(&yarn_link, &yarn_target).await?;
        link_executable(
            &self.config.bin_dir.join("yarnpkg"),
            &self.config.yarn_folder.join("bin/yarnpkg"),
        )
        .await?;

        self.extend_profile_path(&yarn_link, reporter).await?;

        if !self.config.keep_extras {
            purge_paths(&self.config.yarn_folder, YARN_EXTRAS, reporter).await?;
        }

        let version = version_query(&yarn_link, "yarn").await?;
        reporter.success(&format!("yarn {version} installed"));

        Ok(())
    }

    /// Ask the freshly linked executable for its global bin directory
    /// and append a PATH line to the shell initialization file.
    async fn extend_profile_path(
        &self,
        yarn_link: &std::path::Path,
        reporter: &Reporter,
    ) -> Result<()> {
        let output = tokio::process::Command::new(yarn_link)
            .arg("global")
            .arg("bin")
            .output()
            .await
            .map_err(|e| crate::error::ProvisionError::Install(format!(
                "failed to query yarn global bin: {e}"
            )))?;

        if !output.status.success() {
            return Err(crate::error::ProvisionError::Install(format!(
                "yarn global bin exited with {}",
                output.status
            )));
        }

        let global_bin = String::from_utf8_lossy(&output.stdout).trim().to_string();
        reporter.progress(&format!(
            "Adding {} to PATH in {}",
            global_bin,
            self.config.profile_path.display()
        ));

        let mut profile = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.config.profile_path)
            .await?;
        profile
            .write_all(format!("export PATH=\"$PATH:{global_bin}\"\n").as_bytes())
            .await?;
        profile.flush().await?;

        Ok(())
    }
}
