//! Node.js install task.

use std::process::Stdio;
use std::sync::Arc;

use tokio::process::Command;

use crate::config::Config;
use crate::dist::DistSpec;
use crate::error::{ProvisionError, Result};
use crate::fetch::Fetcher;
use crate::http::HttpClient;
use crate::report::Reporter;

use super::{link_executable, purge_paths, version_query};

/// Auxiliary files removed from the installed tree unless extras are kept
const NODE_EXTRAS: &[&str] = &[
    "bin/npm",
    "bin/npx",
    "lib/node_modules",
    "share",
    "README.md",
    "LICENSE",
    "CHANGELOG.md",
];

pub struct NodeTask {
    config: Config,
    spec: DistSpec,
    fetcher: Fetcher,
}

impl NodeTask {
    pub fn new(config: Config, http: Arc<HttpClient>) -> Self {
        let spec = DistSpec::node(&config);
        Self {
            config,
            spec,
            fetcher: Fetcher::new(http),
        }
    }

    /// Download, verify and unpack the Node.js distribution.
    pub async fn fetch(&self, reporter: &Reporter) -> Result<()> {
        self.fetcher.fetch(&self.spec, reporter).await
    }

    /// Link the runtime onto the system path (or compile it, for the
    /// source variant) and trim installation artifacts.
    pub async fn install(&self, reporter: &Reporter) -> Result<()> {
        if self.config.node_variant.is_from_source() {
            self.build_from_source(reporter).await?;
        } else {
            let node_link = self.config.bin_dir.join("node");
            let node_target = self.config.node_folder.join("bin/node");
            reporter.progress(&format!(
                "Linking {} -> {}",
                node_link.display(),
                node_target.display()
            ));
            link_executable(&node_link, &node_target).await?;

            if self.config.keep_extras {
                let npm_link = self.config.bin_dir.join("npm");
                let npm_target = self.config.node_folder.join("bin/npm");
                reporter.progress(&format!(
                    "Linking {} -> {}",
                    npm_link.display(),
                    npm_target.display()
                ));
                link_executable(&npm_link, &npm_target).await?;
            } else {
                purge_paths(&self.config.node_folder, NODE_EXTRAS, reporter).await?;
            }
        }

        let version = version_query(&self.config.bin_dir.join("node"), "node").await?;
        reporter.success(&format!("node {version} installed"));

        Ok(())
    }

    /// Compile the fetched source tree in place, install it to the
    /// system prefix, then drop the no-longer-needed tree.
    async fn build_from_source(&self, reporter: &Reporter) -> Result<()> {
        let source_dir = &self.config.node_folder;
        let jobs = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);

        reporter.progress(&format!("Building node from {}", source_dir.display()));

        self.run_build_step("./configure", &[], reporter).await?;
        self.run_build_step("make", &[&format!("-j{jobs}")], reporter)
            .await?;
        self.run_build_step("make", &["install"], reporter).await?;

        reporter.progress(&format!("Removing source tree {}", source_dir.display()));
        tokio::fs::remove_dir_all(source_dir).await?;

        Ok(())
    }

    async fn run_build_step(
        &self,
        program: &str,
        args: &[&str],
        reporter: &Reporter,
    ) -> Result<()> {
        reporter.progress(&format!("Running {} {}", program, args.join(" ")));

        let status = Command::new(program)
            .args(args)
            .current_dir(&self.config.node_folder)
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| ProvisionError::Install(format!("failed to run {program}: {e}")))?;

        if !status.success() {
            return Err(ProvisionError::Install(format!(
                "{program} {} exited with {status}",
                args.join(" ")
            )));
        }

        Ok(())
    }
}
