//! Immutable run configuration, built once at startup.
//!
//! Every setting comes from an explicit key/value snapshot taken by the
//! caller (usually the process environment). No other component reads
//! the ambient environment.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::error::{ProvisionError, Result};

/// Default Node.js distribution mirror
pub const DEFAULT_NODE_MIRROR: &str = "https://nodejs.org/dist";
/// Default Yarn release mirror
pub const DEFAULT_YARN_MIRROR: &str = "https://github.com/yarnpkg/yarn/releases/download";
/// Default Node.js install folder
pub const DEFAULT_NODE_FOLDER: &str = "/usr/local/lib/node";
/// Default Yarn install folder
pub const DEFAULT_YARN_FOLDER: &str = "/usr/local/lib/yarn";
/// Default platform variant for Node.js binary archives
pub const DEFAULT_NODE_VARIANT: &str = "linux-x64";
/// System binary directory where executables are linked
pub const DEFAULT_BIN_DIR: &str = "/usr/local/bin";
/// Shell initialization file extended with Yarn's global bin dir
pub const DEFAULT_PROFILE_PATH: &str = "/etc/profile";

/// How the Node.js distribution is obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeVariant {
    /// Prebuilt binary archive for a platform triple (e.g. `linux-x64`)
    Binary(String),
    /// Source archive, compiled with the native toolchain
    FromSource,
}

impl NodeVariant {
    pub fn from_str(s: &str) -> Self {
        if s == "make" {
            NodeVariant::FromSource
        } else {
            NodeVariant::Binary(s.to_string())
        }
    }

    pub fn is_from_source(&self) -> bool {
        matches!(self, NodeVariant::FromSource)
    }
}

/// Run configuration, immutable after construction
#[derive(Debug, Clone)]
pub struct Config {
    pub node_version: String,
    pub node_mirror: String,
    pub node_folder: PathBuf,
    pub node_variant: NodeVariant,
    pub yarn_version: String,
    pub yarn_mirror: String,
    pub yarn_folder: PathBuf,
    pub keep_extras: bool,
    /// Directory on the system path where executables are linked
    pub bin_dir: PathBuf,
    /// Shell initialization file appended to by the Yarn install phase
    pub profile_path: PathBuf,
}

impl Config {
    /// Build a configuration from an environment snapshot.
    ///
    /// Every missing required key is collected so the diagnostic names
    /// all of them at once.
    pub fn from_env<I, K, V>(vars: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let mut missing = Vec::new();

        let node_version = match vars.get("NODE_VERSION").filter(|v| !v.is_empty()) {
            Some(v) => v.clone(),
            None => {
                missing.push("NODE_VERSION".to_string());
                String::new()
            }
        };

        let yarn_version = match vars.get("YARN_VERSION").filter(|v| !v.is_empty()) {
            Some(v) => v.clone(),
            None => {
                missing.push("YARN_VERSION".to_string());
                String::new()
            }
        };

        if !missing.is_empty() {
            return Err(ProvisionError::Config { missing });
        }

        let get_or = |key: &str, default: &str| -> String {
            vars.get(key)
                .filter(|v| !v.is_empty())
                .cloned()
                .unwrap_or_else(|| default.to_string())
        };

        Ok(Self {
            node_version,
            node_mirror: get_or("NODE_MIRROR", DEFAULT_NODE_MIRROR),
            node_folder: PathBuf::from(get_or("NODE_FOLDER", DEFAULT_NODE_FOLDER)),
            node_variant: NodeVariant::from_str(&get_or("NODE_VARIANT", DEFAULT_NODE_VARIANT)),
            yarn_version,
            yarn_mirror: get_or("YARN_MIRROR", DEFAULT_YARN_MIRROR),
            yarn_folder: PathBuf::from(get_or("YARN_FOLDER", DEFAULT_YARN_FOLDER)),
            keep_extras: parse_bool(&get_or("KEEP_EXTRAS", "false")),
            bin_dir: PathBuf::from(DEFAULT_BIN_DIR),
            profile_path: PathBuf::from(DEFAULT_PROFILE_PATH),
        })
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "1" | "true" | "yes")
}
