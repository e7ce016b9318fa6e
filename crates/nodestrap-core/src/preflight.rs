//! Presence checks for the external tools a run depends on.
//!
//! Runs before any network activity. `gpg` is needed for signature
//! verification, `git` and `curl` for the ecosystems the installed tools
//! pull from. The native build toolchain is mandatory only when Node.js
//! is compiled from source; otherwise its absence is just a warning.

use crate::config::Config;
use crate::error::{ProvisionError, Result};

const REQUIRED_TOOLS: &[&str] = &["git", "curl", "gpg"];
const BUILD_TOOLS: &[&str] = &["python3", "make", "gcc"];

/// Check that every required external tool is on the PATH.
pub fn check(config: &Config) -> Result<()> {
    check_with(config, |tool| which::which(tool).is_ok())
}

/// Presence check against an arbitrary lookup, so tests can control
/// which tools appear available.
pub fn check_with<F>(config: &Config, available: F) -> Result<()>
where
    F: Fn(&str) -> bool,
{
    let mut missing = Vec::new();

    for tool in REQUIRED_TOOLS {
        if !available(tool) {
            missing.push(tool.to_string());
        }
    }

    for tool in BUILD_TOOLS {
        if available(tool) {
            continue;
        }
        if config.node_variant.is_from_source() {
            missing.push(tool.to_string());
        } else {
            log::warn!("{tool} not found; it is only required when building Node.js from source");
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ProvisionError::Dependency { missing })
    }
}
