//! nodestrap - install Node.js and Yarn into a container image.
//!
//! Configuration comes from the environment (`NODE_VERSION`,
//! `YARN_VERSION`, ...); every key can also be overridden on the
//! command line, which is convenient in `RUN` lines.

use anyhow::Result;
use clap::Parser;
use console::style;

use nodestrap_core::{preflight, Config, Orchestrator};

#[derive(Parser, Debug)]
#[command(name = "nodestrap", version, about = "Install Node.js and Yarn into a container image")]
struct Cli {
    /// Node.js version to install (env: NODE_VERSION)
    #[arg(long)]
    node_version: Option<String>,

    /// Node.js distribution mirror (env: NODE_MIRROR)
    #[arg(long)]
    node_mirror: Option<String>,

    /// Node.js install folder (env: NODE_FOLDER)
    #[arg(long)]
    node_folder: Option<String>,

    /// Platform variant, or "make" to build from source (env: NODE_VARIANT)
    #[arg(long)]
    node_variant: Option<String>,

    /// Yarn version to install (env: YARN_VERSION)
    #[arg(long)]
    yarn_version: Option<String>,

    /// Yarn release mirror (env: YARN_MIRROR)
    #[arg(long)]
    yarn_mirror: Option<String>,

    /// Yarn install folder (env: YARN_FOLDER)
    #[arg(long)]
    yarn_folder: Option<String>,

    /// Keep docs, licenses and the bundled npm (env: KEEP_EXTRAS)
    #[arg(long)]
    keep_extras: bool,

    /// Increase log verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    /// Environment snapshot with command-line overrides applied.
    fn vars(&self) -> Vec<(String, String)> {
        let mut vars: Vec<(String, String)> = std::env::vars().collect();

        let overrides = [
            ("NODE_VERSION", self.node_version.as_deref()),
            ("NODE_MIRROR", self.node_mirror.as_deref()),
            ("NODE_FOLDER", self.node_folder.as_deref()),
            ("NODE_VARIANT", self.node_variant.as_deref()),
            ("YARN_VERSION", self.yarn_version.as_deref()),
            ("YARN_MIRROR", self.yarn_mirror.as_deref()),
            ("YARN_FOLDER", self.yarn_folder.as_deref()),
            (
                "KEEP_EXTRAS",
                if self.keep_extras { Some("true") } else { None },
            ),
        ];

        for (key, value) in overrides {
            if let Some(value) = value {
                vars.retain(|(k, _)| k != key);
                vars.push((key.to_string(), value.to_string()));
            }
        }

        vars
    }
}

async fn run(cli: Cli) -> Result<()> {
    // Config and tool checks happen before any network activity
    let config = Config::from_env(cli.vars())?;
    preflight::check(&config)?;

    log::debug!("Configuration: {config:?}");

    let orchestrator = Orchestrator::new(config)?;
    orchestrator.run().await?;

    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => log::LevelFilter::Info,
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("{} {e}", style("Error:").red().bold());
        std::process::exit(1);
    }
}
