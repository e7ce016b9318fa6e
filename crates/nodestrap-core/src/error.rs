use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProvisionError {
    // Configuration errors
    #[error("Missing required configuration: {}", .missing.join(", "))]
    Config { missing: Vec<String> },

    // Dependency errors
    #[error("Missing required tools: {}", .missing.join(", "))]
    Dependency { missing: Vec<String> },

    // Precondition errors
    #[error("Install target already exists: {path}")]
    Precondition { path: String },

    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    // Download errors
    #[error("Download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    // Integrity errors
    #[error("Integrity check failed for {artifact}: {reason}")]
    Integrity { artifact: String, reason: String },

    // Extraction errors
    #[error("Extraction failed: {0}")]
    Extract(String),

    // Installation errors
    #[error("Installation failed: {0}")]
    Install(String),

    // Post-install verification errors
    #[error("{tool} is not properly installed: {reason}")]
    PostInstall { tool: String, reason: String },

    // Background task errors
    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ProvisionError>;
