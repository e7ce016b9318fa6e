pub mod archive;
pub mod config;
pub mod dist;
pub mod error;
pub mod fetch;
pub mod http;
pub mod orchestrator;
pub mod preflight;
pub mod report;
pub mod task;
pub mod verify;

pub use config::{Config, NodeVariant};
pub use dist::{DistSpec, VerifyMode};
pub use error::{ProvisionError, Result};
pub use fetch::Fetcher;
pub use http::{HttpClient, HttpClientConfig};
pub use orchestrator::Orchestrator;
pub use report::Reporter;
pub use task::{NodeTask, YarnTask};
