//! HTTP client for distribution downloads.
//!
//! Thin wrapper around `reqwest` with connection/read timeouts, a custom
//! User-Agent and streamed downloads to disk. Deliberately single-shot:
//! a failed download is a fatal condition for the whole run, so there is
//! no retry logic here.

use reqwest::Client;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::{ProvisionError, Result};

const DEFAULT_USER_AGENT: &str = concat!("nodestrap/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

pub struct HttpClient {
    client: Client,
    user_agent: String,
}

impl HttpClient {
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .build()?;

        Ok(Self {
            client,
            user_agent: config.user_agent,
        })
    }

    /// Stream a URL into a file. The response body is written chunk by
    /// chunk so large archives never sit fully in memory.
    pub async fn download(&self, url: &str, dest: &Path) -> Result<()> {
        let response = self.client.get(url).send().await.map_err(|e| {
            ProvisionError::Download {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProvisionError::Download {
                url: url.to_string(),
                reason: format!("HTTP {status}"),
            });
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = File::create(dest).await?;
        let mut stream = response.bytes_stream();

        use futures_util::StreamExt;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| ProvisionError::Download {
                url: url.to_string(),
                reason: e.to_string(),
            })?;
            file.write_all(&chunk).await?;
        }

        file.flush().await?;

        Ok(())
    }

    /// Fetch a URL into memory. Used for small payloads like public keys.
    pub async fn download_bytes(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await.map_err(|e| {
            ProvisionError::Download {
                url: url.to_string(),
                reason: e.to_string(),
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProvisionError::Download {
                url: url.to_string(),
                reason: format!("HTTP {status}"),
            });
        }

        let bytes = response.bytes().await?;
        Ok(bytes.to_vec())
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}
