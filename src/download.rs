//! Archive download
//!
//! The extractor only needs "stream the body of a URL into a local file". That
//! capability is the [`Downloader`] trait so hosts (and tests) can plug in their
//! own transport; [`HttpDownloader`] is the reqwest-backed default.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::ZipConfig;
use crate::error::{ZipError, ZipResult};

/// Bound on establishing the connection; the body transfer itself is only
/// bounded when `downloadTimeoutSecs` is configured
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Streams a remote resource to disk
#[async_trait]
pub trait Downloader: Send + Sync {
    /// GET `url` with `headers` and write the body to `dest`.
    ///
    /// Any status other than 200 fails with [`ZipError::Download`].
    /// Returns the number of bytes written.
    async fn download(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        dest: &Path,
    ) -> ZipResult<u64>;
}

/// HTTP downloader that writes chunks as they arrive
#[derive(Debug, Clone)]
pub struct HttpDownloader {
    client: reqwest::Client,
}

impl HttpDownloader {
    pub fn new(config: &ZipConfig) -> ZipResult<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT);
        if let Some(limit) = config.download_timeout() {
            builder = builder.timeout(limit);
        }
        let client = builder
            .build()
            .map_err(|e| ZipError::Config(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn stream_to_file(&self, mut response: reqwest::Response, dest: &Path) -> ZipResult<u64> {
        let write_error =
            |e: std::io::Error| ZipError::DownloadTransport(format!("{}: {}", dest.display(), e));

        let mut file = File::create(dest).await.map_err(write_error)?;
        let mut written = 0u64;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk).await.map_err(write_error)?;
            written += chunk.len() as u64;
        }
        file.flush().await.map_err(write_error)?;
        Ok(written)
    }
}

#[async_trait]
impl Downloader for HttpDownloader {
    async fn download(
        &self,
        url: &str,
        headers: &HashMap<String, String>,
        dest: &Path,
    ) -> ZipResult<u64> {
        info!(url, dest = %dest.display(), "Downloading archive");

        let mut request = self.client.get(url);
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await?;
        let status = response.status();
        if status != reqwest::StatusCode::OK {
            warn!(url, status = status.as_u16(), "Download refused");
            return Err(ZipError::Download {
                status_code: status.as_u16(),
            });
        }

        match self.stream_to_file(response, dest).await {
            Ok(bytes) => {
                debug!(url, bytes, "Download finished");
                Ok(bytes)
            }
            Err(e) => {
                // Do not leave a truncated archive behind
                if let Err(remove_err) = tokio::fs::remove_file(dest).await {
                    debug!(dest = %dest.display(), error = %remove_err, "No partial download to remove");
                }
                Err(e)
            }
        }
    }
}
