use async_trait::async_trait;
use reqwest::Client;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

use super::{ArchiveSource, buffer_len};
use crate::error::{Result, ZipError};

/// Bytes requested per Range request while downloading an archive.
const CHUNK_SIZE: u64 = 4 * 1024 * 1024;

fn http_error(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> ZipError {
    ZipError::Io(std::io::Error::other(err))
}

/// Remote archive fetched with HTTP Range requests
pub struct HttpRangeReader {
    client: Client,
    url: String,
    size: u64,
    transferred_bytes: AtomicU64,
    max_retry: u32,
}

impl HttpRangeReader {
    /// Create a new HTTP Range reader
    ///
    /// This will send a HEAD request to verify Range support and get file size
    pub async fn new(url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(http_error)?;

        // Send HEAD request to check capabilities
        let resp = client.head(&url).send().await.map_err(http_error)?;

        if !resp.status().is_success() {
            return Err(http_error(format!(
                "HTTP request failed with status: {}",
                resp.status()
            )));
        }

        // Check if server supports Range requests
        let accept_ranges = resp
            .headers()
            .get("accept-ranges")
            .and_then(|v| v.to_str().ok())
            .unwrap_or("none");

        if !accept_ranges.contains("bytes") {
            return Err(http_error("Remote server does not support Range requests"));
        }

        // Get file size from Content-Length
        let size = resp
            .headers()
            .get("content-length")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| http_error("Remote server did not return Content-Length"))?;

        debug!(url = %url, size, "remote archive supports range requests");

        Ok(Self {
            client,
            url,
            size,
            transferred_bytes: AtomicU64::new(0),
            max_retry: 10,
        })
    }

    /// Get total bytes transferred from network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    /// Fill `buf` with the bytes starting at `offset`, retrying dropped connections.
    async fn fetch_range(&self, offset: u64, buf: &mut [u8]) -> Result<()> {
        let end = offset + buf.len() as u64 - 1;
        let expected_size = buf.len();

        let mut received = 0;
        let mut retry_count = 0;

        while received < expected_size {
            let current_start = offset + received as u64;
            let range = format!("bytes={}-{}", current_start, end);

            let result = self
                .client
                .get(&self.url)
                .header("Range", &range)
                .send()
                .await;

            match result {
                Ok(resp) => {
                    if resp.status() != reqwest::StatusCode::PARTIAL_CONTENT {
                        return Err(http_error(format!(
                            "HTTP request failed with status: {}",
                            resp.status()
                        )));
                    }

                    let bytes = resp.bytes().await.map_err(http_error)?;
                    if bytes.is_empty() {
                        return Err(http_error("Remote server returned an empty range"));
                    }
                    let chunk_len = bytes.len().min(expected_size - received);
                    buf[received..received + chunk_len].copy_from_slice(&bytes[..chunk_len]);
                    received += chunk_len;

                    self.transferred_bytes
                        .fetch_add(chunk_len as u64, Ordering::Relaxed);
                }
                Err(e) if e.is_timeout() || e.is_connect() => {
                    retry_count += 1;
                    if retry_count >= self.max_retry {
                        return Err(http_error("Max retries exceeded"));
                    }
                    warn!(
                        retry = retry_count,
                        max = self.max_retry,
                        error = %e,
                        "connection error, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(500 * retry_count as u64)).await;
                }
                Err(e) => return Err(http_error(e)),
            }
        }

        Ok(())
    }
}

#[async_trait]
impl ArchiveSource for HttpRangeReader {
    fn size(&self) -> u64 {
        self.size
    }

    async fn read_all(&self) -> Result<Vec<u8>> {
        let mut data = vec![0u8; buffer_len(self.size)?];

        let mut offset = 0u64;
        for chunk in data.chunks_mut(CHUNK_SIZE as usize) {
            self.fetch_range(offset, chunk).await?;
            offset += chunk.len() as u64;
        }

        debug!(url = %self.url, bytes = offset, "downloaded archive");
        Ok(data)
    }
}
