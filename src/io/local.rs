use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::{ArchiveSource, buffer_len};
use crate::error::Result;

/// Archive stored on the local filesystem
pub struct LocalFileReader {
    path: PathBuf,
    size: u64,
}

impl LocalFileReader {
    /// Fails with [`ZipError::Io`](crate::ZipError::Io) if the path is missing or unreadable.
    pub async fn new(path: &Path) -> Result<Self> {
        let size = fs::metadata(path).await?.len();
        Ok(Self {
            path: path.to_path_buf(),
            size,
        })
    }
}

#[async_trait]
impl ArchiveSource for LocalFileReader {
    fn size(&self) -> u64 {
        self.size
    }

    async fn read_all(&self) -> Result<Vec<u8>> {
        buffer_len(self.size)?;
        let data = fs::read(&self.path).await?;
        debug!(
            path = %self.path.display(),
            bytes = data.len(),
            "read archive"
        );
        Ok(data)
    }
}
