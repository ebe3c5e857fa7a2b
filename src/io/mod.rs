mod http;
mod local;

pub use http::HttpRangeReader;
pub use local::LocalFileReader;

use async_trait::async_trait;

use crate::error::{Result, ZipError};

/// A place an archive can be loaded from in one piece.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// Total size of the archive in bytes
    fn size(&self) -> u64;

    /// Read the whole archive into memory
    async fn read_all(&self) -> Result<Vec<u8>>;
}

/// Convert a reported archive size into an allocation length.
fn buffer_len(size: u64) -> Result<usize> {
    usize::try_from(size).map_err(|_| {
        ZipError::Io(std::io::Error::other(format!(
            "archive of {size} bytes does not fit in memory"
        )))
    })
}
