//! Error types shared by the parser, the decoder and the extraction writer.

use thiserror::Error;

/// A Result type alias over [`ZipError`].
pub type Result<V> = std::result::Result<V, ZipError>;

/// Every failure the extraction pipeline can report.
///
/// Parsing and decoding failures are structural: nothing is retried and
/// nothing is silently recovered. Whole-archive callers decide whether a
/// failed entry aborts the run (see [`ErrorPolicy`](crate::ErrorPolicy)).
#[derive(Debug, Error)]
pub enum ZipError {
    #[error("malformed archive: {0}")]
    MalformedArchive(&'static str),
    #[error("unsupported compression method: {0}")]
    UnsupportedCompressionMethod(u16),
    #[error("unsupported encryption: {0}")]
    UnsupportedEncryption(&'static str),
    #[error("corrupt entry '{name}': {reason}")]
    CorruptEntry { name: String, reason: String },
    #[error("deflate stream error: {0}")]
    Decompression(#[source] std::io::Error),
    #[error("decryption failed: {0}")]
    Decryption(&'static str),
    #[error("entry is encrypted and no password was supplied")]
    PasswordRequired,
    #[error("refusing to extract unsafe path '{0}'")]
    UnsafePath(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ZipError {
    pub(crate) fn corrupt(name: &str, reason: impl Into<String>) -> Self {
        ZipError::CorruptEntry {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}
