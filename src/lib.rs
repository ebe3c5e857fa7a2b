//! # pkextract
//!
//! A ZIP extractor that works on archives held entirely in memory.
//!
//! The archive is located from its End of Central Directory record, the
//! Central Directory is walked once, and then each entry is resolved,
//! decrypted if needed, decoded and written under an output root. Entries
//! are independent, so extraction fans out across a bounded set of tasks.
//!
//! ## Features
//!
//! - Extract ZIP files from the local filesystem or HTTP/HTTPS URLs
//! - STORED and DEFLATE entries, checked against their CRC-32
//! - WinZip AES-256 encrypted entries, authenticated before they are written
//! - Path traversal protection for untrusted archives
//! - Selective extraction with glob pattern matching in the CLI
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//! use pkextract::{ArchiveSource, ExtractOptions, LocalFileReader, ZipExtractor};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let data = LocalFileReader::new(Path::new("archive.zip")).await?.read_all().await?;
//!
//!     let extractor = ZipExtractor::new(data)?
//!         .with_options(ExtractOptions::default().password("secret"));
//!
//!     for entry in extractor.entries() {
//!         println!("{}", entry.name);
//!     }
//!
//!     let report = extractor.extract_all(Path::new("out")).await?;
//!     println!("extracted {} files", report.extracted());
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod error;
pub mod io;
pub mod zip;

pub use cli::Cli;
pub use error::{Result, ZipError};
pub use io::{ArchiveSource, HttpRangeReader, LocalFileReader};
pub use zip::{
    CentralDirectoryEntry, EntryOutcome, ErrorPolicy, ExtractOptions, ExtractReport,
    OverwritePolicy, ZipExtractor,
};
