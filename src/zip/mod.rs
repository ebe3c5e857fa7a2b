//! ZIP archive parsing and extraction.
//!
//! This module reads an archive that is already fully in memory and
//! reconstructs its entries on disk.
//!
//! ## Architecture
//!
//! The pipeline runs leaf-first through these pieces:
//!
//! - [`cursor`]: bounds-checked little-endian reads over the archive buffer
//! - [`structures`]: ZIP format records (EOCD, central and local headers, AES extra field)
//! - [`parser`]: EOCD location, Central Directory walk, local header resolution,
//!   encryption classification
//! - [`crypto`]: WinZip AES key derivation, authentication and decryption
//! - [`decode`]: Stored/DEFLATE dispatch after decryption
//! - [`writer`]: path normalization and writing files and directories
//! - [`extractor`]: the high-level API tying it together, with bounded
//!   parallelism across entries
//!
//! ## ZIP Format Overview
//!
//! A ZIP file consists of:
//! 1. Local file headers and compressed data for each file
//! 2. Central Directory with metadata for all files
//! 3. End of Central Directory (EOCD) record at the end
//!
//! ## Supported Features
//!
//! - STORED (no compression) method
//! - DEFLATE compression method
//! - WinZip AES-256 (AE-2) encrypted entries, authenticated before use
//!
//! ## Limitations
//!
//! - No ZIP64 extensions
//! - No traditional PKWARE encryption, no AES-128/192
//! - No multi-disk archive support
//! - No BZIP2, LZMA, or other compression methods

pub mod crypto;
pub mod cursor;
pub mod decode;
pub mod extractor;
pub mod parser;
pub mod structures;
#[cfg(test)]
pub(crate) mod testutil;
pub mod writer;

pub use decode::{decode_payload, inflate};
pub use extractor::{
    EntryOutcome, EntryReport, ErrorPolicy, ExtractOptions, ExtractReport, OverwritePolicy,
    ZipExtractor,
};
pub use parser::{
    classify_encryption, locate_eocd, read_central_directory, resolve_local_header,
    walk_central_directory,
};
pub use structures::*;
pub use writer::{sanitize_entry_path, write_entry};
