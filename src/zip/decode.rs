//! Turning an entry's raw payload into its original bytes.

use std::borrow::Cow;
use std::io::Read;

use flate2::read::DeflateDecoder;
use tracing::debug;

use crate::error::{Result, ZipError};

use super::crypto;
use super::cursor::ByteCursor;
use super::structures::*;

/// Upper bound on what is reserved up front for inflated output.
const MAX_PREALLOCATION: usize = 1 << 20;

/// Inflate a raw DEFLATE stream.
///
/// Output is capped at `expected_length + 1` bytes so an oversized stream
/// shows up as a length mismatch instead of exhausting memory.
pub fn inflate(compressed: &[u8], expected_length: usize) -> Result<Vec<u8>> {
    let limit = (expected_length as u64).saturating_add(1);
    let mut decoder = DeflateDecoder::new(compressed).take(limit);

    let mut out = Vec::with_capacity(expected_length.min(MAX_PREALLOCATION));
    decoder
        .read_to_end(&mut out)
        .map_err(ZipError::Decompression)?;

    Ok(out)
}

/// Decode the payload of `entry`, whose local header is `header`.
///
/// AES entries are decrypted first with `password`, then dispatched on the
/// compression method found in their AES extra field. Plain entries use
/// the local header's method and have their CRC-32 checked.
pub fn decode_payload(
    buffer: &[u8],
    header: &LocalFileHeader<'_>,
    entry: &CentralDirectoryEntry,
    encryption: EncryptionKind,
    password: Option<&[u8]>,
) -> Result<Vec<u8>> {
    let payload = ByteCursor::at(buffer, header.payload_offset)?
        .read_bytes(entry.compressed_size as usize)?;

    let (method, data) = match encryption {
        EncryptionKind::None => {
            if entry.is_encrypted() {
                return Err(ZipError::UnsupportedEncryption(
                    if entry.compression_method_id == CompressionMethod::AES_MARKER {
                        "WinZip AES with stored CRC (AE-1)"
                    } else {
                        "traditional PKWARE encryption"
                    },
                ));
            }
            let method = CompressionMethod::from_u16(header.compression_method_id);
            (method, Cow::Borrowed(payload))
        }
        EncryptionKind::Aes => {
            let aes_field = AesExtraField::find(header.extra_field)?
                .ok_or(ZipError::MalformedArchive(
                    "AES entry without an AES extra field",
                ))?;
            let password = password.ok_or(ZipError::PasswordRequired)?;
            let plaintext = crypto::decrypt_entry(password, aes_field.strength, payload)?;
            (aes_field.compression_method, Cow::Owned(plaintext))
        }
    };

    debug!(name = %entry.name, ?method, ?encryption, "decoding entry");

    let expected = entry.uncompressed_size as usize;
    let decoded = match method {
        CompressionMethod::Stored => data.into_owned(),
        CompressionMethod::Deflate => inflate(&data, expected)?,
        CompressionMethod::Unsupported(id) => {
            return Err(ZipError::UnsupportedCompressionMethod(id));
        }
    };

    if decoded.len() != expected {
        return Err(ZipError::corrupt(
            &entry.name,
            format!("decoded {} bytes, expected {}", decoded.len(), expected),
        ));
    }

    if encryption == EncryptionKind::None {
        let crc = crc32fast::hash(&decoded);
        if crc != entry.crc32 {
            return Err(ZipError::corrupt(
                &entry.name,
                format!(
                    "crc32 {:#010x} does not match recorded {:#010x}",
                    crc, entry.crc32
                ),
            ));
        }
    }

    Ok(decoded)
}
