//! Low-level ZIP archive parser.
//!
//! This module handles the binary parsing of ZIP file structures
//! from an in-memory archive buffer. Nothing here copies or mutates
//! the buffer; every structure is read through a [`ByteCursor`].
//!
//! ## Parsing Strategy
//!
//! ZIP files are designed to be read from the end:
//! 1. Find the End of Central Directory (EOCD) near the buffer's end
//! 2. Walk the Central Directory to get metadata for all entries
//! 3. For extraction, resolve each entry's Local File Header to find
//!    where its payload starts

use tracing::{debug, warn};

use crate::error::{Result, ZipError};

use super::cursor::ByteCursor;
use super::structures::*;

/// Maximum ZIP comment size allowed by the format (65535 bytes).
///
/// This limits the search area when looking for EOCD with a comment.
const MAX_COMMENT_SIZE: usize = 65535;

/// Find and parse the End of Central Directory record.
///
/// Scans backward from the end of `buffer` for the EOCD signature. The
/// first hit from the end (the rightmost one) wins, so trailing comments
/// are skipped without being interpreted.
///
/// # Errors
///
/// Returns [`ZipError::MalformedArchive`] if no complete record is found,
/// which covers non-ZIP input and archives truncated at the tail.
#[tracing::instrument(skip(buffer), fields(len = buffer.len()))]
pub fn locate_eocd(buffer: &[u8]) -> Result<EndOfCentralDirectory> {
    let Some(last_start) = buffer.len().checked_sub(EndOfCentralDirectory::SIZE) else {
        return Err(ZipError::MalformedArchive(
            "archive is too short to hold an end of central directory record",
        ));
    };
    let first_start = last_start.saturating_sub(MAX_COMMENT_SIZE);

    for offset in (first_start..=last_start).rev() {
        if &buffer[offset..offset + 4] == EndOfCentralDirectory::SIGNATURE {
            let eocd = EndOfCentralDirectory::from_bytes(buffer, offset)?;
            debug!(
                offset,
                entries = eocd.entry_count,
                cd_offset = eocd.central_directory_offset,
                cd_size = eocd.central_directory_size,
                "found end of central directory"
            );
            return Ok(eocd);
        }
    }

    Err(ZipError::MalformedArchive(
        "end of central directory signature not found",
    ))
}

/// Lazy walk over the Central Directory, in on-disk order.
///
/// Yields one [`CentralDirectoryEntry`] per record until the cursor reaches
/// the end recorded in the EOCD. After the first error the iterator is
/// fused and yields nothing more.
pub struct CentralDirectoryIter<'a> {
    buffer: &'a [u8],
    cursor: ByteCursor<'a>,
    end: usize,
    failed: bool,
}

impl<'a> Iterator for CentralDirectoryIter<'a> {
    type Item = Result<CentralDirectoryEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.cursor.position() >= self.end {
            return None;
        }

        let entry = self.parse_cdfh();
        if entry.is_err() {
            self.failed = true;
        }
        Some(entry)
    }
}

impl<'a> CentralDirectoryIter<'a> {
    /// Parse a Central Directory File Header at the cursor.
    fn parse_cdfh(&mut self) -> Result<CentralDirectoryEntry> {
        let cursor = &mut self.cursor;
        let start = cursor.position();
        if start + CDFH_MIN_SIZE > self.end {
            return Err(ZipError::MalformedArchive(
                "central directory entry extends past its recorded size",
            ));
        }

        cursor.expect_signature(
            CDFH_SIGNATURE,
            "invalid central directory file header signature",
        )?;

        let version_made_by = cursor.read_u16()?;
        let _version_needed = cursor.read_u16()?;
        let general_purpose_flags = cursor.read_u16()?;
        let compression_method_id = cursor.read_u16()?;
        let last_mod_time = cursor.read_u16()?;
        let last_mod_date = cursor.read_u16()?;
        let crc32 = cursor.read_u32()?;
        let compressed_size = cursor.read_u32()?;
        let uncompressed_size = cursor.read_u32()?;
        let file_name_length = cursor.read_u16()?;
        let extra_field_length = cursor.read_u16()?;
        let file_comment_length = cursor.read_u16()?;
        let _disk_number_start = cursor.read_u16()?;
        let _internal_attrs = cursor.read_u16()?;
        let external_attributes = cursor.read_u32()?;
        let local_header_offset = cursor.read_u32()?;

        // Use lossy conversion to handle non-UTF8 filenames gracefully
        let name_bytes = cursor.read_bytes(file_name_length as usize)?;
        let name = String::from_utf8_lossy(name_bytes).into_owned();

        cursor.skip(extra_field_length as usize)?;
        cursor.skip(file_comment_length as usize)?;

        if cursor.position() > self.end {
            return Err(ZipError::MalformedArchive(
                "central directory entry extends past its recorded size",
            ));
        }
        if local_header_offset as usize >= self.buffer.len() {
            return Err(ZipError::MalformedArchive(
                "local header offset lies outside the archive",
            ));
        }

        debug!(
            name = %name,
            offset = start,
            method = compression_method_id,
            "central directory entry"
        );

        Ok(CentralDirectoryEntry {
            name,
            version_made_by,
            general_purpose_flags,
            compression_method_id,
            last_mod_time,
            last_mod_date,
            crc32,
            compressed_size,
            uncompressed_size,
            external_attributes,
            local_header_offset,
        })
    }
}

/// Start walking the Central Directory described by `eocd`.
pub fn walk_central_directory<'a>(
    buffer: &'a [u8],
    eocd: &EndOfCentralDirectory,
) -> Result<CentralDirectoryIter<'a>> {
    let end = eocd.central_directory_end();
    if end > buffer.len() {
        return Err(ZipError::MalformedArchive(
            "central directory extends past end of archive",
        ));
    }

    Ok(CentralDirectoryIter {
        buffer,
        cursor: ByteCursor::at(buffer, eocd.central_directory_offset as usize)?,
        end,
        failed: false,
    })
}

/// Walk the whole Central Directory into a vector.
///
/// A count that disagrees with the EOCD is logged rather than rejected;
/// the walk itself is bounded by the recorded directory size.
#[tracing::instrument(skip_all)]
pub fn read_central_directory(
    buffer: &[u8],
    eocd: &EndOfCentralDirectory,
) -> Result<Vec<CentralDirectoryEntry>> {
    let entries: Vec<_> = walk_central_directory(buffer, eocd)?.collect::<Result<_>>()?;

    if entries.len() != eocd.entry_count as usize {
        warn!(
            expected = eocd.entry_count,
            found = entries.len(),
            "central directory entry count disagrees with end of central directory record"
        );
    }

    Ok(entries)
}

/// Resolve the Local File Header for `entry`.
///
/// The payload offset is computed from the local header's own name and
/// extra field lengths. These can differ from the Central Directory's,
/// so the local header is the only trustworthy source.
pub fn resolve_local_header<'a>(
    buffer: &'a [u8],
    entry: &CentralDirectoryEntry,
) -> Result<LocalFileHeader<'a>> {
    let mut cursor = ByteCursor::at(buffer, entry.local_header_offset as usize)?;
    cursor.expect_signature(LFH_SIGNATURE, "invalid local file header signature")?;

    let _version_needed = cursor.read_u16()?;
    let general_purpose_flags = cursor.read_u16()?;
    let compression_method_id = cursor.read_u16()?;
    // time, date, crc and both sizes: the Central Directory is authoritative
    cursor.skip(16)?;
    let file_name_length = cursor.read_u16()?;
    let extra_field_length = cursor.read_u16()?;

    let name_bytes = cursor.read_bytes(file_name_length as usize)?;
    let name = String::from_utf8_lossy(name_bytes).into_owned();
    let extra_field = cursor.read_bytes(extra_field_length as usize)?;

    if name != entry.name {
        debug!(
            local = %name,
            central = %entry.name,
            "local header name differs from central directory"
        );
    }

    Ok(LocalFileHeader {
        general_purpose_flags,
        compression_method_id,
        name,
        extra_field,
        payload_offset: cursor.position(),
    })
}

/// Decide whether `entry` is WinZip AES protected.
///
/// AES entries set the encrypted flag, use the reserved method id 99 and
/// store a zero CRC. Anything else is treated as unencrypted here.
pub fn classify_encryption(entry: &CentralDirectoryEntry) -> EncryptionKind {
    if entry.is_encrypted()
        && entry.compression_method_id == CompressionMethod::AES_MARKER
        && entry.crc32 == 0
    {
        EncryptionKind::Aes
    } else {
        EncryptionKind::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::zip::testutil::{ArchiveBuilder, EntrySpec};

    #[test]
    fn eocd_in_last_22_bytes() {
        let archive = ArchiveBuilder::new().stored("hello.txt", b"hi").build();
        let eocd = locate_eocd(&archive).unwrap();

        assert_eq!(eocd.offset, archive.len() - EndOfCentralDirectory::SIZE);
        assert_eq!(eocd.entry_count, 1);
        assert_eq!(eocd.central_directory_end(), eocd.offset);
    }

    #[test]
    fn eocd_before_comment() {
        let archive = ArchiveBuilder::new()
            .stored("a.txt", b"a")
            .comment(b"a trailing comment")
            .build();
        let eocd = locate_eocd(&archive).unwrap();

        assert_eq!(eocd.comment_len, 18);
        assert_eq!(
            eocd.offset,
            archive.len() - EndOfCentralDirectory::SIZE - 18
        );
    }

    #[test]
    fn rightmost_signature_wins() {
        // the first entry's payload contains a complete but bogus EOCD
        let mut fake = b"PK\x05\x06".to_vec();
        fake.extend_from_slice(&[0u8; 18]);
        let archive = ArchiveBuilder::new().stored("decoy.bin", &fake).build();

        let eocd = locate_eocd(&archive).unwrap();
        assert_eq!(eocd.offset, archive.len() - EndOfCentralDirectory::SIZE);
        assert_eq!(eocd.entry_count, 1);
    }

    #[test]
    fn truncated_archive_is_malformed() {
        let archive = ArchiveBuilder::new().stored("hello.txt", b"hi").build();
        let truncated = &archive[..archive.len() - 5];

        assert!(matches!(
            locate_eocd(truncated),
            Err(ZipError::MalformedArchive(_))
        ));
        assert!(matches!(
            locate_eocd(&[]),
            Err(ZipError::MalformedArchive(_))
        ));
        assert!(matches!(
            locate_eocd(&[0u8; 100]),
            Err(ZipError::MalformedArchive(_))
        ));
    }

    #[test]
    fn eocd_pointing_past_itself_is_malformed() {
        let mut archive = ArchiveBuilder::new().stored("hello.txt", b"hi").build();
        let at = archive.len() - EndOfCentralDirectory::SIZE + 16;
        archive[at..at + 4].copy_from_slice(&0xFFFF_0000u32.to_le_bytes());

        assert!(matches!(
            locate_eocd(&archive),
            Err(ZipError::MalformedArchive(_))
        ));
    }

    #[test]
    fn walk_yields_entry_count_entries_in_order() {
        let archive = ArchiveBuilder::new()
            .stored("one.txt", b"1")
            .directory("dir/")
            .deflated("dir/two.txt", b"two two two two")
            .build();
        let eocd = locate_eocd(&archive).unwrap();

        let entries: Vec<_> = walk_central_directory(&archive, &eocd)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        assert_eq!(entries.len(), eocd.entry_count as usize);
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["one.txt", "dir/", "dir/two.txt"]);
        assert_eq!(entries[2].compression_method(), CompressionMethod::Deflate);
        assert_eq!(entries[2].uncompressed_size, 15);
        assert!(entries[1].is_directory());
    }

    #[test]
    fn walk_is_restartable() {
        let archive = ArchiveBuilder::new()
            .stored("a", b"a")
            .stored("b", b"b")
            .build();
        let eocd = locate_eocd(&archive).unwrap();

        let first = read_central_directory(&archive, &eocd).unwrap();
        let second = read_central_directory(&archive, &eocd).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn empty_archive_has_no_entries() {
        let archive = ArchiveBuilder::new().build();
        assert_eq!(archive.len(), EndOfCentralDirectory::SIZE);

        let eocd = locate_eocd(&archive).unwrap();
        assert_eq!(eocd.entry_count, 0);
        assert!(read_central_directory(&archive, &eocd).unwrap().is_empty());
    }

    #[test]
    fn corrupted_central_signature_stops_the_walk() {
        let mut archive = ArchiveBuilder::new()
            .stored("a", b"a")
            .stored("b", b"b")
            .build();
        let eocd = locate_eocd(&archive).unwrap();
        let cd = eocd.central_directory_offset as usize;
        archive[cd + 2] = 0x09;

        let mut walk = walk_central_directory(&archive, &eocd).unwrap();
        assert!(matches!(
            walk.next(),
            Some(Err(ZipError::MalformedArchive(_)))
        ));
        assert!(walk.next().is_none());
    }

    #[test]
    fn name_length_past_directory_end_is_malformed() {
        let mut archive = ArchiveBuilder::new().stored("a", b"a").build();
        let eocd = locate_eocd(&archive).unwrap();
        let cd = eocd.central_directory_offset as usize;
        archive[cd + 28..cd + 30].copy_from_slice(&500u16.to_le_bytes());

        assert!(matches!(
            read_central_directory(&archive, &eocd),
            Err(ZipError::MalformedArchive(_))
        ));
    }

    #[test]
    fn local_header_offset_outside_archive_is_malformed() {
        let mut archive = ArchiveBuilder::new().stored("a", b"a").build();
        let eocd = locate_eocd(&archive).unwrap();
        let cd = eocd.central_directory_offset as usize;
        archive[cd + 42..cd + 46].copy_from_slice(&u32::MAX.to_le_bytes());

        assert!(read_central_directory(&archive, &eocd).is_err());
    }

    #[test]
    fn payload_offset_uses_local_lengths() {
        let spec = EntrySpec::stored("short", b"payload")
            .local_name("a-much-longer-local-name")
            .local_extra(vec![0xAA; 9]);
        let archive = ArchiveBuilder::new().entry(spec).build();
        let eocd = locate_eocd(&archive).unwrap();
        let entries = read_central_directory(&archive, &eocd).unwrap();

        let header = resolve_local_header(&archive, &entries[0]).unwrap();
        assert_eq!(header.name, "a-much-longer-local-name");
        assert_eq!(header.extra_field, &[0xAA; 9]);
        assert_eq!(header.payload_offset, LFH_SIZE + 24 + 9);
        assert_eq!(
            &archive[header.payload_offset..header.payload_offset + 7],
            b"payload"
        );
    }

    #[test]
    fn bad_local_signature_is_malformed() {
        let mut archive = ArchiveBuilder::new().stored("a", b"a").build();
        let eocd = locate_eocd(&archive).unwrap();
        let entries = read_central_directory(&archive, &eocd).unwrap();
        archive[0] = b'X';

        assert!(matches!(
            resolve_local_header(&archive, &entries[0]),
            Err(ZipError::MalformedArchive(_))
        ));
    }

    fn aes_candidate() -> CentralDirectoryEntry {
        CentralDirectoryEntry {
            name: "secret".to_string(),
            version_made_by: 51,
            general_purpose_flags: FLAG_ENCRYPTED,
            compression_method_id: 99,
            last_mod_time: 0,
            last_mod_date: 0,
            crc32: 0,
            compressed_size: 40,
            uncompressed_size: 10,
            external_attributes: 0,
            local_header_offset: 0,
        }
    }

    #[test]
    fn classify_aes_triad() {
        assert_eq!(classify_encryption(&aes_candidate()), EncryptionKind::Aes);
    }

    #[test]
    fn classify_without_encrypted_flag() {
        let mut entry = aes_candidate();
        entry.general_purpose_flags = 0x0008;
        assert_eq!(classify_encryption(&entry), EncryptionKind::None);
    }

    #[test]
    fn classify_without_aes_method() {
        let mut entry = aes_candidate();
        entry.compression_method_id = 8;
        assert_eq!(classify_encryption(&entry), EncryptionKind::None);
    }

    #[test]
    fn classify_with_nonzero_crc() {
        let mut entry = aes_candidate();
        entry.crc32 = 0xDEAD_BEEF;
        assert_eq!(classify_encryption(&entry), EncryptionKind::None);
    }
}
