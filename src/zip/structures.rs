use crate::error::{Result, ZipError};

use super::cursor::ByteCursor;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unsupported(u16),
}

impl CompressionMethod {
    /// Method id PKWARE reserves to mark WinZip AES entries.
    pub const AES_MARKER: u16 = 99;

    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unsupported(value),
        }
    }

    pub fn as_u16(&self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflate => 8,
            CompressionMethod::Unsupported(v) => *v,
        }
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndOfCentralDirectory {
    pub central_directory_offset: u32,
    pub central_directory_size: u32,
    pub entry_count: u16,
    pub comment_len: u16,
    /// Where the record itself starts in the archive.
    pub offset: usize,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    /// Parse the record starting at `offset`.
    pub fn from_bytes(data: &[u8], offset: usize) -> Result<Self> {
        let mut cursor = ByteCursor::at(data, offset)?;
        cursor.expect_signature(
            Self::SIGNATURE,
            "invalid end of central directory signature",
        )?;

        let _disk_number = cursor.read_u16()?;
        let _disk_with_cd = cursor.read_u16()?;
        let _disk_entries = cursor.read_u16()?;
        let entry_count = cursor.read_u16()?;
        let central_directory_size = cursor.read_u32()?;
        let central_directory_offset = cursor.read_u32()?;
        let comment_len = cursor.read_u16()?;

        let eocd = Self {
            central_directory_offset,
            central_directory_size,
            entry_count,
            comment_len,
            offset,
        };

        if eocd.central_directory_end() > offset {
            return Err(ZipError::MalformedArchive(
                "central directory overlaps end of central directory record",
            ));
        }

        Ok(eocd)
    }

    /// Offset one past the last Central Directory byte.
    pub fn central_directory_end(&self) -> usize {
        (self.central_directory_offset as usize)
            .saturating_add(self.central_directory_size as usize)
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_MIN_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// General purpose flag bit 0: the entry is encrypted.
pub const FLAG_ENCRYPTED: u16 = 0x0001;

const HOST_UNIX: u8 = 3;
const UNIX_FILE_TYPE_MASK: u32 = 0o170000;
const UNIX_REGULAR_FILE: u32 = 0o100000;

/// One Central Directory record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CentralDirectoryEntry {
    pub name: String,
    pub version_made_by: u16,
    pub general_purpose_flags: u16,
    pub compression_method_id: u16,
    pub last_mod_time: u16,
    pub last_mod_date: u16,
    pub crc32: u32,
    pub compressed_size: u32,
    pub uncompressed_size: u32,
    pub external_attributes: u32,
    pub local_header_offset: u32,
}

impl CentralDirectoryEntry {
    pub fn compression_method(&self) -> CompressionMethod {
        CompressionMethod::from_u16(self.compression_method_id)
    }

    pub fn is_encrypted(&self) -> bool {
        self.general_purpose_flags & FLAG_ENCRYPTED != 0
    }

    /// Directory entries carry no payload at all.
    ///
    /// Unix zippers also write empty regular files with both sizes zero, so
    /// an explicit regular-file mode in the external attributes wins.
    pub fn is_directory(&self) -> bool {
        self.compressed_size == 0 && self.uncompressed_size == 0 && !self.is_unix_regular_file()
    }

    fn is_unix_regular_file(&self) -> bool {
        let host = (self.version_made_by >> 8) as u8;
        let mode = self.external_attributes >> 16;
        host == HOST_UNIX && mode & UNIX_FILE_TYPE_MASK == UNIX_REGULAR_FILE
    }

    /// Parse modification date to (year, month, day)
    pub fn mod_date(&self) -> (u16, u8, u8) {
        let day = (self.last_mod_date & 0x1F) as u8;
        let month = ((self.last_mod_date >> 5) & 0x0F) as u8;
        let year = ((self.last_mod_date >> 9) & 0x7F) + 1980;
        (year, month, day)
    }

    /// Parse modification time to (hour, minute, second)
    pub fn mod_time(&self) -> (u8, u8, u8) {
        let second = ((self.last_mod_time & 0x1F) * 2) as u8;
        let minute = ((self.last_mod_time >> 5) & 0x3F) as u8;
        let hour = ((self.last_mod_time >> 11) & 0x1F) as u8;
        (hour, minute, second)
    }
}

/// Local File Header fields needed to reach an entry's payload.
///
/// Resolved on demand and never stored; sizes always come from the
/// Central Directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFileHeader<'a> {
    pub general_purpose_flags: u16,
    pub compression_method_id: u16,
    pub name: String,
    pub extra_field: &'a [u8],
    pub payload_offset: usize,
}

/// How an entry's payload is protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncryptionKind {
    None,
    Aes,
}

/// WinZip AES key strength.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AesStrength {
    Aes128,
    Aes192,
    Aes256,
}

impl AesStrength {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(AesStrength::Aes128),
            2 => Some(AesStrength::Aes192),
            3 => Some(AesStrength::Aes256),
            _ => None,
        }
    }

    pub fn key_len(&self) -> usize {
        match self {
            AesStrength::Aes128 => 16,
            AesStrength::Aes192 => 24,
            AesStrength::Aes256 => 32,
        }
    }

    pub fn salt_len(&self) -> usize {
        self.key_len() / 2
    }
}

/// The 0x9901 extra field record WinZip writes for AES entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AesExtraField {
    pub vendor_version: u16,
    pub strength: AesStrength,
    /// The real compression method; the header field holds the AES marker.
    pub compression_method: CompressionMethod,
}

impl AesExtraField {
    pub const HEADER_ID: u16 = 0x9901;
    const VENDOR_ID: &'static [u8] = b"AE";
    const DATA_SIZE: u16 = 7;

    /// Walk an extra field block looking for the AES record.
    pub fn find(extra_field: &[u8]) -> Result<Option<Self>> {
        let mut cursor = ByteCursor::new(extra_field);

        while cursor.remaining() >= 4 {
            let header_id = cursor.read_u16()?;
            let size = cursor.read_u16()?;

            if header_id != Self::HEADER_ID {
                cursor.skip(size as usize)?;
                continue;
            }

            if size != Self::DATA_SIZE {
                return Err(ZipError::MalformedArchive("AES extra field has an unexpected length"));
            }
            let vendor_version = cursor.read_u16()?;
            if cursor.read_bytes(2)? != Self::VENDOR_ID {
                return Err(ZipError::MalformedArchive("AES extra field has an invalid vendor id"));
            }
            let strength = AesStrength::from_u8(cursor.read_u8()?)
                .ok_or(ZipError::UnsupportedEncryption("unknown AES key strength"))?;
            let compression_method = CompressionMethod::from_u16(cursor.read_u16()?);

            return Ok(Some(Self {
                vendor_version,
                strength,
                compression_method,
            }));
        }

        Ok(None)
    }
}

/// The decoded form of one entry, ready to hand to the writer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionTarget {
    pub relative_path: String,
    /// `None` for directory entries.
    pub contents: Option<Vec<u8>>,
}

impl ExtractionTarget {
    pub fn directory(relative_path: impl Into<String>) -> Self {
        Self {
            relative_path: relative_path.into(),
            contents: None,
        }
    }

    pub fn file(relative_path: impl Into<String>, contents: Vec<u8>) -> Self {
        Self {
            relative_path: relative_path.into(),
            contents: Some(contents),
        }
    }

    pub fn is_directory(&self) -> bool {
        self.contents.is_none()
    }
}
