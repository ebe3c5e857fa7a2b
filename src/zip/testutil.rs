//! Hand-assembled archives for unit tests.

use std::io::Write;

use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use hmac::{Hmac, Mac};
use sha1::Sha1;

use super::structures::{CompressionMethod, FLAG_ENCRYPTED};

const SALT: [u8; 16] = *b"0123456789abcdef";

pub fn deflate(data: &[u8]) -> Vec<u8> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

/// WinZip AES-256 framing of `data`: salt, verifier, ciphertext, auth code.
pub fn encrypt_aes256(password: &[u8], data: &[u8]) -> Vec<u8> {
    let mut derived = [0u8; 66];
    pbkdf2::pbkdf2_hmac::<Sha1>(password, &SALT, 1000, &mut derived);

    let mut ciphertext = data.to_vec();
    let mut cipher =
        ctr::Ctr128LE::<Aes256>::new_from_slices(&derived[..32], &1u128.to_le_bytes()).unwrap();
    cipher.apply_keystream(&mut ciphertext);

    let mut mac = Hmac::<Sha1>::new_from_slice(&derived[32..64]).unwrap();
    mac.update(&ciphertext);
    let tag = mac.finalize().into_bytes();

    let mut payload = SALT.to_vec();
    payload.extend_from_slice(&derived[64..66]);
    payload.extend_from_slice(&ciphertext);
    payload.extend_from_slice(&tag[..10]);
    payload
}

/// One entry to lay down, with every header field overridable.
#[derive(Debug, Clone)]
pub struct EntrySpec {
    name: String,
    local_name: Option<String>,
    flags: u16,
    method: u16,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    version_made_by: u16,
    external_attributes: u32,
    local_extra: Vec<u8>,
    data: Vec<u8>,
}

impl EntrySpec {
    fn raw(name: &str, method: u16, original: &[u8], data: Vec<u8>) -> Self {
        Self {
            name: name.to_string(),
            local_name: None,
            flags: 0,
            method,
            crc32: crc32fast::hash(original),
            compressed_size: data.len() as u32,
            uncompressed_size: original.len() as u32,
            version_made_by: 20,
            external_attributes: 0,
            local_extra: Vec::new(),
            data,
        }
    }

    pub fn stored(name: &str, data: &[u8]) -> Self {
        Self::raw(name, 0, data, data.to_vec())
    }

    pub fn deflated(name: &str, data: &[u8]) -> Self {
        Self::raw(name, 8, data, deflate(data))
    }

    pub fn directory(name: &str) -> Self {
        let mut spec = Self::raw(name, 0, &[], Vec::new());
        spec.external_attributes = 0x10;
        spec
    }

    pub fn aes256(name: &str, data: &[u8], password: &[u8], compress: bool) -> Self {
        let (inner_method, inner) = if compress {
            (8u16, deflate(data))
        } else {
            (0, data.to_vec())
        };
        let payload = encrypt_aes256(password, &inner);
        let mut spec = Self::raw(name, CompressionMethod::AES_MARKER, data, payload);
        spec.flags = FLAG_ENCRYPTED;
        spec.crc32 = 0;
        spec.local_extra = vec![0x01, 0x99, 0x07, 0x00, 0x02, 0x00, b'A', b'E', 0x03];
        spec.local_extra.extend_from_slice(&inner_method.to_le_bytes());
        spec
    }

    pub fn local_name(mut self, name: &str) -> Self {
        self.local_name = Some(name.to_string());
        self
    }

    pub fn local_extra(mut self, extra: Vec<u8>) -> Self {
        self.local_extra = extra;
        self
    }

    pub fn flags(mut self, flags: u16) -> Self {
        self.flags = flags;
        self
    }

    pub fn method(mut self, method: u16) -> Self {
        self.method = method;
        self
    }

    pub fn crc32(mut self, crc32: u32) -> Self {
        self.crc32 = crc32;
        self
    }

    pub fn compressed_size(mut self, size: u32) -> Self {
        self.compressed_size = size;
        self
    }

    pub fn uncompressed_size(mut self, size: u32) -> Self {
        self.uncompressed_size = size;
        self
    }

    pub fn unix_mode(mut self, mode: u32) -> Self {
        self.version_made_by = (3 << 8) | 20;
        self.external_attributes = mode << 16;
        self
    }
}

#[derive(Debug, Default)]
pub struct ArchiveBuilder {
    entries: Vec<EntrySpec>,
    comment: Vec<u8>,
}

impl ArchiveBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(mut self, spec: EntrySpec) -> Self {
        self.entries.push(spec);
        self
    }

    pub fn stored(self, name: &str, data: &[u8]) -> Self {
        self.entry(EntrySpec::stored(name, data))
    }

    pub fn deflated(self, name: &str, data: &[u8]) -> Self {
        self.entry(EntrySpec::deflated(name, data))
    }

    pub fn directory(self, name: &str) -> Self {
        self.entry(EntrySpec::directory(name))
    }

    pub fn aes256(self, name: &str, data: &[u8], password: &[u8], compress: bool) -> Self {
        let spec = EntrySpec::aes256(name, data, password, compress);
        self.entry(spec)
    }

    pub fn comment(mut self, comment: &[u8]) -> Self {
        self.comment = comment.to_vec();
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = Vec::new();
        let mut central = Vec::new();

        for spec in &self.entries {
            let offset = out.len() as u32;
            let local_name = spec.local_name.as_deref().unwrap_or(&spec.name);

            out.extend_from_slice(b"PK\x03\x04");
            out.extend_from_slice(&20u16.to_le_bytes());
            out.extend_from_slice(&spec.flags.to_le_bytes());
            out.extend_from_slice(&spec.method.to_le_bytes());
            out.extend_from_slice(&[0u8; 4]);
            out.extend_from_slice(&spec.crc32.to_le_bytes());
            out.extend_from_slice(&spec.compressed_size.to_le_bytes());
            out.extend_from_slice(&spec.uncompressed_size.to_le_bytes());
            out.extend_from_slice(&(local_name.len() as u16).to_le_bytes());
            out.extend_from_slice(&(spec.local_extra.len() as u16).to_le_bytes());
            out.extend_from_slice(local_name.as_bytes());
            out.extend_from_slice(&spec.local_extra);
            out.extend_from_slice(&spec.data);

            central.extend_from_slice(b"PK\x01\x02");
            central.extend_from_slice(&spec.version_made_by.to_le_bytes());
            central.extend_from_slice(&20u16.to_le_bytes());
            central.extend_from_slice(&spec.flags.to_le_bytes());
            central.extend_from_slice(&spec.method.to_le_bytes());
            central.extend_from_slice(&[0u8; 4]);
            central.extend_from_slice(&spec.crc32.to_le_bytes());
            central.extend_from_slice(&spec.compressed_size.to_le_bytes());
            central.extend_from_slice(&spec.uncompressed_size.to_le_bytes());
            central.extend_from_slice(&(spec.name.len() as u16).to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&0u16.to_le_bytes());
            central.extend_from_slice(&spec.external_attributes.to_le_bytes());
            central.extend_from_slice(&offset.to_le_bytes());
            central.extend_from_slice(spec.name.as_bytes());
        }

        let cd_offset = out.len() as u32;
        out.extend_from_slice(&central);

        out.extend_from_slice(b"PK\x05\x06");
        out.extend_from_slice(&[0u8; 4]);
        out.extend_from_slice(&(self.entries.len() as u16).to_le_bytes());
        out.extend_from_slice(&(self.entries.len() as u16).to_le_bytes());
        out.extend_from_slice(&(central.len() as u32).to_le_bytes());
        out.extend_from_slice(&cd_offset.to_le_bytes());
        out.extend_from_slice(&(self.comment.len() as u16).to_le_bytes());
        out.extend_from_slice(&self.comment);
        out
    }
}
