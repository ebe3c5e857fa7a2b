//! WinZip AES decryption (AE-2).
//!
//! An encrypted payload is laid out as
//! `salt | password verifier (2) | ciphertext | authentication code (10)`.
//! Keys come from PBKDF2-HMAC-SHA1 over the password and salt; the
//! ciphertext is AES in CTR mode with a little-endian counter starting at 1,
//! authenticated with a truncated HMAC-SHA1.

use aes::Aes256;
use constant_time_eq::constant_time_eq;
use ctr::cipher::{KeyIvInit, StreamCipher};
use hmac::{Hmac, Mac};
use sha1::Sha1;

use crate::error::{Result, ZipError};

use super::structures::AesStrength;

type Aes256Ctr = ctr::Ctr128LE<Aes256>;
type HmacSha1 = Hmac<Sha1>;

pub const PASSWORD_VERIFIER_LEN: usize = 2;
pub const AUTH_CODE_LEN: usize = 10;
const KEY_DERIVATION_ROUNDS: u32 = 1000;

struct DerivedKeys {
    encryption: Vec<u8>,
    authentication: Vec<u8>,
    verifier: [u8; PASSWORD_VERIFIER_LEN],
}

impl DerivedKeys {
    fn derive(password: &[u8], salt: &[u8], strength: AesStrength) -> Self {
        let key_len = strength.key_len();
        let mut derived = vec![0u8; key_len * 2 + PASSWORD_VERIFIER_LEN];
        pbkdf2::pbkdf2_hmac::<Sha1>(password, salt, KEY_DERIVATION_ROUNDS, &mut derived);

        let verifier = [derived[key_len * 2], derived[key_len * 2 + 1]];
        Self {
            encryption: derived[..key_len].to_vec(),
            authentication: derived[key_len..key_len * 2].to_vec(),
            verifier,
        }
    }
}

/// Split an encrypted entry payload into its parts and decrypt it.
///
/// Only 256-bit keys are decrypted; 128 and 192-bit entries are recognized
/// and reported as [`ZipError::UnsupportedEncryption`].
pub fn decrypt_entry(password: &[u8], strength: AesStrength, payload: &[u8]) -> Result<Vec<u8>> {
    if strength != AesStrength::Aes256 {
        return Err(ZipError::UnsupportedEncryption(
            "only AES-256 entries can be decrypted",
        ));
    }

    let salt_len = strength.salt_len();
    if payload.len() < salt_len + PASSWORD_VERIFIER_LEN + AUTH_CODE_LEN {
        return Err(ZipError::MalformedArchive(
            "AES payload is shorter than its framing",
        ));
    }

    let (salt, rest) = payload.split_at(salt_len);
    let (verifier, rest) = rest.split_at(PASSWORD_VERIFIER_LEN);
    let (ciphertext, auth_code) = rest.split_at(rest.len() - AUTH_CODE_LEN);

    aes_decrypt(password, salt, verifier, ciphertext, auth_code)
}

/// Verify and decrypt one AES-256 ciphertext.
///
/// The authentication code is checked over the ciphertext before any
/// plaintext is produced.
pub fn aes_decrypt(
    password: &[u8],
    salt: &[u8],
    verifier: &[u8],
    ciphertext: &[u8],
    auth_code: &[u8],
) -> Result<Vec<u8>> {
    let keys = DerivedKeys::derive(password, salt, AesStrength::Aes256);

    if !constant_time_eq(&keys.verifier, verifier) {
        return Err(ZipError::Decryption("incorrect password"));
    }

    let mut mac = HmacSha1::new_from_slice(&keys.authentication)
        .map_err(|_| ZipError::Decryption("invalid authentication key"))?;
    mac.update(ciphertext);
    let tag = mac.finalize().into_bytes();
    if !constant_time_eq(&tag[..AUTH_CODE_LEN], auth_code) {
        return Err(ZipError::Decryption("authentication code mismatch"));
    }

    let mut plaintext = ciphertext.to_vec();
    let mut cipher = Aes256Ctr::new_from_slices(&keys.encryption, &1u128.to_le_bytes())
        .map_err(|_| ZipError::Decryption("invalid encryption key"))?;
    cipher.apply_keystream(&mut plaintext);

    Ok(plaintext)
}
