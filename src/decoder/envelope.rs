// src/decoder/envelope.rs
//! Salted passphrase envelope (`Salted__` + salt + ciphertext).
//!
//! This is the format emitted by `openssl enc -aes-256-cbc -md md5` and by
//! CryptoJS `AES.encrypt(message, passphrase)`:
//!
//! ```text
//! +----------+----------+------------------------+
//! | Salted__ | salt (8) | AES-256-CBC ciphertext |
//! +----------+----------+------------------------+
//!   0..8       8..16      16..
//! ```
//!
//! The whole byte string travels Base64-encoded inside the QR code, which is
//! why every encrypted payload starts with `U2FsdGVk`.

use crate::utils::crypto::{
    decrypt_aes_256_cbc, derive_key_iv, encrypt_aes_256_cbc, CryptoError, Passphrase, IV_LEN,
    KEY_LEN,
};
use log::debug;
use rand::RngCore;
use thiserror::Error;

/// Fixed 8-byte marker at the start of every envelope.
pub const MARKER: &[u8; 8] = b"Salted__";
/// Base64 prefix shared by every encoded envelope.
pub const ENCODED_MARKER: &str = "U2FsdGVk";
pub const SALT_LEN: usize = 8;
/// Marker plus salt.
pub const HEADER_LEN: usize = MARKER.len() + SALT_LEN;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum EnvelopeError {
    #[error("Base64 decoding failed: {0}")]
    Base64(String),
    #[error("Invalid salt header")]
    InvalidHeader,
    #[error("{0}")]
    Crypto(#[from] CryptoError),
    #[error("decrypted payload is not valid UTF-8")]
    Utf8,
}

/// A parsed envelope. Holds no key material.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedEnvelope {
    salt: [u8; SALT_LEN],
    ciphertext: Vec<u8>,
}

impl EncryptedEnvelope {
    /// Decodes a Base64 envelope.
    ///
    /// The standard alphabet is required and line breaks are not tolerated.
    pub fn from_base64(encoded: &str) -> Result<Self, EnvelopeError> {
        let bytes = base64::decode(encoded).map_err(|e| EnvelopeError::Base64(e.to_string()))?;
        Self::from_bytes(&bytes)
    }

    /// Splits raw envelope bytes into salt and ciphertext.
    ///
    /// # Errors
    /// `InvalidHeader` if fewer than 16 bytes are present or the first eight
    /// are not `Salted__`. No cryptographic work happens before this check.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        if bytes.len() < HEADER_LEN || &bytes[..MARKER.len()] != MARKER {
            return Err(EnvelopeError::InvalidHeader);
        }

        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(&bytes[MARKER.len()..HEADER_LEN]);

        Ok(EncryptedEnvelope {
            salt,
            ciphertext: bytes[HEADER_LEN..].to_vec(),
        })
    }

    /// Derives the key for this envelope's salt and decrypts it to text.
    ///
    /// # Arguments
    /// * `passphrase` - Shared secret the producer encrypted with
    ///
    /// # Returns
    /// The UTF-8 plaintext, or an error. Wrong passphrases and tampered
    /// ciphertext almost always surface as `Crypto(BadPadding)`. A tampered
    /// byte can still leave valid padding, in which case the garbage
    /// plaintext is caught by the caller's JSON check.
    pub fn open(&self, passphrase: &Passphrase) -> Result<String, EnvelopeError> {
        debug!("Opening envelope: ciphertext length {}", self.ciphertext.len());

        let material = derive_key_iv(passphrase.as_bytes(), &self.salt, KEY_LEN, IV_LEN);
        let plaintext = decrypt_aes_256_cbc(&self.ciphertext, &material)?;

        String::from_utf8(plaintext).map_err(|_| EnvelopeError::Utf8)
    }

    /// Serializes the envelope back to its Base64 wire form.
    pub fn to_base64(&self) -> String {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.ciphertext.len());
        bytes.extend_from_slice(MARKER);
        bytes.extend_from_slice(&self.salt);
        bytes.extend_from_slice(&self.ciphertext);
        base64::encode(bytes)
    }
}

/// Encrypts `plaintext` into a Base64 envelope with a fresh random salt.
pub fn seal(passphrase: &Passphrase, plaintext: &str) -> Result<String, EnvelopeError> {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);
    seal_with_salt(passphrase, salt, plaintext)
}

/// Encrypts `plaintext` into a Base64 envelope using the given salt.
pub fn seal_with_salt(
    passphrase: &Passphrase,
    salt: [u8; SALT_LEN],
    plaintext: &str,
) -> Result<String, EnvelopeError> {
    let material = derive_key_iv(passphrase.as_bytes(), &salt, KEY_LEN, IV_LEN);
    let ciphertext = encrypt_aes_256_cbc(plaintext.as_bytes(), &material)?;

    Ok(EncryptedEnvelope { salt, ciphertext }.to_base64())
}

#[cfg(test)]
mod tests {
    use super::*;

    // Produced outside this crate (Python `cryptography` + EVP/MD5, checked
    // with `openssl enc -d -aes-256-cbc -md md5`), passphrase "campus-secret",
    // salt 01..08.
    const STALE_VECTOR: &str = "U2FsdGVkX18BAgMEBQYHCDpO6Vr5u9GPMloaOBHKCYkG1puEyFBXdaYLMaabcDYOg8cjZYkmdV3n2QpxiG35mWKLc+604xbqANoE4+guwsc=";

    fn passphrase() -> Passphrase {
        Passphrase::new("campus-secret")
    }

    #[test]
    fn test_open_external_vector() {
        let envelope = EncryptedEnvelope::from_base64(STALE_VECTOR).unwrap();

        assert_eq!(envelope.salt, [1, 2, 3, 4, 5, 6, 7, 8]);
        assert_eq!(envelope.ciphertext.len(), 64);
        assert_eq!(
            envelope.open(&passphrase()).unwrap(),
            r#"{"id":"S100","name":"Ann Wanjiru","expiresAt":1700000000000}"#
        );
    }

    #[test]
    fn test_seal_with_salt_matches_external_vector() {
        let sealed = seal_with_salt(
            &passphrase(),
            [1, 2, 3, 4, 5, 6, 7, 8],
            r#"{"id":"S100","name":"Ann Wanjiru","expiresAt":1700000000000}"#,
        )
        .unwrap();
        assert_eq!(sealed, STALE_VECTOR);
    }

    #[test]
    fn test_seal_uses_random_salt() {
        let a = seal(&passphrase(), "{}").unwrap();
        let b = seal(&passphrase(), "{}").unwrap();

        assert!(a.starts_with(ENCODED_MARKER));
        assert_ne!(a, b);
        let opened = EncryptedEnvelope::from_base64(&a).unwrap().open(&passphrase()).unwrap();
        assert_eq!(opened, "{}");
    }

    #[test]
    fn test_wrong_passphrase_fails() {
        let envelope = EncryptedEnvelope::from_base64(STALE_VECTOR).unwrap();
        assert_eq!(
            envelope.open(&Passphrase::new("wrong")),
            Err(EnvelopeError::Crypto(CryptoError::BadPadding))
        );
    }

    #[test]
    fn test_short_or_unmarked_bytes_rejected() {
        assert_eq!(
            EncryptedEnvelope::from_bytes(b"Salted__1234"),
            Err(EnvelopeError::InvalidHeader)
        );
        assert_eq!(
            EncryptedEnvelope::from_bytes(b"Peppered12345678abcdefgh"),
            Err(EnvelopeError::InvalidHeader)
        );
        // Header only: parses, but there is nothing to decrypt.
        let empty = EncryptedEnvelope::from_bytes(b"Salted__12345678").unwrap();
        assert!(empty.open(&passphrase()).is_err());
    }

    #[test]
    fn test_wrapped_base64_rejected() {
        let wrapped = format!("{}\n{}", &STALE_VECTOR[..40], &STALE_VECTOR[40..]);
        assert!(matches!(
            EncryptedEnvelope::from_base64(&wrapped),
            Err(EnvelopeError::Base64(_))
        ));
    }
}
