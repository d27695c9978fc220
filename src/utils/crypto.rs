// src/utils/crypto.rs
//! Cryptographic utilities for passphrase-encrypted QR payloads.
//!
//! Implements the pieces of the OpenSSL / CryptoJS "passphrase mode" scheme:
//! - MD5-based EVP key derivation (one iteration per block)
//! - AES-256-CBC with PKCS#7 padding
//!
//! The key derivation is kept bit-compatible with the producing ecosystem's
//! default. It is not a password-stretching KDF.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use md5::{Digest, Md5};
use serde::Deserialize;
use std::fmt;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// AES-256 key length in bytes.
pub const KEY_LEN: usize = 32;
/// CBC initialization vector length in bytes.
pub const IV_LEN: usize = 16;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CryptoError {
    #[error("invalid key or IV length")]
    InvalidLength,
    #[error("bad padding or corrupted ciphertext")]
    BadPadding,
    #[error("encryption error")]
    EncryptionError,
}

/// Shared secret used to derive envelope keys.
///
/// Surrounding whitespace is trimmed on construction, matching how the
/// secret is read from build configuration. The value is wiped on drop and
/// never shows up in `Debug` output.
#[derive(Clone, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(from = "String")]
pub struct Passphrase(String);

impl From<String> for Passphrase {
    fn from(secret: String) -> Self {
        Passphrase::new(secret)
    }
}

impl Passphrase {
    pub fn new(secret: impl Into<String>) -> Self {
        let mut raw: String = secret.into();
        let trimmed = raw.trim().to_string();
        raw.zeroize();
        Passphrase(trimmed)
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Passphrase(<redacted>)")
    }
}

/// Key and IV derived for a single decrypt or encrypt call.
///
/// Lives only as long as the call that derived it; zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    key: Vec<u8>,
    iv: Vec<u8>,
}

impl KeyMaterial {
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn iv(&self) -> &[u8] {
        &self.iv
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyMaterial")
            .field("key_len", &self.key.len())
            .field("iv_len", &self.iv.len())
            .finish()
    }
}

/// Derives a key/IV pair from a passphrase and salt (OpenSSL `EVP_BytesToKey`
/// with MD5 and a single round).
///
/// # Arguments
/// * `passphrase` - Secret bytes (may be empty)
/// * `salt` - Salt bytes taken from the envelope header
/// * `key_len` - Number of key bytes to produce
/// * `iv_len` - Number of IV bytes to produce
///
/// # Algorithm
/// ```text
/// D_0 = MD5(passphrase || salt)
/// D_i = MD5(D_{i-1} || passphrase || salt)
/// key || iv = first (key_len + iv_len) bytes of D_0 || D_1 || ...
/// ```
pub fn derive_key_iv(passphrase: &[u8], salt: &[u8], key_len: usize, iv_len: usize) -> KeyMaterial {
    let total = key_len + iv_len;
    let mut derived: Vec<u8> = Vec::with_capacity(total + 16);
    let mut previous: Vec<u8> = Vec::new();

    while derived.len() < total {
        let mut hasher = Md5::new();
        hasher.update(&previous);
        hasher.update(passphrase);
        hasher.update(salt);
        let block = hasher.finalize();

        derived.extend_from_slice(&block);
        previous.zeroize();
        previous = block.to_vec();
    }
    previous.zeroize();

    let material = KeyMaterial {
        key: derived[..key_len].to_vec(),
        iv: derived[key_len..total].to_vec(),
    };
    derived.zeroize();
    material
}

/// Decrypts AES-256-CBC ciphertext and strips PKCS#7 padding.
///
/// Either the whole plaintext is returned or an error; partial output is
/// never exposed.
///
/// # Errors
/// - `InvalidLength` if the key material is not 32/16 bytes
/// - `BadPadding` for wrong keys, truncated or tampered ciphertext
pub fn decrypt_aes_256_cbc(ciphertext: &[u8], material: &KeyMaterial) -> Result<Vec<u8>, CryptoError> {
    let decryptor = Aes256CbcDec::new_from_slices(material.key(), material.iv())
        .map_err(|_| CryptoError::InvalidLength)?;
    let mut buffer = ciphertext.to_vec();

    let plaintext = decryptor
        .decrypt_padded_mut::<Pkcs7>(&mut buffer)
        .map_err(|_| CryptoError::BadPadding)?
        .to_vec();
    buffer.zeroize();

    Ok(plaintext)
}

/// Encrypts with AES-256-CBC and PKCS#7 padding.
pub fn encrypt_aes_256_cbc(data: &[u8], material: &KeyMaterial) -> Result<Vec<u8>, CryptoError> {
    let encryptor = Aes256CbcEnc::new_from_slices(material.key(), material.iv())
        .map_err(|_| CryptoError::InvalidLength)?;
    let len = data.len();
    let mut buffer = vec![0u8; len + 16];
    buffer[..len].copy_from_slice(data);

    let ciphertext = encryptor
        .encrypt_padded_mut::<Pkcs7>(&mut buffer, len)
        .map_err(|_| CryptoError::EncryptionError)?;

    Ok(ciphertext.to_vec())
}
