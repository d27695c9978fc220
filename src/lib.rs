// src/lib.rs

//! # Digital ID - QR Payload Decoder
//!
//! Decodes the QR codes printed on (or rendered by) student digital ID cards
//! and publishes the matching identity record.
//!
//! ## Architecture Overview
//! 1. **Decoder Layer**: format classification, `Salted__` envelope
//!    decryption and claim validation (`decoder`)
//! 2. **Services Layer**: outcome cell with stale-result discard, identity
//!    lookup client, HTTP API (`services`)
//! 3. **Cryptography Layer**: EVP/MD5 key derivation and AES-256-CBC (`utils`)
//!
//! ## Supported payloads
//! - Encrypted: Base64 `U2FsdGVk...` envelope holding a JSON claim with
//!   `expiresAt`
//! - JSON: `{"id": ..., "name": ..., "email": ..., "image": ...}`
//! - Image URL: `http...`
//! - Legacy: `studentId|token`, resolved through the identity service

pub mod decoder;   // Payload classification and decryption
pub mod models;    // Data structures
pub mod services;  // Scanner, lookup client and API
pub mod settings;  // Configuration loading
pub mod utils;     // Crypto and JSON helpers

pub use decoder::{PayloadDecoder, PayloadFormat};
pub use models::{DecodeError, DecodeOutcome, IdentityRecord};
pub use services::scanner::QrScanner;
pub use utils::crypto::Passphrase;
