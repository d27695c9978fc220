// src/decoder/mod.rs
//! QR payload decoding: classification, envelope decryption and field
//! extraction. Everything here is synchronous and side-effect free apart from
//! logging.

pub mod classifier;
pub mod envelope;
pub mod payload;

pub use classifier::{classify, PayloadFormat};
pub use envelope::{seal, EncryptedEnvelope, EnvelopeError};
pub use payload::{seal_claims, Interpretation, LegacyRequest, PayloadDecoder};
