// src/decoder/payload.rs
//! QR payload interpreter.
//!
//! Turns one raw scan into either a finished result (encrypted, JSON and URL
//! payloads are self-describing) or a lookup request for the legacy
//! `identifier|token` format, which needs the remote identity service.

use crate::decoder::classifier::{classify, PayloadFormat};
use crate::decoder::envelope::{seal, EncryptedEnvelope, EnvelopeError};
use crate::models::identity::IdentityRecord;
use crate::models::outcome::DecodeError;
use crate::utils::crypto::Passphrase;
use crate::utils::serialization::{millis_field, parse_object, string_field};
use log::{debug, error, warn};
use serde_json::{Map, Value};

/// Claim field carrying the expiry in epoch milliseconds.
pub const EXPIRES_AT_FIELD: &str = "expiresAt";

/// Identifier pair extracted from a legacy `identifier|token` scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyRequest {
    pub identifier: String,
    pub token: String,
}

/// What the decoder made of a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interpretation {
    /// Finished synchronously.
    Ready(Result<IdentityRecord, DecodeError>),
    /// Needs an asynchronous identity lookup.
    Lookup(LegacyRequest),
}

/// Stateless payload decoder.
///
/// The shared passphrase is injected at construction so tests can use their
/// own secret and production never needs a global.
#[derive(Debug, Clone)]
pub struct PayloadDecoder {
    passphrase: Passphrase,
}

impl PayloadDecoder {
    pub fn new(passphrase: Passphrase) -> Self {
        if passphrase.is_empty() {
            warn!("Payload decoder created with an empty passphrase");
        }
        PayloadDecoder { passphrase }
    }

    pub fn passphrase(&self) -> &Passphrase {
        &self.passphrase
    }

    /// Interprets a scan against the current wall clock.
    pub fn interpret(&self, raw: &str) -> Interpretation {
        self.interpret_at(raw, now_millis())
    }

    /// Interprets a scan, checking expiry against `now_ms`.
    ///
    /// # Arguments
    /// * `raw` - The scanned string, untouched
    /// * `now_ms` - Current time in epoch milliseconds
    ///
    /// # Process Flow
    /// 1. Classifies the scan (see [`classify`])
    /// 2. Runs exactly the selected branch; its failure is final
    pub fn interpret_at(&self, raw: &str, now_ms: i64) -> Interpretation {
        let format = classify(raw);
        debug!("Classified scan as {:?} ({} bytes)", format, raw.len());

        match format {
            PayloadFormat::Encrypted => {
                Interpretation::Ready(self.decode_encrypted(raw.trim(), now_ms))
            }
            PayloadFormat::Json => Interpretation::Ready(decode_json(raw.trim())),
            PayloadFormat::DirectUrl => {
                debug!("Scanned image URL");
                Interpretation::Ready(Ok(IdentityRecord::from_avatar(raw)))
            }
            PayloadFormat::Legacy => match parse_legacy(raw) {
                Ok(request) => Interpretation::Lookup(request),
                Err(err) => Interpretation::Ready(Err(err)),
            },
        }
    }

    /// Decrypts an envelope, checks the claim's expiry and builds the record.
    fn decode_encrypted(&self, encoded: &str, now_ms: i64) -> Result<IdentityRecord, DecodeError> {
        let plaintext = EncryptedEnvelope::from_base64(encoded)
            .and_then(|envelope| envelope.open(&self.passphrase))
            .map_err(|e| {
                error!("Failed to decrypt QR code data: {}", e);
                match e {
                    EnvelopeError::InvalidHeader => DecodeError::InvalidEnvelope,
                    other => DecodeError::DecryptionFailure(other.to_string()),
                }
            })?;

        let claim = parse_object(&plaintext).ok_or_else(|| {
            error!("Decrypted QR payload is not a JSON object");
            DecodeError::DecryptionFailure("decrypted payload is not a JSON object".into())
        })?;

        let expires_at = millis_field(&claim, EXPIRES_AT_FIELD);
        if now_ms > expires_at {
            warn!("QR code expired. Current time: {}, expires at: {}", now_ms, expires_at);
            return Err(DecodeError::Expired);
        }

        Ok(record_from_claim(&claim))
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Seals `claims` into an encrypted payload valid until `now_ms + ttl_ms`.
///
/// Any `expiresAt` already present in `claims` is overwritten.
///
/// # Returns
/// The Base64 envelope and the expiry it carries.
pub fn seal_claims(
    passphrase: &Passphrase,
    mut claims: Map<String, Value>,
    now_ms: i64,
    ttl_ms: i64,
) -> Result<(String, i64), EnvelopeError> {
    let expires_at = now_ms.saturating_add(ttl_ms);
    claims.insert(EXPIRES_AT_FIELD.to_string(), Value::from(expires_at));

    let payload = seal(passphrase, &Value::Object(claims).to_string())?;
    Ok((payload, expires_at))
}

fn decode_json(data: &str) -> Result<IdentityRecord, DecodeError> {
    match parse_object(data) {
        Some(obj) => Ok(record_from_claim(&obj)),
        None => {
            error!("Error parsing JSON from QR code");
            Err(DecodeError::InvalidJson)
        }
    }
}

/// Splits `identifier|token`. Extra segments are ignored.
pub fn parse_legacy(raw: &str) -> Result<LegacyRequest, DecodeError> {
    let mut parts = raw.split('|');
    match (parts.next(), parts.next()) {
        (Some(identifier), Some(token)) => Ok(LegacyRequest {
            identifier: identifier.to_string(),
            token: token.to_string(),
        }),
        _ => {
            error!("Invalid QR code format ({} bytes)", raw.len());
            Err(DecodeError::InvalidFormat)
        }
    }
}

// Self-describing payloads never carry a department.
fn record_from_claim(obj: &Map<String, Value>) -> IdentityRecord {
    IdentityRecord {
        identifier: string_field(obj, "id", IdentityRecord::UNKNOWN),
        display_name: string_field(obj, "name", IdentityRecord::UNKNOWN),
        contact: string_field(obj, "email", IdentityRecord::UNKNOWN),
        affiliation: IdentityRecord::UNKNOWN.to_string(),
        avatar: string_field(obj, "image", ""),
        payload_ref: String::new(),
    }
}
