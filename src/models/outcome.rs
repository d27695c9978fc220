// src/models/outcome.rs
//! Scan outcome and decode error taxonomy.

use crate::models::identity::IdentityRecord;
use thiserror::Error;

/// Reasons a scan can fail.
///
/// All variants are terminal; retrying means scanning again. `Expired` is kept
/// apart from the generic decryption and lookup failures because the
/// presentation layer asks the holder to generate a new code instead of
/// showing an error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Invalid QR code envelope: missing salt header")]
    InvalidEnvelope,
    #[error("Decryption error: {0}")]
    DecryptionFailure(String),
    #[error("QR Code has expired.")]
    Expired,
    #[error("Invalid JSON QR Code")]
    InvalidJson,
    #[error("Invalid QR Code format")]
    InvalidFormat,
    #[error("{0}")]
    LookupFailure(String),
}

impl DecodeError {
    /// `true` when the holder should be prompted to generate a fresh code.
    pub fn is_expired(&self) -> bool {
        matches!(self, DecodeError::Expired)
    }

    /// Stable machine-readable tag for the error.
    pub fn kind(&self) -> &'static str {
        match self {
            DecodeError::InvalidEnvelope => "invalid_envelope",
            DecodeError::DecryptionFailure(_) => "decryption_failure",
            DecodeError::Expired => "expired",
            DecodeError::InvalidJson => "invalid_json",
            DecodeError::InvalidFormat => "invalid_format",
            DecodeError::LookupFailure(_) => "lookup_failure",
        }
    }
}

/// The single value the outcome cell holds.
///
/// Transitions are one-way per scan: `Pending` then exactly one of
/// `Decoded` or `Failed`. Only an explicit reset (or a new scan) puts the
/// cell back to `Pending`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DecodeOutcome {
    #[default]
    Pending,
    Decoded(IdentityRecord),
    Failed(DecodeError),
}

impl DecodeOutcome {
    pub fn is_pending(&self) -> bool {
        matches!(self, DecodeOutcome::Pending)
    }

    /// Returns the decoded record, if any.
    pub fn record(&self) -> Option<&IdentityRecord> {
        match self {
            DecodeOutcome::Decoded(record) => Some(record),
            _ => None,
        }
    }

    /// Returns the failure reason, if any.
    pub fn error(&self) -> Option<&DecodeError> {
        match self {
            DecodeOutcome::Failed(err) => Some(err),
            _ => None,
        }
    }
}

impl From<Result<IdentityRecord, DecodeError>> for DecodeOutcome {
    fn from(result: Result<IdentityRecord, DecodeError>) -> Self {
        match result {
            Ok(record) => DecodeOutcome::Decoded(record),
            Err(err) => DecodeOutcome::Failed(err),
        }
    }
}
