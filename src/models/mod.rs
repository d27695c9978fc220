// src/models/mod.rs
//! Value types shared by the decoder and the scanner service.

pub mod identity;
pub mod outcome;

pub use identity::IdentityRecord;
pub use outcome::{DecodeError, DecodeOutcome};
