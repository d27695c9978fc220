// src/utils/mod.rs
//! Helper functions shared across the decoder.

pub mod crypto;
pub mod serialization;
