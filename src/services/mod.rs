// src/services/mod.rs
//! Scanner service, identity lookup client and the HTTP API.

pub mod api_server;
pub mod lookup;
pub mod scanner;
