// src/services/lookup.rs
//! Identity lookup service client.
//!
//! Legacy `identifier|token` QR codes carry no identity data themselves; the
//! record is fetched from the campus identity service. The [`IdentityLookup`]
//! trait is the seam the scanner depends on, and [`HttpIdentityLookup`] is the
//! production implementation over HTTP.

use crate::models::identity::IdentityRecord;
use futures::future::BoxFuture;
use log::{debug, info, warn};
use reqwest::{Client, Url};
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LookupError {
    #[error("invalid lookup service URL: {0}")]
    InvalidUrl(String),
    #[error("{0}")]
    Transport(#[from] reqwest::Error),
    #[error("HTTP {0}")]
    Status(u16),
}

/// Asynchronous source of identity records.
///
/// Implementations own their timeout and retry policy. Whatever they do
/// internally, one call must resolve exactly once.
pub trait IdentityLookup: Send + Sync {
    fn fetch<'a>(
        &'a self,
        identifier: &'a str,
        token: &'a str,
    ) -> BoxFuture<'a, Result<IdentityRecord, LookupError>>;
}

/// HTTP client for `GET {base}/student-summary/{id}?qr_code_data={token}`.
#[derive(Clone)]
pub struct HttpIdentityLookup {
    /// Shared reqwest client (connection pooling, timeout)
    client: Client,
    /// Service root, e.g. `https://id.campus.ac.ke/api`
    base_url: Url,
}

impl HttpIdentityLookup {
    /// Creates a client for the service rooted at `base_url`.
    ///
    /// # Arguments
    /// * `base_url` - Absolute http(s) URL of the service root
    /// * `timeout` - Whole-request timeout applied by the transport
    ///
    /// # Errors
    /// Returns `InvalidUrl` if `base_url` cannot be parsed or cannot carry a
    /// path, and `Transport` if the HTTP client fails to build.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LookupError> {
        let base_url = Url::parse(base_url).map_err(|e| LookupError::InvalidUrl(e.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(LookupError::InvalidUrl(base_url.to_string()));
        }

        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client, base_url })
    }

    /// Builds the summary URL, percent-encoding the identifier and token.
    fn summary_url(&self, identifier: &str, token: &str) -> Result<Url, LookupError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| LookupError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push("student-summary")
            .push(identifier);
        url.query_pairs_mut().append_pair("qr_code_data", token);
        Ok(url)
    }
}

impl IdentityLookup for HttpIdentityLookup {
    fn fetch<'a>(
        &'a self,
        identifier: &'a str,
        token: &'a str,
    ) -> BoxFuture<'a, Result<IdentityRecord, LookupError>> {
        Box::pin(async move {
            let url = self.summary_url(identifier, token)?;
            // The query carries the token; log the path only.
            debug!("Sending request: GET {}", url.path());

            let started = Instant::now();
            let response = self.client.get(url.clone()).send().await?;
            let status = response.status();
            info!(
                "Received response for {}: {} in {} ms",
                url.path(),
                status.as_u16(),
                started.elapsed().as_millis()
            );

            if !status.is_success() {
                warn!("Identity service rejected lookup for {}", identifier);
                return Err(LookupError::Status(status.as_u16()));
            }

            let record = response.json::<IdentityRecord>().await?;
            Ok(record)
        })
    }
}
