// src/services/api_server.rs
//! HTTP surface of the scanner.
//!
//! Stands in for the presentation layer: a camera client posts each raw
//! QR string, and any screen can poll the outcome cell or trigger
//! "scan again".
//!
//! Endpoints:
//! - `POST /scan`: decode one raw scan
//! - `GET  /outcome`: current outcome cell
//! - `POST /reset`: return the cell to pending
//! - `POST /seal`: issue a short-lived encrypted QR payload

use crate::decoder::payload::{now_millis, seal_claims};
use crate::models::identity::IdentityRecord;
use crate::models::outcome::{DecodeError, DecodeOutcome};
use crate::services::scanner::QrScanner;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Router,
};
use log::{error, info};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;

/// Lifetime of issued codes when the request does not set one.
pub const DEFAULT_SEAL_TTL_SECS: i64 = 300;

/// Request payload carrying one raw scan
#[derive(Serialize, Deserialize)]
struct ScanRequest {
    raw: String,
}

/// JSON view of a [`DecodeOutcome`]
#[derive(Serialize, Deserialize, Debug, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
enum OutcomeView {
    Pending,
    Decoded {
        record: IdentityRecord,
    },
    Failed {
        kind: String,
        message: String,
        /// Prompt the holder to generate a new code
        expired: bool,
    },
}

impl From<&DecodeOutcome> for OutcomeView {
    fn from(outcome: &DecodeOutcome) -> Self {
        match outcome {
            DecodeOutcome::Pending => OutcomeView::Pending,
            DecodeOutcome::Decoded(record) => OutcomeView::Decoded { record: record.clone() },
            DecodeOutcome::Failed(err) => OutcomeView::Failed {
                kind: err.kind().to_string(),
                message: err.to_string(),
                expired: err.is_expired(),
            },
        }
    }
}

/// Response for a scan
#[derive(Serialize, Deserialize)]
struct ScanResponse {
    generation: u64,
    applied: bool,
    outcome: OutcomeView,
}

/// Response for the outcome cell
#[derive(Serialize, Deserialize)]
struct OutcomeResponse {
    generation: u64,
    outcome: OutcomeView,
}

/// Response for a reset
#[derive(Serialize, Deserialize)]
struct ResetResponse {
    generation: u64,
}

/// Request payload for issuing an encrypted code
#[derive(Serialize, Deserialize)]
struct SealRequest {
    claims: serde_json::Map<String, serde_json::Value>,
    ttl_secs: Option<i64>,
}

/// Response containing the Base64 envelope to render as a QR code
#[derive(Serialize, Deserialize)]
struct SealResponse {
    payload: String,
    expires_at: i64,
}

/// API server state
#[derive(Clone)]
pub struct ApiServer {
    /// Scanner owning the outcome cell
    scanner: Arc<QrScanner>,
}

impl ApiServer {
    pub fn new(scanner: Arc<QrScanner>) -> Self {
        ApiServer { scanner }
    }

    /// Builds the router with all endpoints.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/scan", post(Self::scan_handler))
            .route("/outcome", get(Self::outcome_handler))
            .route("/reset", post(Self::reset_handler))
            .route("/seal", post(Self::seal_handler))
            .with_state(Arc::new(self.clone()))
    }

    /// Starts the API server and begins listening for requests
    ///
    /// # Arguments
    /// * `addr` - Socket address to bind to (e.g., "127.0.0.1:3000")
    pub async fn run(&self, addr: SocketAddr) -> std::io::Result<()> {
        let listener = tokio::net::TcpListener::bind(addr).await?;
        info!("API server running at http://{}", listener.local_addr()?);

        axum::serve(listener, self.router()).await
    }

    /// Decodes one raw scan
    ///
    /// # Endpoint
    /// POST /scan
    ///
    /// # Responses
    /// - 200 OK: Decoded, or superseded by a newer scan (`applied: false`)
    /// - 422 Unprocessable Entity: Payload rejected (format, envelope, expiry)
    /// - 502 Bad Gateway: Identity lookup failed
    async fn scan_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<ScanRequest>,
    ) -> impl IntoResponse {
        let report = state.scanner.scan(&payload.raw).await;

        let status = match &report.outcome {
            DecodeOutcome::Failed(DecodeError::LookupFailure(_)) => StatusCode::BAD_GATEWAY,
            DecodeOutcome::Failed(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::OK,
        };

        (
            status,
            Json(ScanResponse {
                generation: report.generation,
                applied: report.applied,
                outcome: OutcomeView::from(&report.outcome),
            }),
        )
    }

    /// Returns the current outcome cell
    ///
    /// # Endpoint
    /// GET /outcome
    async fn outcome_handler(State(state): State<Arc<ApiServer>>) -> impl IntoResponse {
        let cell = state.scanner.current();
        Json(OutcomeResponse {
            generation: cell.generation,
            outcome: OutcomeView::from(&cell.outcome),
        })
    }

    /// Returns the cell to pending ("scan again")
    ///
    /// # Endpoint
    /// POST /reset
    async fn reset_handler(State(state): State<Arc<ApiServer>>) -> impl IntoResponse {
        Json(ResetResponse { generation: state.scanner.reset() })
    }

    /// Issues an encrypted QR payload valid for `ttl_secs`
    ///
    /// # Endpoint
    /// POST /seal
    ///
    /// # Request Body
    /// `{"claims": {"id": "...", "name": "..."}, "ttl_secs": 300}`;
    /// `expiresAt` is always set by the server.
    ///
    /// # Responses
    /// - 200 OK: Returns the Base64 envelope
    /// - 400 Bad Request: Non-positive TTL
    /// - 500 Internal Server Error: Encryption failed
    async fn seal_handler(
        State(state): State<Arc<ApiServer>>,
        Json(payload): Json<SealRequest>,
    ) -> Result<Json<SealResponse>, (StatusCode, String)> {
        let ttl_secs = payload.ttl_secs.unwrap_or(DEFAULT_SEAL_TTL_SECS);
        if ttl_secs <= 0 {
            return Err((StatusCode::BAD_REQUEST, "ttl_secs must be positive".into()));
        }

        match seal_claims(
            state.scanner.decoder().passphrase(),
            payload.claims,
            now_millis(),
            ttl_secs.saturating_mul(1000),
        ) {
            Ok((payload, expires_at)) => Ok(Json(SealResponse { payload, expires_at })),
            Err(e) => {
                error!("Failed to seal QR payload: {}", e);
                Err((StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
            }
        }
    }
}
