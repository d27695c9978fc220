// src/main.rs

//! # Digital ID - Main Entry Point
//!
//! Loads configuration, wires the decoder, lookup client and scanner, then
//! either starts the API server or runs a one-shot command.
//!
//! ## Usage
//! - `digital-id` / `digital-id serve`: start the API server
//! - `digital-id decode <raw>...`: decode each argument and print the result
//! - `digital-id seal '<claims-json>' [ttl_secs]`: issue an encrypted payload
//!
//! ## Environment Variables
//! - `DIGITAL_ID_SECRET_KEY`: shared QR passphrase (required)
//! - `DIGITAL_ID_LOOKUP_BASE_URL`: identity service root
//! - `DIGITAL_ID_BIND_ADDR`: API listen address
//! - `DIGITAL_ID_REQUEST_TIMEOUT_SECS`: lookup timeout
//! - `RUST_LOG`: log filter (default `info`)

use anyhow::{bail, Context, Result};
use digital_id::decoder::payload::{now_millis, seal_claims};
use digital_id::services::api_server::{ApiServer, DEFAULT_SEAL_TTL_SECS};
use digital_id::services::lookup::HttpIdentityLookup;
use digital_id::settings::Settings;
use digital_id::{DecodeOutcome, PayloadDecoder, QrScanner};
use dotenv::dotenv;
use log::info;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let settings = Settings::load().context("Failed to load configuration - check DIGITAL_ID_SECRET_KEY")?;

    let lookup = HttpIdentityLookup::new(&settings.lookup_base_url, settings.request_timeout())
        .context("Failed to initialize identity lookup client")?;
    let decoder = PayloadDecoder::new(settings.secret_key.clone());
    let scanner = Arc::new(QrScanner::new(decoder, Arc::new(lookup)));

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.split_first() {
        None => serve(&settings, scanner).await,
        Some((command, rest)) => match command.as_str() {
            "serve" => serve(&settings, scanner).await,
            "decode" => decode_all(&scanner, rest).await,
            "seal" => seal_payload(&scanner, rest),
            other => bail!("unknown command {:?} (expected serve, decode or seal)", other),
        },
    }
}

async fn serve(settings: &Settings, scanner: Arc<QrScanner>) -> Result<()> {
    let addr = settings.socket_addr()?;
    info!("Identity lookups go to {}", settings.lookup_base_url);
    info!("Available endpoints: POST /scan, GET /outcome, POST /reset, POST /seal");

    ApiServer::new(scanner)
        .run(addr)
        .await
        .with_context(|| format!("API server failed on {}", addr))
}

async fn decode_all(scanner: &QrScanner, raws: &[String]) -> Result<()> {
    if raws.is_empty() {
        bail!("usage: digital-id decode <raw>...");
    }

    for raw in raws {
        let report = scanner.scan(raw).await;
        match &report.outcome {
            DecodeOutcome::Decoded(record) => println!("{}", serde_json::to_string_pretty(record)?),
            DecodeOutcome::Failed(err) if err.is_expired() => {
                println!("{} Generate a new code and scan again.", err)
            }
            DecodeOutcome::Failed(err) => println!("error: {}", err),
            DecodeOutcome::Pending => println!("pending"),
        }
    }
    Ok(())
}

fn seal_payload(scanner: &QrScanner, args: &[String]) -> Result<()> {
    let (claims, rest) = match args.split_first() {
        Some(split) => split,
        None => bail!("usage: digital-id seal '<claims-json>' [ttl_secs]"),
    };
    let claims: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(claims).context("claims must be a JSON object")?;
    let ttl_secs = match rest.first() {
        Some(ttl) => ttl.parse::<i64>().context("ttl_secs must be an integer")?,
        None => DEFAULT_SEAL_TTL_SECS,
    };
    if ttl_secs <= 0 {
        bail!("ttl_secs must be positive");
    }

    let (payload, expires_at) = seal_claims(
        scanner.decoder().passphrase(),
        claims,
        now_millis(),
        ttl_secs.saturating_mul(1000),
    )?;
    info!("Sealed payload expires at {}", expires_at);
    println!("{}", payload);
    Ok(())
}
