// src/services/scanner.rs
//! Scanner service: owns the outcome cell the presentation layer observes.
//!
//! Each scan or reset starts a new generation. A scan's terminal outcome is
//! written only while its generation is still the latest, so a slow legacy
//! lookup that resolves after the user rescanned (or reset) is dropped
//! instead of overwriting newer state.

use crate::decoder::payload::{Interpretation, LegacyRequest, PayloadDecoder};
use crate::models::outcome::{DecodeError, DecodeOutcome};
use crate::services::lookup::IdentityLookup;
use log::{debug, error, info};
use std::sync::Arc;
use tokio::sync::watch;

/// Snapshot of the outcome cell.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OutcomeCell {
    /// Generation of the scan (or reset) that owns the cell
    pub generation: u64,
    /// Latest outcome for that generation
    pub outcome: DecodeOutcome,
}

/// Result of one `scan` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Generation captured when the scan started
    pub generation: u64,
    /// Terminal outcome this scan produced
    pub outcome: DecodeOutcome,
    /// `false` if a newer scan or reset superseded this one
    pub applied: bool,
}

/// Decodes scans and publishes their outcomes.
///
/// Shared behind an `Arc`; all methods take `&self`.
pub struct QrScanner {
    decoder: PayloadDecoder,
    lookup: Arc<dyn IdentityLookup>,
    cell: Arc<watch::Sender<OutcomeCell>>,
}

impl QrScanner {
    /// Creates a scanner whose cell starts `Pending` at generation 0.
    pub fn new(decoder: PayloadDecoder, lookup: Arc<dyn IdentityLookup>) -> Self {
        let (cell, _) = watch::channel(OutcomeCell::default());
        QrScanner { decoder, lookup, cell: Arc::new(cell) }
    }

    pub fn decoder(&self) -> &PayloadDecoder {
        &self.decoder
    }

    /// Current contents of the outcome cell.
    pub fn current(&self) -> OutcomeCell {
        self.cell.borrow().clone()
    }

    /// Receiver notified on every change of the cell.
    pub fn subscribe(&self) -> watch::Receiver<OutcomeCell> {
        self.cell.subscribe()
    }

    /// Returns the cell to `Pending` ("scan again").
    ///
    /// Any lookup still in flight is superseded and its result discarded.
    pub fn reset(&self) -> u64 {
        let generation = begin(&self.cell);
        debug!("Scan reset, generation {}", generation);
        generation
    }

    /// Decodes one raw scan and publishes its outcome.
    ///
    /// # Process Flow
    /// 1. Starts a new generation and sets the cell to `Pending`
    /// 2. Interprets the payload; legacy payloads await the lookup service
    /// 3. Writes the terminal outcome once, unless superseded meanwhile
    ///
    /// The lookup and its terminal write run on a spawned task, so dropping
    /// the returned future (caller timeout, client disconnect) does not leave
    /// the cell `Pending`.
    ///
    /// # Returns
    /// The outcome this scan produced, whether or not it reached the cell.
    pub async fn scan(&self, raw: &str) -> ScanReport {
        let generation = begin(&self.cell);

        let (outcome, applied) = match self.decoder.interpret(raw) {
            Interpretation::Ready(result) => {
                let outcome = DecodeOutcome::from(result);
                let applied = settle(&self.cell, generation, &outcome);
                (outcome, applied)
            }
            Interpretation::Lookup(request) => self.spawn_lookup(generation, request).await,
        };

        if !applied {
            debug!("Discarding stale outcome of scan #{}", generation);
        }

        ScanReport { generation, outcome, applied }
    }

    async fn spawn_lookup(&self, generation: u64, request: LegacyRequest) -> (DecodeOutcome, bool) {
        let lookup = Arc::clone(&self.lookup);
        let cell = Arc::clone(&self.cell);

        let task = tokio::spawn(async move {
            let outcome = lookup_outcome(lookup.as_ref(), &request).await;
            let applied = settle(&cell, generation, &outcome);
            (outcome, applied)
        });

        match task.await {
            Ok(settled) => settled,
            Err(e) => {
                error!("Lookup task for scan #{} failed: {}", generation, e);
                let outcome = DecodeOutcome::Failed(DecodeError::LookupFailure(format!(
                    "Failed to fetch student details: {}",
                    e
                )));
                let applied = settle(&self.cell, generation, &outcome);
                (outcome, applied)
            }
        }
    }
}

async fn lookup_outcome(lookup: &dyn IdentityLookup, request: &LegacyRequest) -> DecodeOutcome {
    info!("Fetching student details for ID: {}", request.identifier);

    match lookup.fetch(&request.identifier, &request.token).await {
        Ok(record) => DecodeOutcome::Decoded(record),
        Err(e) => {
            error!("Error fetching student details: {}", e);
            DecodeOutcome::Failed(DecodeError::LookupFailure(format!(
                "Failed to fetch student details: {}",
                e
            )))
        }
    }
}

fn begin(cell: &watch::Sender<OutcomeCell>) -> u64 {
    let mut generation = 0;
    cell.send_modify(|cell| {
        cell.generation += 1;
        cell.outcome = DecodeOutcome::Pending;
        generation = cell.generation;
    });
    generation
}

// Generation check and write happen under the channel's lock.
fn settle(cell: &watch::Sender<OutcomeCell>, generation: u64, outcome: &DecodeOutcome) -> bool {
    cell.send_if_modified(|cell| {
        if cell.generation == generation && cell.outcome.is_pending() {
            cell.outcome = outcome.clone();
            true
        } else {
            false
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::identity::IdentityRecord;
    use crate::services::lookup::LookupError;
    use crate::utils::crypto::Passphrase;
    use futures::future::BoxFuture;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::{oneshot, Notify};

    type Gate = oneshot::Receiver<Result<IdentityRecord, LookupError>>;

    /// Lookup double: records calls, and holds gated identifiers until the
    /// test releases them.
    #[derive(Default)]
    struct GatedLookup {
        calls: Mutex<Vec<(String, String)>>,
        gates: Mutex<HashMap<String, Gate>>,
        called: Notify,
    }

    impl GatedLookup {
        fn gate(&self, identifier: &str) -> oneshot::Sender<Result<IdentityRecord, LookupError>> {
            let (tx, rx) = oneshot::channel();
            self.gates.lock().unwrap().insert(identifier.to_string(), rx);
            tx
        }

        fn calls(&self) -> Vec<(String, String)> {
            self.calls.lock().unwrap().clone()
        }
    }

    fn record_for(identifier: &str) -> IdentityRecord {
        IdentityRecord {
            identifier: identifier.to_string(),
            display_name: "Ann Wanjiru".into(),
            ..IdentityRecord::default()
        }
    }

    impl IdentityLookup for GatedLookup {
        fn fetch<'a>(
            &'a self,
            identifier: &'a str,
            token: &'a str,
        ) -> BoxFuture<'a, Result<IdentityRecord, LookupError>> {
            Box::pin(async move {
                self.calls
                    .lock()
                    .unwrap()
                    .push((identifier.to_string(), token.to_string()));
                let gate = self.gates.lock().unwrap().remove(identifier);
                self.called.notify_one();

                match gate {
                    Some(rx) => rx.await.unwrap_or(Err(LookupError::Status(499))),
                    None => Ok(record_for(identifier)),
                }
            })
        }
    }

    fn scanner(lookup: Arc<GatedLookup>) -> Arc<QrScanner> {
        let decoder = PayloadDecoder::new(Passphrase::new("campus-secret"));
        Arc::new(QrScanner::new(decoder, lookup))
    }

    #[tokio::test]
    async fn test_legacy_scan_calls_lookup_once() {
        let lookup = Arc::new(GatedLookup::default());
        let scanner = scanner(lookup.clone());

        let report = scanner.scan("S100|abc123").await;

        assert_eq!(lookup.calls(), vec![("S100".to_string(), "abc123".to_string())]);
        assert!(report.applied);
        assert_eq!(report.outcome, DecodeOutcome::Decoded(record_for("S100")));
        assert_eq!(scanner.current().outcome, report.outcome);
        assert_eq!(scanner.current().generation, report.generation);
    }

    #[tokio::test]
    async fn test_cell_is_pending_while_lookup_in_flight() {
        let lookup = Arc::new(GatedLookup::default());
        let release = lookup.gate("S100");
        let scanner = scanner(lookup.clone());

        let task = {
            let scanner = scanner.clone();
            tokio::spawn(async move { scanner.scan("S100|abc123").await })
        };
        lookup.called.notified().await;
        assert!(scanner.current().outcome.is_pending());

        release.send(Ok(record_for("S100"))).unwrap();
        let report = task.await.unwrap();

        assert!(report.applied);
        assert_eq!(scanner.current().outcome.record(), Some(&record_for("S100")));
    }

    #[tokio::test]
    async fn test_rescan_discards_stale_lookup() {
        let lookup = Arc::new(GatedLookup::default());
        let release = lookup.gate("S100");
        let scanner = scanner(lookup.clone());

        let stale = {
            let scanner = scanner.clone();
            tokio::spawn(async move { scanner.scan("S100|abc123").await })
        };
        lookup.called.notified().await;

        let fresh = scanner.scan(r#"{"id":"S200","name":"Baraka"}"#).await;
        assert!(fresh.applied);

        release.send(Ok(record_for("S100"))).unwrap();
        let stale = stale.await.unwrap();

        assert!(!stale.applied);
        assert!(stale.generation < fresh.generation);
        let current = scanner.current();
        assert_eq!(current.generation, fresh.generation);
        assert_eq!(current.outcome.record().unwrap().identifier, "S200");
    }

    #[tokio::test]
    async fn test_reset_during_lookup_discards_result() {
        let lookup = Arc::new(GatedLookup::default());
        let release = lookup.gate("S100");
        let scanner = scanner(lookup.clone());

        let task = {
            let scanner = scanner.clone();
            tokio::spawn(async move { scanner.scan("S100|abc123").await })
        };
        lookup.called.notified().await;
        let reset_generation = scanner.reset();

        release.send(Ok(record_for("S100"))).unwrap();
        let report = task.await.unwrap();

        assert!(!report.applied);
        assert_eq!(
            scanner.current(),
            OutcomeCell { generation: reset_generation, outcome: DecodeOutcome::Pending }
        );
    }

    #[tokio::test]
    async fn test_dropped_scan_still_settles_cell() {
        let lookup = Arc::new(GatedLookup::default());
        let release = lookup.gate("S100");
        let scanner = scanner(lookup.clone());
        let mut rx = scanner.subscribe();

        let timed_out =
            tokio::time::timeout(Duration::from_millis(20), scanner.scan("S100|abc123")).await;
        assert!(timed_out.is_err());
        assert!(scanner.current().outcome.is_pending());

        release.send(Ok(record_for("S100"))).unwrap();
        let cell = tokio::time::timeout(
            Duration::from_secs(1),
            rx.wait_for(|cell| !cell.outcome.is_pending()),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();

        assert_eq!(cell.generation, 1);
        assert_eq!(cell.outcome, DecodeOutcome::Decoded(record_for("S100")));
        assert_eq!(lookup.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_lookup_error_preserves_message() {
        let lookup = Arc::new(GatedLookup::default());
        let release = lookup.gate("S404");
        let scanner = scanner(lookup.clone());

        release.send(Err(LookupError::Status(503))).unwrap();
        let report = scanner.scan("S404|zzz").await;

        assert_eq!(
            report.outcome,
            DecodeOutcome::Failed(DecodeError::LookupFailure(
                "Failed to fetch student details: HTTP 503".into()
            ))
        );
        assert!(report.applied);
    }

    #[tokio::test]
    async fn test_sync_branches_skip_lookup() {
        let lookup = Arc::new(GatedLookup::default());
        let scanner = scanner(lookup.clone());

        let url = scanner.scan("http://example.com/photo.jpg").await;
        assert_eq!(url.outcome.record().unwrap().avatar, "http://example.com/photo.jpg");

        let invalid = scanner.scan("no separator here").await;
        assert_eq!(invalid.outcome, DecodeOutcome::Failed(DecodeError::InvalidFormat));

        assert!(lookup.calls().is_empty());
        assert_eq!(scanner.current().generation, 2);
    }

    #[tokio::test]
    async fn test_subscriber_sees_terminal_outcome() {
        let lookup = Arc::new(GatedLookup::default());
        let scanner = scanner(lookup);
        let mut rx = scanner.subscribe();

        scanner.scan(r#"{"id":"S1"}"#).await;

        assert!(rx.has_changed().unwrap());
        let seen = rx.borrow_and_update().clone();
        assert_eq!(seen.outcome.record().unwrap().identifier, "S1");
    }
}
