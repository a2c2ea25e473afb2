//! The worker loop: answers status requests on behalf of the roster.

use dashmap::DashMap;
use futures::StreamExt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, info, warn};

use surety::{FlightKey, FlightSurety, ResponseOutcome, ShardId, StatusCode, SuretyError, SuretyEvent};

use crate::config::WorkerConfig;
use crate::roster::OracleRoster;
use crate::source::StatusSource;

/// Worker errors.
#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Surety error: {0}")]
    Surety(#[from] SuretyError),

    #[error("Too few oracles hold any bucket (searched from {0})")]
    Uncovered(ShardId),
}

/// What one status request produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerReport {
    pub bucket: ShardId,
    pub flight: FlightKey,
    /// Responses counted by the instance
    pub submitted: usize,
    /// Responses ignored as duplicate or late
    pub ignored: usize,
    /// Responses rejected with an error
    pub failed: usize,
    /// Status the request finalized on, if one of ours finalized it
    pub finalized: Option<StatusCode>,
    /// The flight was already resolved; nothing was submitted
    pub skipped: bool,
}

impl WorkerReport {
    fn new(bucket: ShardId, flight: FlightKey) -> Self {
        Self {
            bucket,
            flight,
            submitted: 0,
            ignored: 0,
            failed: 0,
            finalized: None,
            skipped: false,
        }
    }
}

/// Answers `OracleRequest` events for every oracle in its roster.
pub struct OracleWorker {
    config: WorkerConfig,
    surety: FlightSurety,
    roster: Arc<OracleRoster>,
    source: Arc<dyn StatusSource>,
    /// Flights whose status this worker has seen. Only grows: requests never
    /// expire, so there is no point at which an entry could be dropped.
    resolved: DashMap<FlightKey, StatusCode>,
    reports: broadcast::Sender<WorkerReport>,
}

impl OracleWorker {
    pub fn new(
        config: WorkerConfig,
        surety: FlightSurety,
        roster: Arc<OracleRoster>,
        source: Arc<dyn StatusSource>,
    ) -> Self {
        let (reports, _) = broadcast::channel(config.report_capacity.max(1));
        Self {
            config,
            surety,
            roster,
            source,
            resolved: DashMap::new(),
            reports,
        }
    }

    pub fn roster(&self) -> &OracleRoster {
        &self.roster
    }

    /// Reports of requests handled from now on.
    pub fn subscribe_reports(&self) -> broadcast::Receiver<WorkerReport> {
        self.reports.subscribe()
    }

    /// Have every oracle holding `bucket` respond to the request for `flight`.
    ///
    /// The status is drawn from the source once per request and every
    /// matching oracle submits it once. Submission errors are logged and
    /// counted, never returned.
    pub async fn handle_request(&self, bucket: ShardId, flight: &FlightKey) -> WorkerReport {
        let mut report = WorkerReport::new(bucket, flight.clone());

        if self.config.stop_after_resolution && self.resolved.contains_key(flight) {
            debug!(flight = %flight, bucket, "Flight already resolved, not responding");
            report.skipped = true;
            return report;
        }

        let oracles = self.roster.matching(bucket);
        if oracles.is_empty() {
            warn!(flight = %flight, bucket, "No oracle in the roster holds this bucket");
        }

        let status = self.source.status_for(flight).await;
        for oracle in oracles {
            if self.config.stop_after_resolution && self.resolved.contains_key(flight) {
                break;
            }

            let outcome = self
                .surety
                .submit_response(
                    oracle,
                    bucket,
                    flight.airline,
                    flight.flight.clone(),
                    flight.timestamp,
                    status,
                )
                .await;

            match outcome {
                Ok(ResponseOutcome::Recorded { .. }) => report.submitted += 1,
                Ok(ResponseOutcome::Finalized {
                    status,
                    resolved_flight,
                    ..
                }) => {
                    report.submitted += 1;
                    report.finalized = Some(status);
                    if resolved_flight {
                        self.resolved.insert(flight.clone(), status);
                    }
                }
                Ok(ResponseOutcome::Duplicate) | Ok(ResponseOutcome::Late) => report.ignored += 1,
                Err(e) => {
                    warn!(oracle = %oracle, flight = %flight, bucket, error = %e, "Oracle submission failed");
                    report.failed += 1;
                }
            }
        }

        debug!(
            flight = %flight,
            bucket,
            submitted = report.submitted,
            ignored = report.ignored,
            failed = report.failed,
            "Status request handled"
        );
        report
    }

    /// Spawn the worker loop. Subscribes before returning, so no request
    /// made after this call is missed.
    pub fn spawn(self: Arc<Self>, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let events = self.surety.subscribe();
        tokio::spawn(async move { self.run_with(events, shutdown).await })
    }

    /// Run until `shutdown` turns true or the event bus closes.
    pub async fn run(&self, shutdown: watch::Receiver<bool>) {
        self.run_with(self.surety.subscribe(), shutdown).await
    }

    async fn run_with(&self, events: broadcast::Receiver<SuretyEvent>, mut shutdown: watch::Receiver<bool>) {
        let mut events = BroadcastStream::new(events);
        info!(oracles = self.roster.len(), "Oracle worker started");

        loop {
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Oracle worker shutting down");
                        break;
                    }
                }
                event = events.next() => match event {
                    Some(Ok(SuretyEvent::OracleRequest { bucket, flight })) => {
                        let report = self.handle_request(bucket, &flight).await;
                        // Nobody listening is fine
                        let _ = self.reports.send(report);
                    }
                    Some(Ok(SuretyEvent::FlightStatusInfo { flight, status })) => {
                        self.resolved.insert(flight, status);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(BroadcastStreamRecvError::Lagged(n))) => {
                        warn!(skipped = n, "Oracle worker lagged behind events");
                    }
                    None => {
                        info!("Event bus closed, oracle worker stopping");
                        break;
                    }
                }
            }
        }

        info!("Oracle worker stopped");
    }
}
