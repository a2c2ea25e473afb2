//! Scenario runner: sets up airlines, flights and policies, lets the oracle
//! fleet resolve every flight and reports the outcome.

use anyhow::{anyhow, bail, Context};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{info, warn};

use oracle_worker::{OracleRoster, OracleWorker, WorkerReport};
use surety::{derive_request_bucket, AccountId, AdmissionOutcome, Amount, FlightKey, FlightSurety, ShardId, StatusCode};

use crate::config::{AirlineSpec, NodeConfig};

/// Outcome of a scenario run.
#[derive(Debug, Clone)]
pub struct ScenarioReport {
    /// Final status per flight, in registration order
    pub flights: Vec<(FlightKey, StatusCode)>,
    /// Credit per insured passenger label
    pub balances: Vec<(String, Amount)>,
    /// Fees and premiums collected
    pub pool: Amount,
}

impl ScenarioReport {
    pub fn status_of(&self, code: &str) -> Option<StatusCode> {
        self.flights
            .iter()
            .find(|(key, _)| key.flight == code)
            .map(|(_, status)| *status)
    }

    pub fn balance_of(&self, passenger: &str) -> Option<Amount> {
        self.balances
            .iter()
            .find(|(label, _)| label == passenger)
            .map(|(_, amount)| *amount)
    }
}

/// Run the configured scenario to completion.
///
/// Fails if any step is rejected, if no bucket is held by enough oracles, or
/// if the flights do not all resolve within `scenario.timeout_secs`.
pub async fn run_scenario(config: &NodeConfig) -> anyhow::Result<ScenarioReport> {
    let scenario = &config.scenario;
    let genesis = AccountId::from_label(&scenario.genesis.label);
    let surety = FlightSurety::new(config.surety.clone(), genesis, scenario.genesis.name.clone())
        .context("initializing surety instance")?;
    info!(genesis = %genesis, name = %scenario.genesis.name, "Surety instance started");

    let fee = surety.config().registration_fee;
    if scenario.genesis.fund {
        surety.fund_airline(genesis, fee).await.context("funding genesis airline")?;
    }
    for airline in &scenario.airlines {
        admit(&surety, airline, &scenario.genesis.label).await?;
        if airline.fund {
            surety
                .fund_airline(AccountId::from_label(&airline.label), fee)
                .await
                .with_context(|| format!("funding airline {}", airline.label))?;
        }
    }

    let mut flights = Vec::new();
    for flight in &scenario.flights {
        let airline = AccountId::from_label(&flight.airline);
        let key = surety
            .register_flight(airline, flight.code.clone(), flight.timestamp, airline)
            .await
            .with_context(|| format!("registering flight {}", flight.code))?;
        flights.push(key);
    }

    let mut passengers = Vec::new();
    for policy in &scenario.policies {
        let airline = AccountId::from_label(&policy.airline);
        let key = flights
            .iter()
            .find(|key| key.airline == airline && key.flight == policy.flight)
            .ok_or_else(|| anyhow!("policy on unknown flight {} of {}", policy.flight, policy.airline))?;
        surety
            .buy_insurance(AccountId::from_label(&policy.passenger), key, policy.premium)
            .await
            .with_context(|| format!("insuring {} on {}", policy.passenger, policy.flight))?;
        if !passengers.contains(&policy.passenger) {
            passengers.push(policy.passenger.clone());
        }
    }

    let roster = Arc::new(OracleRoster::new());
    roster
        .register_fleet(&surety, &config.worker)
        .await
        .context("registering oracle fleet")?;

    let worker = Arc::new(OracleWorker::new(
        config.worker.clone(),
        surety.clone(),
        roster.clone(),
        scenario.status.source(),
    ));
    let mut reports = worker.subscribe_reports();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handle = worker.spawn(shutdown_rx);

    let deadline = Instant::now() + Duration::from_secs(scenario.timeout_secs);
    let resolved = resolve_flights(&surety, &roster, &flights, &mut reports, deadline).await;

    // The worker stops either way
    let _ = shutdown_tx.send(true);
    if let Err(e) = handle.await {
        warn!(error = %e, "Oracle worker task failed");
    }
    resolved?;

    let mut report = ScenarioReport {
        flights: Vec::new(),
        balances: Vec::new(),
        pool: surety.pool_balance().await,
    };
    for key in &flights {
        let status = surety.flight(key).await?.status;
        info!(flight = %key, status = %status, "Flight resolved");
        report.flights.push((key.clone(), status));
    }
    for passenger in passengers {
        let balance = surety.balance(&AccountId::from_label(&passenger)).await;
        info!(passenger = %passenger, balance = %balance, "Passenger credit");
        report.balances.push((passenger, balance));
    }
    info!(pool = %report.pool, "Scenario complete");
    Ok(report)
}

/// Have sponsors vote for an airline until it is admitted.
async fn admit(surety: &FlightSurety, airline: &AirlineSpec, genesis_label: &str) -> anyhow::Result<()> {
    let candidate = AccountId::from_label(&airline.label);
    let sponsors: Vec<&str> = if airline.sponsors.is_empty() {
        vec![genesis_label]
    } else {
        airline.sponsors.iter().map(String::as_str).collect()
    };

    let mut last = None;
    for sponsor in sponsors {
        let outcome = surety
            .register_airline(candidate, airline.name.clone(), AccountId::from_label(sponsor))
            .await
            .with_context(|| format!("{sponsor} voting for {}", airline.label))?;
        match outcome {
            AdmissionOutcome::Registered | AdmissionOutcome::AlreadyRegistered => return Ok(()),
            pending => last = Some(pending),
        }
    }
    bail!("airline {} not admitted: {:?}", airline.label, last)
}

/// Request a status for every flight, moving to the next covered bucket when
/// a round ends without consensus.
async fn resolve_flights(
    surety: &FlightSurety,
    roster: &OracleRoster,
    flights: &[FlightKey],
    reports: &mut broadcast::Receiver<WorkerReport>,
    deadline: Instant,
) -> anyhow::Result<()> {
    let config = surety.config();

    for key in flights {
        let start = derive_request_bucket(config.index_seed, key, config.shard_count);
        let buckets = roster.covered_buckets(start, config.shard_count, config.min_responses)?;

        let mut resolved = false;
        for bucket in buckets {
            surety
                .request_status(key.airline, key.flight.clone(), key.timestamp, bucket)
                .await
                .with_context(|| format!("requesting status of {key}"))?;

            let report = tokio::time::timeout_at(deadline, next_report(reports, bucket, key))
                .await
                .map_err(|_| anyhow!("timed out waiting for {key} to resolve"))??;

            if report.finalized.is_some() || surety.flight(key).await?.status.is_terminal() {
                resolved = true;
                break;
            }
            info!(flight = %key, bucket, "No consensus, requesting another bucket");
        }

        if !resolved {
            bail!("oracles never agreed on a status for {key}");
        }
    }
    Ok(())
}

async fn next_report(
    reports: &mut broadcast::Receiver<WorkerReport>,
    bucket: ShardId,
    key: &FlightKey,
) -> anyhow::Result<WorkerReport> {
    loop {
        match reports.recv().await {
            Ok(report) if report.bucket == bucket && report.flight == *key => return Ok(report),
            Ok(_) => continue,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "Scenario lagged behind worker reports");
            }
            Err(broadcast::error::RecvError::Closed) => bail!("oracle worker stopped"),
        }
    }
}
