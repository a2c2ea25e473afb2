//! The surety state machine.
//!
//! [`SuretyState`] composes the ledger, registries, insurance book and request
//! book, and exposes every command as a method that either commits all of its
//! effects or returns an error having changed nothing. Each command validates
//! first and mutates last. Events are buffered per command and drained by the
//! caller with [`SuretyState::take_events`] once the command has committed.
//!
//! Finalization of a status request is the one multi-entity mutation: the
//! deciding vote, the request's finalized flag, the flight status and every
//! policyholder credit are planned together and applied together.

use tracing::{debug, info, warn};

use crate::airline::{AdmissionOutcome, Airline, AirlineRegistry, Capability};
use crate::config::SuretyConfig;
use crate::error::{Result, SuretyError};
use crate::events::SuretyEvent;
use crate::flight::{Flight, FlightRegistry};
use crate::insurance::{InsuranceBook, Policy};
use crate::ledger::Ledger;
use crate::oracle::{Oracle, OracleRegistry, RequestBook, ResponseOutcome, StatusRequest};
use crate::types::{
    validate_label, AccountId, Amount, FlightKey, OracleIndexes, ShardId, StatusCode, StatusRequestKey,
};

/// All surety state, owned by one process-wide context.
pub struct SuretyState {
    config: SuretyConfig,
    /// Genesis account; the only one allowed to pause the system
    owner: AccountId,
    operational: bool,
    ledger: Ledger,
    airlines: AirlineRegistry,
    flights: FlightRegistry,
    insurance: InsuranceBook,
    oracles: OracleRegistry,
    requests: RequestBook,
    /// Events of the command in progress
    events: Vec<SuretyEvent>,
}

impl SuretyState {
    /// Initialize the state with its genesis airline.
    pub fn genesis(config: SuretyConfig, owner: AccountId, name: impl Into<String>) -> Result<Self> {
        config.validate()?;
        let name = name.into();

        let mut airlines = AirlineRegistry::new(config.consensus_threshold);
        airlines.register_genesis(owner, name.clone())?;

        info!(
            instance_id = %config.instance_id,
            owner = %owner,
            "Surety state initialized"
        );

        Ok(Self {
            owner,
            operational: true,
            ledger: Ledger::new(),
            airlines,
            flights: FlightRegistry::new(),
            insurance: InsuranceBook::new(config.max_premium),
            oracles: OracleRegistry::new(config.index_seed, config.shard_count),
            requests: RequestBook::new(),
            events: vec![SuretyEvent::AirlineRegistered { airline: owner, name }],
            config,
        })
    }

    /// Drain events buffered since the last call.
    pub fn take_events(&mut self) -> Vec<SuretyEvent> {
        std::mem::take(&mut self.events)
    }

    fn ensure_operational(&self) -> Result<()> {
        if self.operational {
            Ok(())
        } else {
            Err(SuretyError::SystemPaused)
        }
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    /// Pause or resume every mutating command. Owner only.
    pub fn set_operational(&mut self, caller: AccountId, operational: bool) -> Result<()> {
        if caller != self.owner {
            return Err(SuretyError::Unauthorized {
                account: caller,
                action: "change operational status",
            });
        }
        if self.operational != operational {
            self.operational = operational;
            info!(operational, "Operational status changed");
            self.events.push(SuretyEvent::OperationalStatusChanged { operational });
        }
        Ok(())
    }

    /// Pay the registration fee for a registered airline.
    ///
    /// Returns `true` when this call funded the airline. Funding twice is
    /// accepted and collects nothing the second time.
    pub fn fund_airline(&mut self, airline: AccountId, amount: Amount) -> Result<bool> {
        self.ensure_operational()?;
        self.airlines.check_fund(&airline, amount, self.config.registration_fee)?;
        self.ledger.ensure_collectable(amount)?;

        let newly_funded = self.airlines.fund(&airline, amount, self.config.registration_fee)?;
        if newly_funded {
            self.ledger.collect(amount)?;
            self.events.push(SuretyEvent::AirlineFunded { airline, fee: amount });
        }
        Ok(newly_funded)
    }

    /// Propose a candidate airline or vote for a pending one.
    pub fn propose_airline(
        &mut self,
        candidate: AccountId,
        name: impl Into<String>,
        voter: AccountId,
    ) -> Result<AdmissionOutcome> {
        self.ensure_operational()?;
        let outcome = self.airlines.propose_and_vote(candidate, name, voter)?;

        match outcome {
            AdmissionOutcome::Registered => {
                let name = self
                    .airlines
                    .get(&candidate)
                    .map(|a| a.name.clone())
                    .unwrap_or_default();
                self.events.push(SuretyEvent::AirlineRegistered { airline: candidate, name });
            }
            AdmissionOutcome::Pending { votes, required } => {
                self.events.push(SuretyEvent::AirlineVoted {
                    candidate,
                    voter,
                    votes,
                    required,
                });
            }
            AdmissionOutcome::AlreadyRegistered => {}
        }
        Ok(outcome)
    }

    /// Register a flight. The caller must be the funded airline itself.
    pub fn register_flight(
        &mut self,
        airline: AccountId,
        flight: impl Into<String>,
        timestamp: u64,
        caller: AccountId,
    ) -> Result<FlightKey> {
        self.ensure_operational()?;
        if caller != airline {
            return Err(SuretyError::Unauthorized {
                account: caller,
                action: "register flights for another airline",
            });
        }
        self.airlines.authorize(&airline, Capability::RegisterFlight)?;

        let flight = flight.into();
        validate_label("flight code", &flight)?;
        let key = FlightKey::new(airline, flight, timestamp);
        self.flights.register(key.clone())?;

        self.events.push(SuretyEvent::FlightRegistered { flight: key.clone() });
        Ok(key)
    }

    /// Buy a policy on an unresolved flight.
    pub fn buy_insurance(&mut self, passenger: AccountId, flight: &FlightKey, premium: Amount) -> Result<()> {
        self.ensure_operational()?;
        let record = self.flights.get(flight)?;
        self.insurance.check_purchase(&passenger, record, premium)?;
        self.ledger.ensure_collectable(premium)?;

        self.insurance.record(passenger, record, premium)?;
        self.ledger.collect(premium)?;

        self.events.push(SuretyEvent::InsurancePurchased {
            passenger,
            flight: flight.clone(),
            premium,
        });
        Ok(())
    }

    /// Register an oracle and assign its shards.
    pub fn register_oracle(&mut self, oracle: AccountId, fee: Amount) -> Result<OracleIndexes> {
        self.ensure_operational()?;
        if fee < self.config.oracle_fee {
            return Err(SuretyError::InsufficientFee {
                required: self.config.oracle_fee,
                provided: fee,
            });
        }
        self.oracles.check_register(&oracle)?;
        self.ledger.ensure_collectable(fee)?;

        let indexes = self.oracles.register(oracle)?;
        self.ledger.collect(fee)?;

        self.events.push(SuretyEvent::OracleRegistered { oracle, indexes });
        Ok(indexes)
    }

    /// Open a status request for a flight, or re-announce an open one.
    pub fn request_status(
        &mut self,
        airline: AccountId,
        flight: impl Into<String>,
        timestamp: u64,
        bucket: ShardId,
    ) -> Result<StatusRequestKey> {
        self.ensure_operational()?;
        if u16::from(bucket) >= self.oracles.shard_count() {
            return Err(SuretyError::InvalidInput(format!(
                "bucket {bucket} outside shard space 0..{}",
                self.oracles.shard_count()
            )));
        }
        let flight = FlightKey::new(airline, flight, timestamp);
        self.flights.get_unresolved(&flight)?;

        let key = StatusRequestKey::new(bucket, flight);
        if self.requests.open(key.clone()) {
            info!(request = %key, "Status request opened");
        } else {
            debug!(request = %key, "Status request re-announced");
        }

        self.events.push(SuretyEvent::OracleRequest {
            bucket,
            flight: key.flight.clone(),
        });
        Ok(key)
    }

    /// Count an oracle's status report, finalizing and settling at quorum.
    pub fn submit_response(
        &mut self,
        oracle: AccountId,
        index: ShardId,
        airline: AccountId,
        flight: impl Into<String>,
        timestamp: u64,
        status: StatusCode,
    ) -> Result<ResponseOutcome> {
        self.ensure_operational()?;
        if !status.is_terminal() {
            return Err(SuretyError::InvalidInput("oracles must report a terminal status".to_string()));
        }
        self.oracles.ensure_assigned(&oracle, index)?;

        let key = StatusRequestKey::new(index, FlightKey::new(airline, flight, timestamp));
        let quorum = self.config.min_responses;
        let request = self
            .requests
            .get(&key)
            .ok_or_else(|| SuretyError::NoOpenRequest(key.clone()))?;

        if request.is_finalized() {
            debug!(request = %key, oracle = %oracle, "Late response ignored");
            return Ok(ResponseOutcome::Late);
        }
        if request.has_voted(&oracle) {
            debug!(request = %key, oracle = %oracle, "Duplicate response ignored");
            return Ok(ResponseOutcome::Duplicate);
        }

        if !request.reaches_quorum_with(status, quorum) {
            let votes = self.open_request_mut(&key)?.record(oracle, status);
            debug!(request = %key, oracle = %oracle, status = %status, votes, "Response recorded");
            return Ok(ResponseOutcome::Recorded { votes, required: quorum });
        }

        // Plan the finalization before touching any state
        let resolves_flight = !self.flights.get(&key.flight)?.is_resolved();
        let credits = if resolves_flight && status.pays_out() {
            self.insurance.payouts(
                &key.flight,
                self.config.payout_numerator,
                self.config.payout_denominator,
            )?
        } else {
            Vec::new()
        };
        for (passenger, amount) in &credits {
            self.ledger.ensure_creditable(passenger, *amount)?;
        }

        // Commit
        let request = self.open_request_mut(&key)?;
        request.record(oracle, status);
        request.finalize(status);

        if resolves_flight {
            self.flights.resolve(&key.flight, status)?;
            for (passenger, amount) in &credits {
                self.ledger.credit(*passenger, *amount)?;
                info!(passenger = %passenger, amount = %amount, flight = %key.flight, "Policy settled");
            }
            self.events.push(SuretyEvent::FlightStatusInfo {
                flight: key.flight.clone(),
                status,
            });
        } else {
            warn!(request = %key, status = %status, "Request finalized on an already resolved flight");
        }

        info!(
            request = %key,
            status = %status,
            credited = credits.len(),
            "Status request finalized"
        );
        Ok(ResponseOutcome::Finalized {
            status,
            resolved_flight: resolves_flight,
            credited: credits.len(),
        })
    }

    fn open_request_mut(&mut self, key: &StatusRequestKey) -> Result<&mut StatusRequest> {
        self.requests
            .get_mut(key)
            .ok_or_else(|| SuretyError::NoOpenRequest(key.clone()))
    }

    /// Take credit out of a passenger's balance ahead of an external payout.
    /// Returns the remaining credit.
    pub fn begin_withdrawal(&mut self, passenger: AccountId, amount: Amount) -> Result<Amount> {
        self.ensure_operational()?;
        let remaining = self.ledger.debit(&passenger, amount)?;
        info!(passenger = %passenger, amount = %amount, remaining = %remaining, "Credit debited for withdrawal");
        Ok(remaining)
    }

    /// Put back credit whose payout failed.
    pub fn restore_withdrawal(&mut self, passenger: AccountId, amount: Amount) -> Result<()> {
        warn!(passenger = %passenger, amount = %amount, "Restoring credit after failed payout");
        self.ledger.credit(passenger, amount)?;
        Ok(())
    }

    /// Announce a completed payout.
    pub fn complete_withdrawal(&mut self, passenger: AccountId, amount: Amount) {
        self.events.push(SuretyEvent::CreditWithdrawn { passenger, amount });
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn config(&self) -> &SuretyConfig {
        &self.config
    }

    pub fn owner(&self) -> AccountId {
        self.owner
    }

    pub fn is_operational(&self) -> bool {
        self.operational
    }

    pub fn airline(&self, id: &AccountId) -> Option<&Airline> {
        self.airlines.get(id)
    }

    /// Registered airlines in registration order.
    pub fn registered_airlines(&self) -> &[AccountId] {
        self.airlines.list_registered()
    }

    pub fn flight(&self, key: &FlightKey) -> Result<&Flight> {
        self.flights.get(key)
    }

    /// Flight keys in registration order.
    pub fn flights(&self) -> &[FlightKey] {
        self.flights.list()
    }

    pub fn balance(&self, account: &AccountId) -> Amount {
        self.ledger.balance(account)
    }

    /// Fees and premiums collected so far.
    pub fn collected(&self) -> Amount {
        self.ledger.collected()
    }

    pub fn oracle(&self, id: &AccountId) -> Result<&Oracle> {
        self.oracles.get(id)
    }

    pub fn oracle_indexes(&self, id: &AccountId) -> Result<OracleIndexes> {
        self.oracles.indexes(id)
    }

    pub fn policy(&self, passenger: &AccountId, flight: &FlightKey) -> Option<&Policy> {
        self.insurance.policy(passenger, flight)
    }

    pub fn policies_for(&self, flight: &FlightKey) -> &[Policy] {
        self.insurance.policies_for(flight)
    }

    pub fn status_request(&self, key: &StatusRequestKey) -> Option<&StatusRequest> {
        self.requests.get(key)
    }

    /// Requests still collecting responses.
    pub fn open_requests(&self) -> Vec<&StatusRequest> {
        self.requests.open_requests()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    const T: u64 = 1_700_000_000;

    fn genesis() -> AccountId {
        AccountId::from_label("oceanic")
    }

    /// Genesis airline funded, flight ND1309 registered.
    fn setup() -> (SuretyState, FlightKey) {
        let mut state = SuretyState::genesis(SuretyConfig::new("test"), genesis(), "Oceanic Airlines").unwrap();
        state.fund_airline(genesis(), Amount::units(10)).unwrap();
        let key = state.register_flight(genesis(), "ND1309", T, genesis()).unwrap();
        state.take_events();
        (state, key)
    }

    /// Register twenty oracles and return a bucket held by at least `count` of them.
    fn oracles_on_bucket(state: &mut SuretyState, count: usize) -> (ShardId, Vec<AccountId>) {
        let ids: Vec<AccountId> = (0..20)
            .map(|i| AccountId::from_label(&format!("oracle-{i}")))
            .collect();
        for id in &ids {
            state.register_oracle(*id, Amount::units(1)).unwrap();
        }
        for bucket in 0..10 {
            let holders: Vec<AccountId> = ids
                .iter()
                .filter(|id| state.oracle_indexes(id).unwrap().contains(&bucket))
                .copied()
                .collect();
            if holders.len() >= count {
                return (bucket, holders);
            }
        }
        panic!("no bucket held by {count} oracles");
    }

    fn respond(
        state: &mut SuretyState,
        oracle: AccountId,
        bucket: ShardId,
        key: &FlightKey,
        status: StatusCode,
    ) -> Result<ResponseOutcome> {
        state.submit_response(oracle, bucket, key.airline, key.flight.clone(), key.timestamp, status)
    }

    #[test]
    fn test_genesis_event_and_owner() {
        let mut state = SuretyState::genesis(SuretyConfig::default(), genesis(), "Oceanic Airlines").unwrap();
        assert_eq!(state.owner(), genesis());
        assert!(state.is_operational());
        assert_eq!(state.registered_airlines(), &[genesis()]);
        assert_eq!(
            state.take_events(),
            vec![SuretyEvent::AirlineRegistered {
                airline: genesis(),
                name: "Oceanic Airlines".to_string(),
            }]
        );
        assert!(state.take_events().is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = SuretyConfig::default();
        config.shard_count = 0;
        assert!(matches!(
            SuretyState::genesis(config, genesis(), "Oceanic Airlines"),
            Err(SuretyError::Config(_))
        ));
    }

    #[test]
    fn test_fund_collects_once() {
        let mut state = SuretyState::genesis(SuretyConfig::default(), genesis(), "Oceanic Airlines").unwrap();
        assert_eq!(state.fund_airline(genesis(), Amount::units(12)), Ok(true));
        assert_eq!(state.fund_airline(genesis(), Amount::units(10)), Ok(false));
        assert_eq!(state.collected(), Amount::units(12));
        let funded: Vec<_> = state
            .take_events()
            .into_iter()
            .filter(|e| matches!(e, SuretyEvent::AirlineFunded { .. }))
            .collect();
        assert_eq!(funded.len(), 1);
    }

    #[test]
    fn test_unfunded_airline_cannot_register_flight() {
        let mut state = SuretyState::genesis(SuretyConfig::default(), genesis(), "Oceanic Airlines").unwrap();
        assert!(matches!(
            state.register_flight(genesis(), "815", T, genesis()),
            Err(SuretyError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_flight_registration_rules() {
        let (mut state, key) = setup();

        // Someone else registering on the airline's behalf
        let stranger = AccountId::from_label("stranger");
        assert!(matches!(
            state.register_flight(genesis(), "337", T, stranger),
            Err(SuretyError::Unauthorized { .. })
        ));
        assert_eq!(
            state.register_flight(genesis(), "ND1309", T, genesis()),
            Err(SuretyError::DuplicateFlight(key.clone()))
        );
        assert!(matches!(
            state.register_flight(genesis(), "", T, genesis()),
            Err(SuretyError::InvalidInput(_))
        ));

        let flight = state.flight(&key).unwrap();
        assert_eq!(flight.key, FlightKey::new(genesis(), "ND1309", T));
        assert_eq!(flight.status, StatusCode::Unknown);
        assert_eq!(state.flights(), &[key]);
    }

    #[test]
    fn test_buy_insurance_rules() {
        let (mut state, key) = setup();
        let passenger = AccountId::from_label("passenger");

        let missing = FlightKey::new(genesis(), "0000", T);
        assert_eq!(
            state.buy_insurance(passenger, &missing, Amount::units(1)),
            Err(SuretyError::NotFound(missing))
        );
        assert!(matches!(
            state.buy_insurance(passenger, &key, Amount::units(2)),
            Err(SuretyError::PremiumExceedsCap { .. })
        ));
        assert_ok!(state.buy_insurance(passenger, &key, Amount::units(1)));
        assert!(matches!(
            state.buy_insurance(passenger, &key, Amount::units(1)),
            Err(SuretyError::DuplicatePolicy { .. })
        ));
        assert_eq!(state.collected(), Amount::units(11));
        assert_eq!(state.policies_for(&key).len(), 1);
    }

    #[test]
    fn test_register_oracle_rules() {
        let (mut state, _) = setup();
        let oracle = AccountId::from_label("oracle");

        assert!(matches!(
            state.register_oracle(oracle, "0.5".parse().unwrap()),
            Err(SuretyError::InsufficientFee { .. })
        ));
        let indexes = state.register_oracle(oracle, Amount::units(1)).unwrap();
        assert!(indexes.iter().all(|i| *i < 10));
        assert_eq!(state.oracle_indexes(&oracle), Ok(indexes));
        assert_eq!(
            state.register_oracle(oracle, Amount::units(1)),
            Err(SuretyError::DuplicateOracle(oracle))
        );
        let stranger = AccountId::from_label("stranger");
        assert_eq!(state.oracle_indexes(&stranger), Err(SuretyError::UnknownOracle(stranger)));
        assert_eq!(
            state.take_events(),
            vec![SuretyEvent::OracleRegistered { oracle, indexes }]
        );
    }

    #[test]
    fn test_request_status_rules() {
        let (mut state, key) = setup();

        assert!(matches!(
            state.request_status(genesis(), "ND1309", T, 10),
            Err(SuretyError::InvalidInput(_))
        ));
        assert!(matches!(
            state.request_status(genesis(), "0000", T, 1),
            Err(SuretyError::NotFound(_))
        ));

        let request = state.request_status(genesis(), "ND1309", T, 1).unwrap();
        assert_eq!(request, StatusRequestKey::new(1, key.clone()));
        // Reopening reuses the request and announces it again
        state.request_status(genesis(), "ND1309", T, 1).unwrap();
        assert_eq!(state.open_requests().len(), 1);
        let announcements = state
            .take_events()
            .into_iter()
            .filter(|e| e.request_key() == Some(request.clone()))
            .count();
        assert_eq!(announcements, 2);
    }

    #[test]
    fn test_submit_response_errors() {
        let (mut state, key) = setup();
        let (bucket, holders) = oracles_on_bucket(&mut state, 1);
        let oracle = holders[0];
        let indexes = state.oracle_indexes(&oracle).unwrap();
        let unassigned = (0..10).find(|i| !indexes.contains(i)).unwrap();

        let stranger = AccountId::from_label("stranger");
        assert_eq!(
            respond(&mut state, stranger, bucket, &key, StatusCode::OnTime),
            Err(SuretyError::UnknownOracle(stranger))
        );
        assert_eq!(
            respond(&mut state, oracle, unassigned, &key, StatusCode::OnTime),
            Err(SuretyError::IndexNotAssigned { oracle, index: unassigned })
        );
        assert_eq!(
            respond(&mut state, oracle, bucket, &key, StatusCode::OnTime),
            Err(SuretyError::NoOpenRequest(StatusRequestKey::new(bucket, key.clone())))
        );

        state.request_status(genesis(), "ND1309", T, bucket).unwrap();
        assert!(matches!(
            respond(&mut state, oracle, bucket, &key, StatusCode::Unknown),
            Err(SuretyError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_quorum_finalizes_once() {
        let (mut state, key) = setup();
        let (bucket, holders) = oracles_on_bucket(&mut state, 4);
        state.request_status(genesis(), "ND1309", T, bucket).unwrap();

        assert_eq!(
            respond(&mut state, holders[0], bucket, &key, StatusCode::OnTime),
            Ok(ResponseOutcome::Recorded { votes: 1, required: 3 })
        );
        assert_eq!(
            respond(&mut state, holders[0], bucket, &key, StatusCode::OnTime),
            Ok(ResponseOutcome::Duplicate)
        );
        // A second code from the same oracle is still a duplicate
        assert_eq!(
            respond(&mut state, holders[0], bucket, &key, StatusCode::LateOther),
            Ok(ResponseOutcome::Duplicate)
        );
        assert_eq!(
            respond(&mut state, holders[1], bucket, &key, StatusCode::OnTime),
            Ok(ResponseOutcome::Recorded { votes: 2, required: 3 })
        );
        assert_eq!(
            respond(&mut state, holders[2], bucket, &key, StatusCode::OnTime),
            Ok(ResponseOutcome::Finalized {
                status: StatusCode::OnTime,
                resolved_flight: true,
                credited: 0,
            })
        );
        assert_eq!(state.flight(&key).unwrap().status, StatusCode::OnTime);

        assert_eq!(
            respond(&mut state, holders[3], bucket, &key, StatusCode::LateAirline),
            Ok(ResponseOutcome::Late)
        );
        assert_eq!(state.flight(&key).unwrap().status, StatusCode::OnTime);

        let infos = state
            .take_events()
            .into_iter()
            .filter(|e| matches!(e, SuretyEvent::FlightStatusInfo { .. }))
            .count();
        assert_eq!(infos, 1);
    }

    #[test]
    fn test_split_votes_need_agreement() {
        let (mut state, key) = setup();
        let (bucket, holders) = oracles_on_bucket(&mut state, 4);
        state.request_status(genesis(), "ND1309", T, bucket).unwrap();

        respond(&mut state, holders[0], bucket, &key, StatusCode::OnTime).unwrap();
        respond(&mut state, holders[1], bucket, &key, StatusCode::LateWeather).unwrap();
        respond(&mut state, holders[2], bucket, &key, StatusCode::OnTime).unwrap();
        assert_eq!(state.flight(&key).unwrap().status, StatusCode::Unknown);

        let request = state.status_request(&StatusRequestKey::new(bucket, key.clone())).unwrap();
        assert_eq!(request.votes_for(StatusCode::OnTime), 2);
        assert_eq!(request.votes_for(StatusCode::LateWeather), 1);

        respond(&mut state, holders[3], bucket, &key, StatusCode::OnTime).unwrap();
        assert_eq!(state.flight(&key).unwrap().status, StatusCode::OnTime);
    }

    #[test]
    fn test_late_airline_settles_policyholders() {
        let (mut state, key) = setup();
        let other = state.register_flight(genesis(), "815", T, genesis()).unwrap();
        let p1 = AccountId::from_label("p1");
        let p2 = AccountId::from_label("p2");
        let p3 = AccountId::from_label("p3");
        state.buy_insurance(p1, &key, Amount::units(1)).unwrap();
        state.buy_insurance(p2, &key, "0.5".parse().unwrap()).unwrap();
        state.buy_insurance(p3, &other, Amount::units(1)).unwrap();

        let (bucket, holders) = oracles_on_bucket(&mut state, 3);
        state.request_status(genesis(), "ND1309", T, bucket).unwrap();
        for oracle in &holders[..3] {
            respond(&mut state, *oracle, bucket, &key, StatusCode::LateAirline).unwrap();
        }

        assert_eq!(state.flight(&key).unwrap().status, StatusCode::LateAirline);
        assert_eq!(state.balance(&p1), "1.5".parse().unwrap());
        assert_eq!(state.balance(&p2), "0.75".parse().unwrap());
        assert_eq!(state.balance(&p3), Amount::ZERO);
        assert_eq!(state.flight(&other).unwrap().status, StatusCode::Unknown);
    }

    #[test]
    fn test_non_airline_delay_pays_nothing() {
        for status in [
            StatusCode::OnTime,
            StatusCode::LateWeather,
            StatusCode::LateTechnical,
            StatusCode::LateOther,
        ] {
            let (mut state, key) = setup();
            let passenger = AccountId::from_label("passenger");
            state.buy_insurance(passenger, &key, Amount::units(1)).unwrap();

            let (bucket, holders) = oracles_on_bucket(&mut state, 3);
            state.request_status(genesis(), "ND1309", T, bucket).unwrap();
            for oracle in &holders[..3] {
                respond(&mut state, *oracle, bucket, &key, status).unwrap();
            }
            assert_eq!(state.flight(&key).unwrap().status, status);
            assert_eq!(state.balance(&passenger), Amount::ZERO);
        }
    }

    #[test]
    fn test_settlement_overflow_rolls_back() {
        let mut config = SuretyConfig::new("overflow");
        config.max_premium = Amount::from_wei(u128::MAX);
        let mut state = SuretyState::genesis(config, genesis(), "Oceanic Airlines").unwrap();
        state.fund_airline(genesis(), Amount::units(10)).unwrap();
        let key = state.register_flight(genesis(), "ND1309", T, genesis()).unwrap();

        let whale = AccountId::from_label("whale");
        state.buy_insurance(whale, &key, Amount::from_wei(u128::MAX / 2)).unwrap();

        let (bucket, holders) = oracles_on_bucket(&mut state, 3);
        state.request_status(genesis(), "ND1309", T, bucket).unwrap();
        respond(&mut state, holders[0], bucket, &key, StatusCode::LateAirline).unwrap();
        respond(&mut state, holders[1], bucket, &key, StatusCode::LateAirline).unwrap();
        state.take_events();

        let result = respond(&mut state, holders[2], bucket, &key, StatusCode::LateAirline);
        assert!(matches!(result, Err(SuretyError::Overflow(_))));

        // Nothing of the deciding call survived
        let request = state.status_request(&StatusRequestKey::new(bucket, key.clone())).unwrap();
        assert!(!request.is_finalized());
        assert!(!request.has_voted(&holders[2]));
        assert_eq!(request.votes_for(StatusCode::LateAirline), 2);
        assert_eq!(state.flight(&key).unwrap().status, StatusCode::Unknown);
        assert_eq!(state.balance(&whale), Amount::ZERO);
        assert!(state.take_events().is_empty());
    }

    #[test]
    fn test_second_bucket_quorum_is_inert() {
        let (mut state, key) = setup();
        let passenger = AccountId::from_label("passenger");
        state.buy_insurance(passenger, &key, Amount::units(1)).unwrap();

        let ids: Vec<AccountId> = (0..20)
            .map(|i| AccountId::from_label(&format!("oracle-{i}")))
            .collect();
        for id in &ids {
            state.register_oracle(*id, Amount::units(1)).unwrap();
        }
        let holders_of = |state: &SuretyState, bucket: ShardId| -> Vec<AccountId> {
            ids.iter()
                .filter(|id| state.oracle_indexes(id).unwrap().contains(&bucket))
                .copied()
                .collect()
        };
        let buckets: Vec<ShardId> = (0..10).filter(|b| holders_of(&state, *b).len() >= 3).collect();
        assert!(buckets.len() >= 2, "need two well-covered buckets");
        let (first, second) = (buckets[0], buckets[1]);

        state.request_status(genesis(), "ND1309", T, first).unwrap();
        state.request_status(genesis(), "ND1309", T, second).unwrap();

        let second_holders = holders_of(&state, second);
        for oracle in &second_holders[..2] {
            respond(&mut state, *oracle, second, &key, StatusCode::LateAirline).unwrap();
        }
        for oracle in &holders_of(&state, first)[..3] {
            respond(&mut state, *oracle, first, &key, StatusCode::OnTime).unwrap();
        }
        assert_eq!(state.flight(&key).unwrap().status, StatusCode::OnTime);

        let outcome = respond(&mut state, second_holders[2], second, &key, StatusCode::LateAirline);
        assert_eq!(
            outcome,
            Ok(ResponseOutcome::Finalized {
                status: StatusCode::LateAirline,
                resolved_flight: false,
                credited: 0,
            })
        );
        assert_eq!(state.flight(&key).unwrap().status, StatusCode::OnTime);
        assert_eq!(state.balance(&passenger), Amount::ZERO);
    }

    #[test]
    fn test_withdrawal_bookkeeping() {
        let (mut state, _) = setup();
        let passenger = AccountId::from_label("passenger");
        assert!(matches!(
            state.begin_withdrawal(passenger, Amount::units(1)),
            Err(SuretyError::InsufficientBalance { .. })
        ));

        state.ledger.credit(passenger, "1.5".parse().unwrap()).unwrap();
        assert_eq!(state.begin_withdrawal(passenger, Amount::units(1)), Ok("0.5".parse().unwrap()));
        assert_ok!(state.restore_withdrawal(passenger, Amount::units(1)));
        assert_eq!(state.balance(&passenger), "1.5".parse().unwrap());
    }

    #[test]
    fn test_restore_withdrawal_overflow_rejected() {
        let (mut state, _) = setup();
        let passenger = AccountId::from_label("whale");
        state.ledger.credit(passenger, Amount::from_wei(u128::MAX)).unwrap();

        let err = assert_err!(state.restore_withdrawal(passenger, Amount::from_wei(1)));
        assert!(matches!(err, SuretyError::Overflow(_)));
        assert_eq!(state.balance(&passenger), Amount::from_wei(u128::MAX));
    }

    #[test]
    fn test_pause_gates_mutations_only() {
        let (mut state, key) = setup();
        let stranger = AccountId::from_label("stranger");

        assert!(matches!(
            state.set_operational(stranger, false),
            Err(SuretyError::Unauthorized { .. })
        ));
        state.set_operational(genesis(), false).unwrap();
        assert!(!state.is_operational());

        let passenger = AccountId::from_label("passenger");
        assert_eq!(
            state.buy_insurance(passenger, &key, Amount::units(1)),
            Err(SuretyError::SystemPaused)
        );
        assert_eq!(
            state.register_oracle(AccountId::from_label("o"), Amount::units(1)),
            Err(SuretyError::SystemPaused)
        );
        assert_eq!(
            state.request_status(genesis(), "ND1309", T, 0),
            Err(SuretyError::SystemPaused)
        );
        assert_eq!(state.fund_airline(genesis(), Amount::units(10)), Err(SuretyError::SystemPaused));

        // Queries still work
        assert_eq!(state.flight(&key).unwrap().status, StatusCode::Unknown);
        assert_eq!(state.balance(&passenger), Amount::ZERO);

        state.set_operational(genesis(), true).unwrap();
        assert_ok!(state.buy_insurance(passenger, &key, Amount::units(1)));
    }
}
