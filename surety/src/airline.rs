//! Airline registry.
//!
//! Airlines move through `Unregistered → Pending → Registered`. Funding is a
//! separate axis: only airlines that are both registered and funded may vote
//! on candidates or register flights. Every capability check goes through
//! [`AirlineRegistry::authorize`].
//!
//! Admission is escalating: while fewer than `consensus_threshold` airlines
//! are registered, one funded sponsor admits a candidate outright. From then
//! on a candidate needs distinct votes from at least half of the registered
//! airlines (rounded up).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::{debug, info};

use crate::error::{Result, SuretyError};
use crate::types::{validate_label, AccountId, Amount};

/// Registration axis of an airline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationState {
    /// Not known to the registry
    Unregistered,
    /// Proposed and collecting votes
    Pending,
    /// Member of the governing set
    Registered,
}

/// Funding axis of an airline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundingState {
    Unfunded,
    Funded,
}

/// Actions gated on an airline's state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Capability {
    /// Propose or vote for a candidate
    Vote,
    /// Register flights
    RegisterFlight,
}

impl Capability {
    pub fn as_str(&self) -> &'static str {
        match self {
            Capability::Vote => "vote on airline admission",
            Capability::RegisterFlight => "register flights",
        }
    }
}

/// An airline record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Airline {
    /// Airline account
    pub id: AccountId,
    /// Display name, fixed by the first proposal
    pub name: String,
    /// Registration axis
    pub registration: RegistrationState,
    /// Funding axis
    pub funding: FundingState,
    /// Distinct voters backing a pending candidate
    pub votes: BTreeSet<AccountId>,
    /// When the airline joined the governing set
    pub registered_at: Option<DateTime<Utc>>,
}

impl Airline {
    fn pending(id: AccountId, name: String) -> Self {
        Self {
            id,
            name,
            registration: RegistrationState::Pending,
            funding: FundingState::Unfunded,
            votes: BTreeSet::new(),
            registered_at: None,
        }
    }

    pub fn is_registered(&self) -> bool {
        self.registration == RegistrationState::Registered
    }

    pub fn is_funded(&self) -> bool {
        self.funding == FundingState::Funded
    }
}

/// Result of a proposal or vote.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionOutcome {
    /// The candidate joined the governing set with this call
    Registered,
    /// The candidate is still collecting votes
    Pending { votes: usize, required: usize },
    /// The candidate was already a member; nothing changed
    AlreadyRegistered,
}

/// Owns every airline record.
pub struct AirlineRegistry {
    /// Airlines by account, including pending candidates
    airlines: HashMap<AccountId, Airline>,
    /// Registered airlines in registration order
    registered: Vec<AccountId>,
    /// Registered count from which admission requires votes
    consensus_threshold: usize,
}

impl AirlineRegistry {
    pub fn new(consensus_threshold: usize) -> Self {
        Self {
            airlines: HashMap::new(),
            registered: Vec::new(),
            consensus_threshold,
        }
    }

    /// Seed the registry with its first airline. Registered, not funded.
    pub fn register_genesis(&mut self, id: AccountId, name: impl Into<String>) -> Result<()> {
        if !self.airlines.is_empty() {
            return Err(SuretyError::AlreadyInitialized);
        }
        let name = name.into();
        validate_label("airline name", &name)?;

        let mut airline = Airline::pending(id, name);
        Self::admit(&mut airline);
        info!(airline = %id, name = %airline.name, "Genesis airline registered");

        self.airlines.insert(id, airline);
        self.registered.push(id);
        Ok(())
    }

    /// Check that `fund` would succeed.
    pub fn check_fund(&self, id: &AccountId, amount: Amount, fee: Amount) -> Result<()> {
        if amount < fee {
            return Err(SuretyError::InsufficientFee {
                required: fee,
                provided: amount,
            });
        }
        match self.airlines.get(id) {
            Some(airline) if airline.is_registered() => Ok(()),
            _ => Err(SuretyError::UnknownAirline(*id)),
        }
    }

    /// Mark a registered airline as funded.
    ///
    /// Returns `true` when this call moved the airline to funded; repeat
    /// funding is accepted but changes nothing.
    pub fn fund(&mut self, id: &AccountId, amount: Amount, fee: Amount) -> Result<bool> {
        self.check_fund(id, amount, fee)?;
        let airline = self
            .airlines
            .get_mut(id)
            .ok_or(SuretyError::UnknownAirline(*id))?;

        if airline.is_funded() {
            debug!(airline = %id, "Airline already funded");
            return Ok(false);
        }
        airline.funding = FundingState::Funded;
        info!(airline = %id, "Airline funded");
        Ok(true)
    }

    /// Single authorization point for airline capabilities.
    pub fn authorize(&self, id: &AccountId, capability: Capability) -> Result<()> {
        let (registration, funding) = self.state_of(id);
        match (registration, funding, capability) {
            (RegistrationState::Registered, FundingState::Funded, _) => Ok(()),
            _ => Err(SuretyError::Unauthorized {
                account: *id,
                action: capability.as_str(),
            }),
        }
    }

    /// Both axes of an airline's state; unknown accounts are unregistered and unfunded.
    pub fn state_of(&self, id: &AccountId) -> (RegistrationState, FundingState) {
        self.airlines
            .get(id)
            .map(|a| (a.registration, a.funding))
            .unwrap_or((RegistrationState::Unregistered, FundingState::Unfunded))
    }

    /// Votes a pending candidate needs at the current membership size.
    pub fn required_votes(&self) -> usize {
        self.registered.len().div_ceil(2)
    }

    /// Propose a candidate, or vote for one already pending.
    pub fn propose_and_vote(
        &mut self,
        candidate: AccountId,
        name: impl Into<String>,
        voter: AccountId,
    ) -> Result<AdmissionOutcome> {
        self.authorize(&voter, Capability::Vote)?;

        if self.airlines.get(&candidate).is_some_and(Airline::is_registered) {
            debug!(candidate = %candidate, "Candidate already registered");
            return Ok(AdmissionOutcome::AlreadyRegistered);
        }

        let name = name.into();
        if !self.airlines.contains_key(&candidate) {
            validate_label("airline name", &name)?;
        }

        let member_count = self.registered.len();
        let required = self.required_votes();
        let bootstrap = member_count < self.consensus_threshold;

        let airline = self
            .airlines
            .entry(candidate)
            .or_insert_with(|| Airline::pending(candidate, name));

        if bootstrap {
            Self::admit(airline);
        } else {
            if !airline.votes.insert(voter) {
                debug!(candidate = %candidate, voter = %voter, "Duplicate vote ignored");
            }
            let votes = airline.votes.len();
            if votes < required {
                debug!(candidate = %candidate, votes, required, "Candidate pending");
                return Ok(AdmissionOutcome::Pending { votes, required });
            }
            Self::admit(airline);
        }

        info!(
            candidate = %candidate,
            name = %airline.name,
            members = member_count + 1,
            "Airline registered"
        );
        self.registered.push(candidate);
        Ok(AdmissionOutcome::Registered)
    }

    fn admit(airline: &mut Airline) {
        airline.registration = RegistrationState::Registered;
        airline.registered_at = Some(Utc::now());
    }

    /// Look up an airline, pending candidates included.
    pub fn get(&self, id: &AccountId) -> Option<&Airline> {
        self.airlines.get(id)
    }

    /// Registered airlines in registration order.
    pub fn list_registered(&self) -> &[AccountId] {
        &self.registered
    }

    pub fn registered_count(&self) -> usize {
        self.registered.len()
    }
}
