//! Insurance book: one policy per (passenger, flight), premiums capped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::error::{Result, SuretyError};
use crate::flight::Flight;
use crate::types::{AccountId, Amount, FlightKey};

/// An insurance policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    /// Insured passenger
    pub passenger: AccountId,
    /// Insured flight
    pub flight: FlightKey,
    /// Premium paid
    pub premium: Amount,
    /// Purchase time
    pub purchased_at: DateTime<Utc>,
}

/// Owns every policy.
pub struct InsuranceBook {
    /// Policies per flight, in purchase order
    by_flight: HashMap<FlightKey, Vec<Policy>>,
    /// Per-purchase premium cap
    max_premium: Amount,
}

impl InsuranceBook {
    pub fn new(max_premium: Amount) -> Self {
        Self {
            by_flight: HashMap::new(),
            max_premium,
        }
    }

    /// Check that a purchase would be accepted for `flight`.
    pub fn check_purchase(&self, passenger: &AccountId, flight: &Flight, premium: Amount) -> Result<()> {
        if premium.is_zero() {
            return Err(SuretyError::InvalidInput("premium must be positive".to_string()));
        }
        if premium > self.max_premium {
            return Err(SuretyError::PremiumExceedsCap {
                premium,
                cap: self.max_premium,
            });
        }
        if self.policy(passenger, &flight.key).is_some() {
            return Err(SuretyError::DuplicatePolicy {
                passenger: *passenger,
                flight: flight.key.clone(),
            });
        }
        if flight.is_resolved() {
            return Err(SuretyError::FlightAlreadyResolved {
                flight: flight.key.clone(),
                status: flight.status,
            });
        }
        Ok(())
    }

    /// Record a policy after [`InsuranceBook::check_purchase`].
    pub fn record(&mut self, passenger: AccountId, flight: &Flight, premium: Amount) -> Result<&Policy> {
        self.check_purchase(&passenger, flight, premium)?;
        info!(passenger = %passenger, flight = %flight.key, premium = %premium, "Insurance purchased");

        let policies = self.by_flight.entry(flight.key.clone()).or_default();
        policies.push(Policy {
            passenger,
            flight: flight.key.clone(),
            premium,
            purchased_at: Utc::now(),
        });
        policies.last().ok_or_else(|| SuretyError::NotFound(flight.key.clone()))
    }

    pub fn policy(&self, passenger: &AccountId, flight: &FlightKey) -> Option<&Policy> {
        self.by_flight
            .get(flight)?
            .iter()
            .find(|p| p.passenger == *passenger)
    }

    /// Policies on a flight in purchase order.
    pub fn policies_for(&self, flight: &FlightKey) -> &[Policy] {
        self.by_flight.get(flight).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Credits owed to every policyholder of `flight` at `numerator / denominator`
    /// of their premium.
    pub fn payouts(&self, flight: &FlightKey, numerator: u64, denominator: u64) -> Result<Vec<(AccountId, Amount)>> {
        self.policies_for(flight)
            .iter()
            .map(|policy| {
                policy
                    .premium
                    .checked_mul_ratio(numerator, denominator)
                    .map(|payout| (policy.passenger, payout))
                    .ok_or_else(|| SuretyError::Overflow(format!("payout for {}", policy.passenger)))
            })
            .collect()
    }
}
