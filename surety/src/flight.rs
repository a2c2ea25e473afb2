//! Flight registry.
//!
//! Flights are keyed by (airline, code, departure time). Status starts
//! `Unknown` and is resolved at most once.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

use crate::error::{Result, SuretyError};
use crate::types::{FlightKey, StatusCode};

/// A registered flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flight {
    /// Flight key
    pub key: FlightKey,
    /// Current status
    pub status: StatusCode,
    /// When the airline registered the flight
    pub registered_at: DateTime<Utc>,
    /// When the status was resolved
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Flight {
    pub fn is_resolved(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Owns every flight record.
#[derive(Default)]
pub struct FlightRegistry {
    flights: HashMap<FlightKey, Flight>,
    /// Keys in registration order
    order: Vec<FlightKey>,
}

impl FlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check that `key` is free.
    pub fn check_register(&self, key: &FlightKey) -> Result<()> {
        if self.flights.contains_key(key) {
            return Err(SuretyError::DuplicateFlight(key.clone()));
        }
        Ok(())
    }

    /// Record a new flight with `Unknown` status.
    ///
    /// Authorization against the airline registry is the caller's job.
    pub fn register(&mut self, key: FlightKey) -> Result<&Flight> {
        self.check_register(&key)?;
        info!(flight = %key, "Flight registered");

        let flight = Flight {
            key: key.clone(),
            status: StatusCode::Unknown,
            registered_at: Utc::now(),
            resolved_at: None,
        };
        self.order.push(key.clone());
        Ok(self.flights.entry(key).or_insert(flight))
    }

    pub fn get(&self, key: &FlightKey) -> Result<&Flight> {
        self.flights
            .get(key)
            .ok_or_else(|| SuretyError::NotFound(key.clone()))
    }

    /// Fetch a flight that has not been resolved yet.
    pub fn get_unresolved(&self, key: &FlightKey) -> Result<&Flight> {
        let flight = self.get(key)?;
        if flight.is_resolved() {
            return Err(SuretyError::FlightAlreadyResolved {
                flight: key.clone(),
                status: flight.status,
            });
        }
        Ok(flight)
    }

    /// Move an unresolved flight to a terminal status.
    ///
    /// Returns `false` and leaves the flight untouched when it was already
    /// resolved; the first status to arrive wins.
    pub fn resolve(&mut self, key: &FlightKey, status: StatusCode) -> Result<bool> {
        if !status.is_terminal() {
            return Err(SuretyError::InvalidInput(
                "flights can only resolve to a terminal status".to_string(),
            ));
        }
        let flight = self
            .flights
            .get_mut(key)
            .ok_or_else(|| SuretyError::NotFound(key.clone()))?;
        if flight.is_resolved() {
            return Ok(false);
        }

        flight.status = status;
        flight.resolved_at = Some(Utc::now());
        info!(flight = %key, status = %status, "Flight status resolved");
        Ok(true)
    }

    /// Flight keys in registration order.
    pub fn list(&self) -> &[FlightKey] {
        &self.order
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AccountId;

    fn key(code: &str) -> FlightKey {
        FlightKey::new(AccountId::from_label("oceanic"), code, 1_700_000_000)
    }

    #[test]
    fn test_register_and_get() {
        let mut registry = FlightRegistry::new();
        registry.register(key("815")).unwrap();

        let flight = registry.get(&key("815")).unwrap();
        assert_eq!(flight.key, key("815"));
        assert_eq!(flight.status, StatusCode::Unknown);
        assert!(flight.resolved_at.is_none());

        assert_eq!(
            registry.register(key("815")).unwrap_err(),
            SuretyError::DuplicateFlight(key("815"))
        );
        assert_eq!(
            registry.get(&key("337")).unwrap_err(),
            SuretyError::NotFound(key("337"))
        );
    }

    #[test]
    fn test_same_code_different_time_is_distinct() {
        let mut registry = FlightRegistry::new();
        let airline = AccountId::from_label("oceanic");
        registry.register(FlightKey::new(airline, "815", 1)).unwrap();
        registry.register(FlightKey::new(airline, "815", 2)).unwrap();
        assert_eq!(registry.list().len(), 2);
    }

    #[test]
    fn test_resolve_once() {
        let mut registry = FlightRegistry::new();
        registry.register(key("2490")).unwrap();

        assert_eq!(registry.resolve(&key("2490"), StatusCode::LateWeather), Ok(true));
        assert_eq!(registry.resolve(&key("2490"), StatusCode::OnTime), Ok(false));
        assert_eq!(registry.get(&key("2490")).unwrap().status, StatusCode::LateWeather);
        assert!(matches!(
            registry.get_unresolved(&key("2490")),
            Err(SuretyError::FlightAlreadyResolved { status: StatusCode::LateWeather, .. })
        ));
    }

    #[test]
    fn test_resolve_rejects_unknown_status() {
        let mut registry = FlightRegistry::new();
        registry.register(key("2491")).unwrap();
        assert!(registry.resolve(&key("2491"), StatusCode::Unknown).is_err());
    }

    #[test]
    fn test_list_keeps_registration_order() {
        let mut registry = FlightRegistry::new();
        for code in ["815", "337", "2490", "2491"] {
            registry.register(key(code)).unwrap();
        }
        let codes: Vec<&str> = registry.list().iter().map(|k| k.flight.as_str()).collect();
        assert_eq!(codes, vec!["815", "337", "2490", "2491"]);
    }
}
