//! Outbound events and the bus that carries them to subscribers.
//!
//! Oracle workers and any UI layer learn about state changes only through
//! these events. Delivery is best effort: slow subscribers may lag and drop
//! messages, and publishing with no subscribers is not an error.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::types::{AccountId, Amount, FlightKey, OracleIndexes, ShardId, StatusCode, StatusRequestKey};

/// An event emitted by a committed surety operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SuretyEvent {
    /// Airline admitted into the governing set
    AirlineRegistered { airline: AccountId, name: String },
    /// Airline paid its registration fee
    AirlineFunded { airline: AccountId, fee: Amount },
    /// Vote recorded for a pending candidate
    AirlineVoted {
        candidate: AccountId,
        voter: AccountId,
        votes: usize,
        required: usize,
    },
    /// Flight registered by its airline
    FlightRegistered { flight: FlightKey },
    /// Policy purchased
    InsurancePurchased {
        passenger: AccountId,
        flight: FlightKey,
        premium: Amount,
    },
    /// Oracle registered with its shards
    OracleRegistered { oracle: AccountId, indexes: OracleIndexes },
    /// Status request opened; oracles holding `bucket` should respond
    OracleRequest { bucket: ShardId, flight: FlightKey },
    /// Flight status finalized
    FlightStatusInfo { flight: FlightKey, status: StatusCode },
    /// Passenger credit paid out
    CreditWithdrawn { passenger: AccountId, amount: Amount },
    /// Operational flag changed
    OperationalStatusChanged { operational: bool },
}

impl SuretyEvent {
    /// Event name as it appears in the serialized tag.
    pub fn name(&self) -> &'static str {
        match self {
            SuretyEvent::AirlineRegistered { .. } => "airline_registered",
            SuretyEvent::AirlineFunded { .. } => "airline_funded",
            SuretyEvent::AirlineVoted { .. } => "airline_voted",
            SuretyEvent::FlightRegistered { .. } => "flight_registered",
            SuretyEvent::InsurancePurchased { .. } => "insurance_purchased",
            SuretyEvent::OracleRegistered { .. } => "oracle_registered",
            SuretyEvent::OracleRequest { .. } => "oracle_request",
            SuretyEvent::FlightStatusInfo { .. } => "flight_status_info",
            SuretyEvent::CreditWithdrawn { .. } => "credit_withdrawn",
            SuretyEvent::OperationalStatusChanged { .. } => "operational_status_changed",
        }
    }

    /// The request key carried by an `OracleRequest` event.
    pub fn request_key(&self) -> Option<StatusRequestKey> {
        match self {
            SuretyEvent::OracleRequest { bucket, flight } => Some(StatusRequestKey::new(*bucket, flight.clone())),
            _ => None,
        }
    }
}

/// Broadcasts committed events to every subscriber.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<SuretyEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Subscribe to events published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SuretyEvent> {
        self.sender.subscribe()
    }

    /// Publish events in order.
    pub fn publish(&self, events: impl IntoIterator<Item = SuretyEvent>) {
        for event in events {
            debug!(event = event.name(), "Publishing event");
            // No subscribers is fine
            let _ = self.sender.send(event);
        }
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_in_order() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let airline = AccountId::from_label("oceanic");

        bus.publish([
            SuretyEvent::AirlineFunded {
                airline,
                fee: Amount::units(10),
            },
            SuretyEvent::OperationalStatusChanged { operational: false },
        ]);

        assert_eq!(rx.recv().await.unwrap().name(), "airline_funded");
        assert_eq!(
            rx.recv().await.unwrap(),
            SuretyEvent::OperationalStatusChanged { operational: false }
        );
    }

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::new(4);
        assert_eq!(bus.subscriber_count(), 0);
        bus.publish([SuretyEvent::OperationalStatusChanged { operational: true }]);
    }

    #[test]
    fn test_serialized_tag_matches_name() {
        let flight = FlightKey::new(AccountId::from_label("oceanic"), "ND1309", 1_700_000_000);
        let event = SuretyEvent::OracleRequest { bucket: 4, flight };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], event.name());
        assert_eq!(json["bucket"], 4);
        assert_eq!(event.request_key().unwrap().bucket, 4);
    }
}
