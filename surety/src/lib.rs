//! Flight Surety - flight delay insurance with oracle consensus
//!
//! Airlines govern their own membership, register flights and sell capped
//! policies. Independent oracles, sharded into buckets, report flight
//! statuses; once enough of them agree the flight is resolved and, for an
//! airline-caused delay, every policyholder is credited in the same step.
//!
//! - **Airline registry**: bootstrap admission, then majority voting
//! - **Flights and insurance**: one policy per passenger and flight
//! - **Oracle consensus**: per-bucket tallies, first quorum wins
//! - **Ledger**: withdrawable credit, debited before any payout
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        FlightSurety                          │
//! │                                                              │
//! │   RwLock<SuretyState>                                        │
//! │  ┌──────────┐ ┌─────────┐ ┌───────────┐ ┌────────────────┐   │
//! │  │ Airlines │ │ Flights │ │ Insurance │ │ Oracles        │   │
//! │  └──────────┘ └─────────┘ └───────────┘ │ + StatusRequest│   │
//! │        │            │           │       └────────────────┘   │
//! │        └────────────┴─────┬─────┴───────────────┘            │
//! │                      ┌────▼───┐                              │
//! │                      │ Ledger │                              │
//! │                      └────────┘                              │
//! │                                                              │
//! │   EventBus ──▶ subscribers        PayoutSink ──▶ withdrawals │
//! └──────────────────────────────────────────────────────────────┘
//! ```

pub mod airline;
pub mod config;
pub mod error;
pub mod events;
pub mod flight;
pub mod insurance;
pub mod ledger;
pub mod oracle;
pub mod payout;
pub mod service;
pub mod state;
pub mod types;

// Re-export main types
pub use airline::{AdmissionOutcome, Airline};
pub use config::SuretyConfig;
pub use error::{Result, SuretyError};
pub use events::{EventBus, SuretyEvent};
pub use flight::Flight;
pub use insurance::Policy;
pub use oracle::{derive_request_bucket, ResponseOutcome, StatusRequest};
pub use payout::{NoopPayout, PayoutError, PayoutSink};
pub use service::FlightSurety;
pub use state::SuretyState;
pub use types::*;
