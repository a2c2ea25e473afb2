//! Oracle workers for a surety instance
//!
//! A worker holds a roster of oracle identities, listens for
//! `OracleRequest` events and has every oracle holding the requested bucket
//! report a status for the flight. Statuses come from a [`StatusSource`]:
//! random draws for simulation, or a fixed code.
//!
//! ```text
//!  FlightSurety ──OracleRequest──▶ OracleWorker ──submit_response──▶ FlightSurety
//!                                      │
//!                          OracleRoster + StatusSource
//! ```

pub mod config;
pub mod roster;
pub mod source;
pub mod worker;

pub use config::WorkerConfig;
pub use roster::OracleRoster;
pub use source::{FixedStatusSource, RandomStatusSource, StatusSource};
pub use worker::{OracleWorker, WorkerError, WorkerReport};
