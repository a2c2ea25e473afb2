//! Oracle consensus engine.
//!
//! - **Registry**: oracle identities and their three assigned shards
//! - **Requests**: status requests keyed by (bucket, flight) with per-code tallies
//!
//! Finalization and settlement live in [`crate::state`], the only place that
//! mutates requests, flights and balances together.

mod registry;
mod request;

pub use registry::{derive_indexes, derive_request_bucket, Oracle, OracleRegistry};
pub use request::{RequestBook, ResponseOutcome, StatusRequest};
