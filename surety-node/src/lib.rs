//! surety-node: boots a surety instance with an oracle fleet and plays a
//! scenario against it.

pub mod config;
pub mod scenario;

pub use config::{NodeConfig, ScenarioConfig, StatusChoice};
pub use scenario::{run_scenario, ScenarioReport};
