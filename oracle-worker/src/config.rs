//! Worker configuration.

use serde::{Deserialize, Serialize};

/// Configuration for an oracle fleet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Oracles to register at startup
    pub oracle_count: usize,
    /// Prefix of the labels oracle addresses are derived from
    pub label_prefix: String,
    /// Stop answering for a flight once its status is known
    pub stop_after_resolution: bool,
    /// Capacity of the report channel
    pub report_capacity: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            oracle_count: 20,
            label_prefix: "oracle".to_string(),
            stop_after_resolution: true,
            report_capacity: 64,
        }
    }
}

impl WorkerConfig {
    /// Label of the `n`th oracle.
    pub fn label(&self, n: usize) -> String {
        format!("{}-{}", self.label_prefix, n)
    }
}
