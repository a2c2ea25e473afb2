//! Configuration for a surety instance.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SuretyError};
use crate::types::Amount;

/// Configuration for a surety instance.
///
/// Defaults reproduce the production constants: a 10 unit airline fee, a
/// 1 unit oracle fee, a 1 unit premium cap, 1.5x payouts and a quorum of
/// three agreeing oracles over ten shards.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SuretyConfig {
    /// Instance ID, used to tag logs
    pub instance_id: String,
    /// Fee an airline pays to gain voting rights
    pub registration_fee: Amount,
    /// Fee an oracle pays to register
    pub oracle_fee: Amount,
    /// Largest premium accepted per purchase
    pub max_premium: Amount,
    /// Payout multiplier numerator
    pub payout_numerator: u64,
    /// Payout multiplier denominator
    pub payout_denominator: u64,
    /// Agreeing oracle responses needed to finalize a request
    pub min_responses: usize,
    /// Number of oracle shards
    pub shard_count: u16,
    /// Registered airline count from which admission needs votes
    pub consensus_threshold: usize,
    /// Seed mixed into oracle index derivation
    pub index_seed: u64,
    /// Event channel capacity
    pub event_capacity: usize,
}

impl Default for SuretyConfig {
    fn default() -> Self {
        Self {
            instance_id: uuid::Uuid::new_v4().to_string(),
            registration_fee: Amount::units(10),
            oracle_fee: Amount::units(1),
            max_premium: Amount::units(1),
            payout_numerator: 3,
            payout_denominator: 2,
            min_responses: 3,
            shard_count: 10,
            consensus_threshold: 4,
            index_seed: 0,
            event_capacity: 256,
        }
    }
}

impl SuretyConfig {
    /// Create a new config with instance ID.
    pub fn new(instance_id: impl Into<String>) -> Self {
        Self {
            instance_id: instance_id.into(),
            ..Default::default()
        }
    }

    /// Load config from YAML.
    pub fn from_yaml(yaml: &str) -> std::result::Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Serialize to YAML.
    pub fn to_yaml(&self) -> std::result::Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }

    /// Check the values the state machine relies on.
    pub fn validate(&self) -> Result<()> {
        if self.shard_count == 0 || self.shard_count > 256 {
            return Err(SuretyError::Config(format!(
                "shard_count must be within 1..=256, got {}",
                self.shard_count
            )));
        }
        if self.min_responses == 0 {
            return Err(SuretyError::Config("min_responses must be positive".to_string()));
        }
        if self.payout_denominator == 0 {
            return Err(SuretyError::Config("payout_denominator must be positive".to_string()));
        }
        if self.event_capacity == 0 {
            return Err(SuretyError::Config("event_capacity must be positive".to_string()));
        }
        Ok(())
    }
}
