//! The fleet of oracle identities a worker answers for.

use dashmap::DashMap;
use tracing::{debug, info};

use surety::{AccountId, FlightSurety, OracleIndexes, ShardId, SuretyError};

use crate::config::WorkerConfig;
use crate::worker::WorkerError;

/// Oracle ids and their assigned shards.
#[derive(Default)]
pub struct OracleRoster {
    oracles: DashMap<AccountId, OracleIndexes>,
}

impl OracleRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, oracle: AccountId, indexes: OracleIndexes) {
        self.oracles.insert(oracle, indexes);
    }

    /// Register `config.oracle_count` oracles, paying the instance's oracle fee.
    ///
    /// Oracles already registered with the instance are adopted with their
    /// existing indexes. Returns the roster size.
    pub async fn register_fleet(&self, surety: &FlightSurety, config: &WorkerConfig) -> Result<usize, WorkerError> {
        let fee = surety.config().oracle_fee;

        for n in 0..config.oracle_count {
            let oracle = AccountId::from_label(&config.label(n));
            if self.oracles.contains_key(&oracle) {
                continue;
            }
            let indexes = match surety.register_oracle(oracle, fee).await {
                Ok(indexes) => indexes,
                Err(SuretyError::DuplicateOracle(_)) => {
                    debug!(oracle = %oracle, "Adopting registered oracle");
                    surety.oracle_indexes(&oracle).await?
                }
                Err(e) => return Err(e.into()),
            };
            self.insert(oracle, indexes);
        }

        info!(oracles = self.len(), "Oracle fleet registered");
        Ok(self.len())
    }

    pub fn indexes(&self, oracle: &AccountId) -> Option<OracleIndexes> {
        self.oracles.get(oracle).map(|entry| *entry.value())
    }

    /// Oracles holding `bucket`, in address order.
    pub fn matching(&self, bucket: ShardId) -> Vec<AccountId> {
        let mut oracles: Vec<AccountId> = self
            .oracles
            .iter()
            .filter(|entry| entry.value().contains(&bucket))
            .map(|entry| *entry.key())
            .collect();
        oracles.sort();
        oracles
    }

    /// Buckets held by at least `min` oracles, cycling the shard space from `start`.
    pub fn covered_buckets(&self, start: ShardId, shard_count: u16, min: usize) -> Result<Vec<ShardId>, WorkerError> {
        let shard_count = shard_count.clamp(1, 256);
        let buckets: Vec<ShardId> = (0..shard_count)
            .map(|offset| ((u16::from(start) + offset) % shard_count) as ShardId)
            .filter(|bucket| self.matching(*bucket).len() >= min)
            .collect();
        if buckets.is_empty() {
            return Err(WorkerError::Uncovered(start));
        }
        Ok(buckets)
    }

    pub fn len(&self) -> usize {
        self.oracles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.oracles.is_empty()
    }
}
