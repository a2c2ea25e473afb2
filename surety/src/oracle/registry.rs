//! Oracle identities and their shard assignments.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tracing::info;

use crate::error::{Result, SuretyError};
use crate::types::{AccountId, FlightKey, OracleIndexes, ShardId};

/// Derive the three shards of an oracle.
///
/// Deterministic in `(seed, oracle, nonce)`; values are drawn with
/// replacement from `0..shard_count`. `shard_count` must be in `1..=256`.
pub fn derive_indexes(seed: u64, oracle: &AccountId, nonce: u64, shard_count: u16) -> OracleIndexes {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_be_bytes());
    hasher.update(oracle.as_bytes());
    hasher.update(nonce.to_be_bytes());
    let digest = hasher.finalize();

    let mut indexes = [0; 3];
    for (i, slot) in indexes.iter_mut().enumerate() {
        *slot = shard_of(&digest, i, shard_count);
    }
    indexes
}

/// Pick the bucket a status request for `flight` starts at.
///
/// Hashes the whole flight key with the seed, so the same flight always maps
/// to the same bucket and flights of one airline spread across buckets.
pub fn derive_request_bucket(seed: u64, flight: &FlightKey, shard_count: u16) -> ShardId {
    let mut hasher = Sha256::new();
    hasher.update(seed.to_be_bytes());
    hasher.update(flight.airline.as_bytes());
    hasher.update(flight.flight.as_bytes());
    hasher.update(flight.timestamp.to_be_bytes());
    shard_of(&hasher.finalize(), 0, shard_count)
}

fn shard_of(digest: &[u8], slot: usize, shard_count: u16) -> ShardId {
    let word = u16::from_be_bytes([digest[2 * slot], digest[2 * slot + 1]]);
    (word % shard_count.max(1)) as ShardId
}

/// A registered oracle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Oracle {
    pub id: AccountId,
    /// Assigned shards; fixed for the oracle's lifetime
    pub indexes: OracleIndexes,
    pub registered_at: DateTime<Utc>,
}

impl Oracle {
    pub fn holds(&self, index: ShardId) -> bool {
        self.indexes.contains(&index)
    }
}

/// Owns oracle records and the registration nonce.
pub struct OracleRegistry {
    oracles: HashMap<AccountId, Oracle>,
    /// Incremented on every successful registration
    nonce: u64,
    seed: u64,
    shard_count: u16,
}

impl OracleRegistry {
    pub fn new(seed: u64, shard_count: u16) -> Self {
        Self {
            oracles: HashMap::new(),
            nonce: 0,
            seed,
            shard_count,
        }
    }

    pub fn check_register(&self, id: &AccountId) -> Result<()> {
        if self.oracles.contains_key(id) {
            return Err(SuretyError::DuplicateOracle(*id));
        }
        Ok(())
    }

    /// Register an oracle and assign its shards.
    pub fn register(&mut self, id: AccountId) -> Result<OracleIndexes> {
        self.check_register(&id)?;

        let indexes = derive_indexes(self.seed, &id, self.nonce, self.shard_count);
        self.nonce += 1;
        self.oracles.insert(
            id,
            Oracle {
                id,
                indexes,
                registered_at: Utc::now(),
            },
        );

        info!(oracle = %id, ?indexes, "Oracle registered");
        Ok(indexes)
    }

    pub fn get(&self, id: &AccountId) -> Result<&Oracle> {
        self.oracles.get(id).ok_or(SuretyError::UnknownOracle(*id))
    }

    pub fn indexes(&self, id: &AccountId) -> Result<OracleIndexes> {
        self.get(id).map(|o| o.indexes)
    }

    /// Check that `id` is registered and holds `index`.
    pub fn ensure_assigned(&self, id: &AccountId, index: ShardId) -> Result<()> {
        if self.get(id)?.holds(index) {
            Ok(())
        } else {
            Err(SuretyError::IndexNotAssigned { oracle: *id, index })
        }
    }

    pub fn shard_count(&self) -> u16 {
        self.shard_count
    }

    pub fn len(&self) -> usize {
        self.oracles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.oracles.is_empty()
    }
}
