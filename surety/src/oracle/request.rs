//! Status requests and their per-code vote tallies.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::types::{AccountId, StatusCode, StatusRequestKey};

/// An open or finalized status request.
#[derive(Debug, Clone)]
pub struct StatusRequest {
    /// Request key
    pub key: StatusRequestKey,
    /// When the request was opened
    pub opened_at: DateTime<Utc>,
    /// Oracles that voted, per reported code
    tally: BTreeMap<StatusCode, BTreeSet<AccountId>>,
    /// Code the request finalized on
    finalized: Option<StatusCode>,
    /// When the request finalized
    finalized_at: Option<DateTime<Utc>>,
}

impl StatusRequest {
    fn new(key: StatusRequestKey) -> Self {
        Self {
            key,
            opened_at: Utc::now(),
            tally: BTreeMap::new(),
            finalized: None,
            finalized_at: None,
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.finalized.is_some()
    }

    pub fn finalized_status(&self) -> Option<StatusCode> {
        self.finalized
    }

    pub fn finalized_at(&self) -> Option<DateTime<Utc>> {
        self.finalized_at
    }

    /// Whether `oracle` already voted here, for any code.
    pub fn has_voted(&self, oracle: &AccountId) -> bool {
        self.tally.values().any(|voters| voters.contains(oracle))
    }

    pub fn votes_for(&self, status: StatusCode) -> usize {
        self.tally.get(&status).map_or(0, BTreeSet::len)
    }

    /// Vote counts per code.
    pub fn tally(&self) -> BTreeMap<StatusCode, usize> {
        self.tally.iter().map(|(code, voters)| (*code, voters.len())).collect()
    }

    /// Whether one more vote for `status` reaches `quorum`.
    pub(crate) fn reaches_quorum_with(&self, status: StatusCode, quorum: usize) -> bool {
        self.votes_for(status) + 1 >= quorum
    }

    /// Record a vote. Returns the new count for `status`.
    pub(crate) fn record(&mut self, oracle: AccountId, status: StatusCode) -> usize {
        let voters = self.tally.entry(status).or_default();
        voters.insert(oracle);
        voters.len()
    }

    pub(crate) fn finalize(&mut self, status: StatusCode) {
        self.finalized = Some(status);
        self.finalized_at = Some(Utc::now());
    }
}

/// Result of an oracle response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseOutcome {
    /// Vote counted; quorum not reached yet
    Recorded { votes: usize, required: usize },
    /// The oracle had already voted on this request; nothing changed
    Duplicate,
    /// The request had already finalized; nothing changed
    Late,
    /// This vote finalized the request
    Finalized {
        status: StatusCode,
        /// Whether the flight status changed; false when another request
        /// resolved the flight first
        resolved_flight: bool,
        /// Policyholders credited
        credited: usize,
    },
}

/// Owns every status request.
///
/// Requests never expire, so finalized and abandoned requests stay in the book
/// for the life of the instance; nothing prunes it.
#[derive(Default)]
pub struct RequestBook {
    requests: HashMap<StatusRequestKey, StatusRequest>,
}

impl RequestBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a request at `key`, or keep the existing one. Returns `true` if opened.
    pub fn open(&mut self, key: StatusRequestKey) -> bool {
        if self.requests.contains_key(&key) {
            return false;
        }
        self.requests.insert(key.clone(), StatusRequest::new(key));
        true
    }

    pub fn get(&self, key: &StatusRequestKey) -> Option<&StatusRequest> {
        self.requests.get(key)
    }

    pub(crate) fn get_mut(&mut self, key: &StatusRequestKey) -> Option<&mut StatusRequest> {
        self.requests.get_mut(key)
    }

    /// Requests that have not finalized.
    pub fn open_requests(&self) -> Vec<&StatusRequest> {
        self.requests.values().filter(|r| !r.is_finalized()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FlightKey;

    fn key() -> StatusRequestKey {
        StatusRequestKey::new(
            3,
            FlightKey::new(AccountId::from_label("oceanic"), "ND1309", 1_700_000_000),
        )
    }

    #[test]
    fn test_open_is_idempotent() {
        let mut book = RequestBook::new();
        assert!(book.open(key()));
        assert!(!book.open(key()));
        assert_eq!(book.open_requests().len(), 1);
    }

    #[test]
    fn test_tally_per_code() {
        let mut book = RequestBook::new();
        book.open(key());
        let request = book.get_mut(&key()).unwrap();

        let o1 = AccountId::from_label("o1");
        let o2 = AccountId::from_label("o2");
        assert_eq!(request.record(o1, StatusCode::LateAirline), 1);
        assert_eq!(request.record(o2, StatusCode::OnTime), 1);

        assert!(request.has_voted(&o1));
        assert!(request.has_voted(&o2));
        assert!(!request.has_voted(&AccountId::from_label("o3")));
        assert_eq!(request.votes_for(StatusCode::LateAirline), 1);
        assert!(!request.reaches_quorum_with(StatusCode::LateAirline, 3));
        assert_eq!(request.tally().len(), 2);
    }

    #[test]
    fn test_finalize() {
        let mut book = RequestBook::new();
        book.open(key());
        let request = book.get_mut(&key()).unwrap();
        request.finalize(StatusCode::LateWeather);

        assert!(request.is_finalized());
        assert_eq!(request.finalized_status(), Some(StatusCode::LateWeather));
        assert!(request.finalized_at().is_some());
        assert!(book.open_requests().is_empty());
    }
}
