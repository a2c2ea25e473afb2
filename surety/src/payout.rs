//! Outbound transfers of withdrawn credit.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{AccountId, Amount};

/// Failure reported by a payout sink.
#[derive(Debug, Clone, Error)]
#[error("payout failed: {0}")]
pub struct PayoutError(pub String);

/// Moves withdrawn credit out of the system.
///
/// Called with no surety lock held, so an implementation may call back into
/// the service.
#[async_trait]
pub trait PayoutSink: Send + Sync {
    async fn transfer(&self, to: &AccountId, amount: Amount) -> Result<(), PayoutError>;
}

/// Sink for embedded use: accepts every transfer.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopPayout;

#[async_trait]
impl PayoutSink for NoopPayout {
    async fn transfer(&self, _to: &AccountId, _amount: Amount) -> Result<(), PayoutError> {
        Ok(())
    }
}
