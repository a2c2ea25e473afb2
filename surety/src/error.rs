//! Error taxonomy for surety operations.
//!
//! Every error is recoverable: the failed call has no observable effect and the
//! caller may retry with corrected input.

use crate::types::{AccountId, Amount, FlightKey, ShardId, StatusCode, StatusRequestKey};

/// Error types for surety operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SuretyError {
    /// Capability or role check failed
    #[error("Unauthorized: {account} cannot {action}")]
    Unauthorized {
        account: AccountId,
        action: &'static str,
    },

    /// Referenced flight does not exist
    #[error("Flight not found: {0}")]
    NotFound(FlightKey),

    /// Referenced airline is not registered
    #[error("Unknown airline: {0}")]
    UnknownAirline(AccountId),

    /// Referenced oracle is not registered
    #[error("Unknown oracle: {0}")]
    UnknownOracle(AccountId),

    /// No status request exists at the key
    #[error("No open status request at {0}")]
    NoOpenRequest(StatusRequestKey),

    /// Flight key already registered
    #[error("Flight already registered: {0}")]
    DuplicateFlight(FlightKey),

    /// Passenger already insured on the flight
    #[error("Passenger {passenger} already holds a policy on {flight}")]
    DuplicatePolicy {
        passenger: AccountId,
        flight: FlightKey,
    },

    /// Oracle already registered; indexes are immutable
    #[error("Oracle already registered: {0}")]
    DuplicateOracle(AccountId),

    /// Fee below the required amount
    #[error("Insufficient fee: required {required}, provided {provided}")]
    InsufficientFee { required: Amount, provided: Amount },

    /// Withdrawal above available credit
    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: Amount, available: Amount },

    /// Premium above the per-purchase cap
    #[error("Premium {premium} exceeds cap {cap}")]
    PremiumExceedsCap { premium: Amount, cap: Amount },

    /// Write against a flight that already has a terminal status
    #[error("Flight {flight} already resolved as {status}")]
    FlightAlreadyResolved {
        flight: FlightKey,
        status: StatusCode,
    },

    /// Oracle responded on a shard it does not hold
    #[error("Index {index} not assigned to oracle {oracle}")]
    IndexNotAssigned { oracle: AccountId, index: ShardId },

    /// Mutations are paused
    #[error("System is paused")]
    SystemPaused,

    /// Genesis attempted on a populated registry
    #[error("Registry already initialized")]
    AlreadyInitialized,

    /// Malformed input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Arithmetic overflow while computing or applying credits
    #[error("Arithmetic overflow: {0}")]
    Overflow(String),

    /// External payout transfer failed; the debit was restored
    #[error("Transfer failed: {0}")]
    TransferFailed(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SuretyError {
    /// Whether the same call may succeed later without changing its input.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SuretyError::SystemPaused | SuretyError::TransferFailed(_) | SuretyError::NoOpenRequest(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, SuretyError>;
