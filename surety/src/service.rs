//! Service facade - the process-wide surety context.

use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};
use tracing::{info, warn};

use crate::airline::{AdmissionOutcome, Airline};
use crate::config::SuretyConfig;
use crate::error::{Result, SuretyError};
use crate::events::{EventBus, SuretyEvent};
use crate::flight::Flight;
use crate::insurance::Policy;
use crate::oracle::{ResponseOutcome, StatusRequest};
use crate::payout::{NoopPayout, PayoutSink};
use crate::state::SuretyState;
use crate::types::{AccountId, Amount, FlightKey, OracleIndexes, ShardId, StatusCode, StatusRequestKey};

/// Shared handle to one surety instance.
///
/// Cheap to clone. Every command runs under the state's write lock as one
/// transaction; its events are published after it commits, before the lock is
/// released, so subscribers see them in commit order.
#[derive(Clone)]
pub struct FlightSurety {
    /// Configuration
    config: Arc<SuretyConfig>,
    /// All mutable state
    state: Arc<RwLock<SuretyState>>,
    /// Committed events
    events: EventBus,
    /// Destination of withdrawals
    payout: Arc<dyn PayoutSink>,
}

impl FlightSurety {
    /// Create an instance with its genesis airline and no external payouts.
    pub fn new(config: SuretyConfig, genesis: AccountId, name: impl Into<String>) -> Result<Self> {
        Self::with_payout(config, genesis, name, Arc::new(NoopPayout))
    }

    /// Create an instance that sends withdrawals to `payout`.
    pub fn with_payout(
        config: SuretyConfig,
        genesis: AccountId,
        name: impl Into<String>,
        payout: Arc<dyn PayoutSink>,
    ) -> Result<Self> {
        let mut state = SuretyState::genesis(config.clone(), genesis, name)?;
        // Nobody can be subscribed yet
        state.take_events();

        Ok(Self {
            events: EventBus::new(config.event_capacity),
            config: Arc::new(config),
            state: Arc::new(RwLock::new(state)),
            payout,
        })
    }

    pub fn config(&self) -> &SuretyConfig {
        &self.config
    }

    /// Subscribe to events committed from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<SuretyEvent> {
        self.events.subscribe()
    }

    async fn transact<T>(&self, op: impl FnOnce(&mut SuretyState) -> Result<T>) -> Result<T> {
        let mut state = self.state.write().await;
        match op(&mut state) {
            Ok(value) => {
                self.events.publish(state.take_events());
                Ok(value)
            }
            Err(e) => {
                state.take_events();
                Err(e)
            }
        }
    }

    async fn read<T>(&self, query: impl FnOnce(&SuretyState) -> T) -> T {
        let state = self.state.read().await;
        query(&state)
    }

    // ------------------------------------------------------------------
    // Commands
    // ------------------------------------------------------------------

    pub async fn set_operational(&self, caller: AccountId, operational: bool) -> Result<()> {
        self.transact(|s| s.set_operational(caller, operational)).await
    }

    /// Pay the registration fee. Returns `true` when this call funded the airline.
    pub async fn fund_airline(&self, airline: AccountId, amount: Amount) -> Result<bool> {
        self.transact(|s| s.fund_airline(airline, amount)).await
    }

    /// Propose a candidate airline or vote for a pending one.
    pub async fn register_airline(
        &self,
        candidate: AccountId,
        name: impl Into<String>,
        voter: AccountId,
    ) -> Result<AdmissionOutcome> {
        let name = name.into();
        self.transact(|s| s.propose_airline(candidate, name, voter)).await
    }

    pub async fn register_flight(
        &self,
        airline: AccountId,
        flight: impl Into<String>,
        timestamp: u64,
        caller: AccountId,
    ) -> Result<FlightKey> {
        let flight = flight.into();
        self.transact(|s| s.register_flight(airline, flight, timestamp, caller)).await
    }

    pub async fn buy_insurance(&self, passenger: AccountId, flight: &FlightKey, premium: Amount) -> Result<()> {
        self.transact(|s| s.buy_insurance(passenger, flight, premium)).await
    }

    pub async fn register_oracle(&self, oracle: AccountId, fee: Amount) -> Result<OracleIndexes> {
        self.transact(|s| s.register_oracle(oracle, fee)).await
    }

    pub async fn request_status(
        &self,
        airline: AccountId,
        flight: impl Into<String>,
        timestamp: u64,
        bucket: ShardId,
    ) -> Result<StatusRequestKey> {
        let flight = flight.into();
        self.transact(|s| s.request_status(airline, flight, timestamp, bucket)).await
    }

    pub async fn submit_response(
        &self,
        oracle: AccountId,
        index: ShardId,
        airline: AccountId,
        flight: impl Into<String>,
        timestamp: u64,
        status: StatusCode,
    ) -> Result<ResponseOutcome> {
        let flight = flight.into();
        self.transact(|s| s.submit_response(oracle, index, airline, flight, timestamp, status))
            .await
    }

    /// Withdraw credit through the payout sink. Returns the remaining credit.
    ///
    /// The balance is debited before the transfer starts and the lock is not
    /// held across it; a failed transfer restores the debit.
    pub async fn withdraw(&self, passenger: AccountId, amount: Amount) -> Result<Amount> {
        let remaining = self.transact(|s| s.begin_withdrawal(passenger, amount)).await?;

        match self.payout.transfer(&passenger, amount).await {
            Ok(()) => {
                self.transact(|s| {
                    s.complete_withdrawal(passenger, amount);
                    Ok(())
                })
                .await?;
                info!(passenger = %passenger, amount = %amount, "Credit withdrawn");
                Ok(remaining)
            }
            Err(e) => {
                warn!(passenger = %passenger, amount = %amount, error = %e, "Payout failed");
                self.transact(|s| s.restore_withdrawal(passenger, amount)).await?;
                Err(SuretyError::TransferFailed(e.to_string()))
            }
        }
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub async fn is_operational(&self) -> bool {
        self.read(SuretyState::is_operational).await
    }

    pub async fn owner(&self) -> AccountId {
        self.read(SuretyState::owner).await
    }

    /// An airline record, pending candidates included.
    pub async fn airline(&self, id: &AccountId) -> Option<Airline> {
        self.read(|s| s.airline(id).cloned()).await
    }

    /// Registered airlines in registration order.
    pub async fn registered_airlines(&self) -> Vec<AccountId> {
        self.read(|s| s.registered_airlines().to_vec()).await
    }

    pub async fn flight(&self, key: &FlightKey) -> Result<Flight> {
        self.read(|s| s.flight(key).cloned()).await
    }

    /// Flight keys in registration order.
    pub async fn flights(&self) -> Vec<FlightKey> {
        self.read(|s| s.flights().to_vec()).await
    }

    /// Withdrawable credit of a passenger.
    pub async fn balance(&self, account: &AccountId) -> Amount {
        self.read(|s| s.balance(account)).await
    }

    /// Fees and premiums collected by the instance.
    pub async fn pool_balance(&self) -> Amount {
        self.read(SuretyState::collected).await
    }

    pub async fn oracle_indexes(&self, oracle: &AccountId) -> Result<OracleIndexes> {
        self.read(|s| s.oracle_indexes(oracle)).await
    }

    pub async fn policy(&self, passenger: &AccountId, flight: &FlightKey) -> Option<Policy> {
        self.read(|s| s.policy(passenger, flight).cloned()).await
    }

    pub async fn status_request(&self, key: &StatusRequestKey) -> Option<StatusRequest> {
        self.read(|s| s.status_request(key).cloned()).await
    }
}
