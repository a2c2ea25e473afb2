//! Where oracles get the status they report.

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::Mutex;

use surety::{FlightKey, StatusCode};

/// Produces the status an oracle reports for a flight.
#[async_trait]
pub trait StatusSource: Send + Sync {
    async fn status_for(&self, flight: &FlightKey) -> StatusCode;
}

/// Draws uniformly from the terminal status codes.
pub struct RandomStatusSource {
    rng: Mutex<StdRng>,
}

impl RandomStatusSource {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(StdRng::from_entropy()),
        }
    }

    /// Reproducible draws.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for RandomStatusSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StatusSource for RandomStatusSource {
    async fn status_for(&self, _flight: &FlightKey) -> StatusCode {
        let i = self.rng.lock().await.gen_range(0..StatusCode::TERMINAL.len());
        StatusCode::TERMINAL[i]
    }
}

/// Always reports the same status.
#[derive(Debug, Clone, Copy)]
pub struct FixedStatusSource(pub StatusCode);

#[async_trait]
impl StatusSource for FixedStatusSource {
    async fn status_for(&self, _flight: &FlightKey) -> StatusCode {
        self.0
    }
}
