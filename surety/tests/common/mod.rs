#![allow(dead_code)]

use surety::{AccountId, Amount, FlightKey, FlightSurety, ShardId, StatusCode, SuretyConfig};

pub const T: u64 = 1_700_000_000;

pub fn genesis() -> AccountId {
    AccountId::from_label("oceanic")
}

pub fn oracle(i: usize) -> AccountId {
    AccountId::from_label(&format!("oracle-{i}"))
}

/// Funded genesis airline with flight ND1309 registered.
pub async fn with_flight(surety: &FlightSurety) -> FlightKey {
    surety.fund_airline(genesis(), Amount::units(10)).await.unwrap();
    surety
        .register_flight(genesis(), "ND1309", T, genesis())
        .await
        .unwrap()
}

pub fn new_surety() -> FlightSurety {
    FlightSurety::new(SuretyConfig::new("it"), genesis(), "Oceanic Airlines").unwrap()
}

/// Register twenty oracles and return a bucket with at least `count` holders.
pub async fn fleet_on_bucket(surety: &FlightSurety, count: usize) -> (ShardId, Vec<AccountId>) {
    for i in 0..20 {
        surety.register_oracle(oracle(i), Amount::units(1)).await.unwrap();
    }
    for bucket in 0..10 {
        let mut holders = Vec::new();
        for i in 0..20 {
            if surety.oracle_indexes(&oracle(i)).await.unwrap().contains(&bucket) {
                holders.push(oracle(i));
            }
        }
        if holders.len() >= count {
            return (bucket, holders);
        }
    }
    panic!("no bucket held by {count} oracles");
}

/// Drive `flight` to `status` through a quorum of oracles.
pub async fn settle(surety: &FlightSurety, flight: &FlightKey, status: StatusCode) {
    let (bucket, holders) = fleet_on_bucket(surety, 3).await;
    surety
        .request_status(flight.airline, flight.flight.clone(), flight.timestamp, bucket)
        .await
        .unwrap();
    for oracle in &holders[..3] {
        surety
            .submit_response(*oracle, bucket, flight.airline, flight.flight.clone(), flight.timestamp, status)
            .await
            .unwrap();
    }
}
