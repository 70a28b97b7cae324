//! Kafka broker-backed E2E tests
//!
//! These tests need a running broker at `KAFKA_BROKERS` (default `localhost:9092`)
//! and are ignored by default. Run them with `cargo test -- --ignored`.

mod provisioning;
mod station_stream;

pub fn brokers() -> String {
    std::env::var("KAFKA_BROKERS").unwrap_or_else(|_| "localhost:9092".to_string())
}

pub fn test_id() -> String {
    cta_stations::producer::time_millis().to_string()
}
