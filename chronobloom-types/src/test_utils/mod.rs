//! In-memory implementations for testing.
//!
//! Available behind the `test-utils` feature flag. These are minimal
//! implementations that prove the protocol traits are usable end to end
//! without a network.

mod canned_service;
mod in_memory_store;
mod static_source;

pub use canned_service::CannedService;
pub use in_memory_store::InMemoryEventStore;
pub use static_source::{StaticSource, sample_observation};
